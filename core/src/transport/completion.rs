/*
 * completion.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Magazzino, a client SDK for the Magazzino
 * backend service.
 *
 * Magazzino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Magazzino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Magazzino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Result channel: the single place a pending request is resolved or
//! rejected, exactly once. The facade owns the channel; executors hold only
//! a shared reference. Whichever of resolve/reject fires first wins; any
//! later completion is a no-op.

use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::ApiError;
use crate::transport::response::ApiSuccess;

/// Final outcome of one request.
pub type ApiOutcome = Result<ApiSuccess, ApiError>;

/// Write side of the result channel. Cheap to share; delivery consumes the
/// inner sender so at-most-once holds regardless of call order or count.
pub struct Completion {
    tx: Mutex<Option<oneshot::Sender<ApiOutcome>>>,
}

impl Completion {
    /// Create a channel pair: the shared write side and the awaitable.
    pub fn channel() -> (std::sync::Arc<Completion>, Pending) {
        let (tx, rx) = oneshot::channel();
        (
            std::sync::Arc::new(Completion {
                tx: Mutex::new(Some(tx)),
            }),
            Pending { rx },
        )
    }

    /// Resolve with a success value. No-op if already completed.
    pub fn resolve(&self, value: ApiSuccess) {
        self.deliver(Ok(value));
    }

    /// Reject with an error. No-op if already completed.
    pub fn reject(&self, error: ApiError) {
        self.deliver(Err(error));
    }

    /// True once either completion has fired.
    pub fn is_done(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }

    fn deliver(&self, outcome: ApiOutcome) {
        let tx = self.tx.lock().unwrap().take();
        if let Some(tx) = tx {
            // The receiver may be gone (caller dropped the awaitable);
            // nothing to do in that case.
            let _ = tx.send(outcome);
        }
    }
}

/// Read side of the result channel.
pub struct Pending {
    rx: oneshot::Receiver<ApiOutcome>,
}

impl Pending {
    /// Await the outcome (async callers).
    pub async fn wait(self) -> ApiOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::transport("request abandoned without completion")),
        }
    }

    /// Block until the outcome arrives (callers outside a runtime).
    pub fn wait_blocking(self) -> ApiOutcome {
        match self.rx.blocking_recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::transport("request abandoned without completion")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::response::Payload;

    fn ok_value(tag: &str) -> ApiSuccess {
        ApiSuccess::Body(Payload::Text(tag.to_string()))
    }

    #[test]
    fn first_completion_wins_resolve_then_reject() {
        let (completion, pending) = Completion::channel();
        completion.resolve(ok_value("first"));
        completion.reject(ApiError::timeout());
        completion.resolve(ok_value("third"));
        let outcome = pending.wait_blocking();
        match outcome.unwrap() {
            ApiSuccess::Body(Payload::Text(s)) => assert_eq!(s, "first"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn first_completion_wins_reject_then_resolve() {
        let (completion, pending) = Completion::channel();
        completion.reject(ApiError::protocol(404, "Not Found", String::new()));
        completion.resolve(ok_value("late"));
        let err = pending.wait_blocking().unwrap_err();
        assert_eq!(err.status, 404);
    }

    #[test]
    fn is_done_after_either_path() {
        let (completion, _pending) = Completion::channel();
        assert!(!completion.is_done());
        completion.reject(ApiError::timeout());
        assert!(completion.is_done());
    }

    // Fuzz racing resolve/reject from many threads: exactly one outcome must
    // be observable and the state must be stable afterwards.
    #[test]
    fn racing_completions_yield_exactly_one_outcome() {
        for round in 0..64 {
            let (completion, pending) = Completion::channel();
            let mut handles = Vec::new();
            for i in 0..4 {
                let c = completion.clone();
                handles.push(std::thread::spawn(move || {
                    if (i + round) % 2 == 0 {
                        c.resolve(ApiSuccess::Body(Payload::Text(format!("t{}", i))));
                    } else {
                        c.reject(ApiError::transport(format!("e{}", i)));
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
            assert!(completion.is_done());
            // One outcome is delivered; which one depends on the race, but
            // waiting must not hang or observe a second value.
            let _ = pending.wait_blocking();
        }
    }

    #[tokio::test]
    async fn async_wait_observes_outcome() {
        let (completion, pending) = Completion::channel();
        let c = completion.clone();
        tokio::spawn(async move {
            c.resolve(ApiSuccess::Body(Payload::Text("async".into())));
        });
        let outcome = pending.wait().await.unwrap();
        match outcome {
            ApiSuccess::Body(Payload::Text(s)) => assert_eq!(s, "async"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

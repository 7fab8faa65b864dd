/*
 * pool.rs
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

//! HTTP/2 session pool: authority string → live session, process-wide.
//! At most one live session per authority. Sessions are created lazily on
//! first use, reused by later requests, and evicted when found dead (swept
//! opportunistically before each acquire, never on a timer — a dead session
//! for an authority that is never requested again stays in the map until
//! close_all_sessions or process exit) or when explicitly closed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use tokio::sync::Mutex;

use super::h2::{H2Session, SessionOpenError};
use crate::transport::descriptor::Url;

static POOL: OnceLock<Mutex<HashMap<String, Arc<H2Session>>>> = OnceLock::new();

fn pool() -> &'static Mutex<HashMap<String, Arc<H2Session>>> {
    POOL.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Session for the URL's authority: sweep dead entries, reuse a live one,
/// or open and register a new session. Holding the pool lock across the open
/// serializes creation, so one-session-per-authority holds even with many
/// concurrent first requests.
pub async fn acquire(url: &Url) -> Result<Arc<H2Session>, SessionOpenError> {
    let authority = url.authority();
    let mut sessions = pool().lock().await;
    sessions.retain(|_, s| s.is_alive());
    if let Some(session) = sessions.get(&authority) {
        return Ok(session.clone());
    }
    let session = Arc::new(H2Session::open(url).await?);
    sessions.insert(authority, session.clone());
    Ok(session)
}

/// Live session for an authority, if one is pooled.
pub async fn session(authority: &str) -> Option<Arc<H2Session>> {
    let sessions = pool().lock().await;
    sessions.get(authority).filter(|s| s.is_alive()).cloned()
}

/// All pooled authorities (live sessions only).
pub async fn authorities() -> Vec<String> {
    let mut sessions = pool().lock().await;
    sessions.retain(|_, s| s.is_alive());
    sessions.keys().cloned().collect()
}

/// Close one authority's session: deregister first, then shut the session
/// down gracefully (forced on drain timeout). No-op for unknown authorities.
pub async fn close_session(authority: &str) {
    let removed = {
        let mut sessions = pool().lock().await;
        sessions.remove(authority)
    };
    if let Some(session) = removed {
        session.shutdown().await;
    }
}

/// Close every pooled session and empty the map.
pub async fn close_all_sessions() {
    let removed: Vec<Arc<H2Session>> = {
        let mut sessions = pool().lock().await;
        sessions.drain().map(|(_, s)| s).collect()
    };
    for session in removed {
        session.shutdown().await;
    }
}

#[cfg(test)]
pub(crate) async fn register_for_test(authority: &str, session: H2Session) {
    let mut sessions = pool().lock().await;
    sessions.insert(authority.to_string(), Arc::new(session));
}

#[cfg(test)]
mod tests {
    use super::*;

    // The pool is process-global; tests use distinct authorities to stay
    // independent of each other.

    #[tokio::test]
    async fn live_session_is_reused_and_listed() {
        let (stub, _rx) = H2Session::stub("https://pool-a.test:443");
        register_for_test("https://pool-a.test:443", stub).await;

        let found = session("https://pool-a.test:443").await;
        assert!(found.is_some());
        assert!(authorities().await.contains(&"https://pool-a.test:443".to_string()));

        // _rx kept alive above: the same handle comes back.
        let again = session("https://pool-a.test:443").await.unwrap();
        assert!(Arc::ptr_eq(&found.unwrap(), &again));

        close_session("https://pool-a.test:443").await;
        assert!(session("https://pool-a.test:443").await.is_none());
    }

    #[tokio::test]
    async fn dead_session_is_swept() {
        let (stub, rx) = H2Session::stub("https://pool-b.test:443");
        register_for_test("https://pool-b.test:443", stub).await;
        drop(rx); // command channel closed: session reads as dead
        assert!(session("https://pool-b.test:443").await.is_none());
        assert!(!authorities()
            .await
            .contains(&"https://pool-b.test:443".to_string()));
    }

    #[tokio::test]
    async fn close_session_deregisters_unknown_authority_quietly() {
        close_session("https://pool-never.test:443").await;
    }
}

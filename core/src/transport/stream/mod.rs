/*
 * mod.rs
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

//! Stream executor: the async-environment strategy. Two sub-protocols:
//! one connection per request over HTTP/1.1 (`direct`), and opt-in
//! multiplexed HTTP/2 sessions pooled per authority (`h2` + `pool`).
//!
//! HTTP/2 requires TLS here; an https request preferring HTTP/2 whose peer
//! only negotiates http/1.1 falls back to the direct path for that request.
//! Plain-http requests always take the direct path.

pub mod direct;
pub mod h2;
pub mod pool;

use std::sync::Arc;

use crate::transport::completion::Completion;
use crate::transport::descriptor::{ProtocolPreference, RequestDescriptor};
use crate::transport::response::{finish_buffered, ApiSuccess};

/// Run one request on the appropriate sub-protocol and deliver through the
/// completion. Never retries; one outcome per call.
pub async fn execute(descriptor: RequestDescriptor, completion: Arc<Completion>) {
    if descriptor.protocol == ProtocolPreference::Http2 && descriptor.url.secure {
        let deadline = tokio::time::Instant::now() + descriptor.timeout;
        let acquired = match tokio::time::timeout_at(deadline, pool::acquire(&descriptor.url)).await
        {
            Ok(result) => result,
            Err(_) => {
                completion.reject(crate::error::ApiError::timeout());
                return;
            }
        };
        match acquired {
            Ok(session) => {
                execute_h2(&session, &descriptor, &completion, deadline).await;
                return;
            }
            Err(h2::SessionOpenError::NotNegotiated) => {
                // Peer speaks HTTP/1.1 only; serve this request directly.
            }
            Err(h2::SessionOpenError::Failed(e)) => {
                completion.reject(e);
                return;
            }
        }
    }
    direct::execute(descriptor, completion).await;
}

async fn execute_h2(
    session: &h2::H2Session,
    descriptor: &RequestDescriptor,
    completion: &Completion,
    deadline: tokio::time::Instant,
) {
    let head = h2_request_head(descriptor);
    let result = session
        .request(head, descriptor.body.clone(), descriptor.raw_passthrough, deadline)
        .await;
    match result {
        Ok(h2::H2Response::Buffered {
            status,
            headers,
            body,
        }) => match finish_buffered(descriptor, status, None, headers, body) {
            Ok(success) => completion.resolve(success),
            Err(e) => completion.reject(e),
        },
        Ok(h2::H2Response::Raw(raw)) => completion.resolve(ApiSuccess::Raw(raw)),
        Err(e) => completion.reject(e),
    }
}

/// Build the HTTP/2 header list: mandated pseudo-headers first, then the
/// descriptor's headers lowercased. Connection-specific HTTP/1.1 headers are
/// dropped; content-length is added for bodies when absent.
fn h2_request_head(descriptor: &RequestDescriptor) -> Vec<(String, String)> {
    let mut head = vec![
        (":method".to_string(), descriptor.method.as_str().to_string()),
        (":scheme".to_string(), "https".to_string()),
        (":authority".to_string(), descriptor.url.host_header()),
        (":path".to_string(), descriptor.url.path_and_query.clone()),
    ];
    let mut has_content_length = false;
    for (name, value) in &descriptor.headers {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "host" | "connection" | "keep-alive" | "transfer-encoding" | "upgrade" => continue,
            "content-length" => has_content_length = true,
            _ => {}
        }
        head.push((lower, value.clone()));
    }
    if let Some(body) = &descriptor.body {
        if !has_content_length {
            head.push(("content-length".to_string(), body.len().to_string()));
        }
    }
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::descriptor::{HttpMethod, ResponseKind, Url};
    use std::time::Duration;

    #[test]
    fn h2_head_has_pseudo_headers_first_and_lowercases() {
        let descriptor = RequestDescriptor {
            method: HttpMethod::Post,
            url: Url::parse("https://api.example.com/2013-09-01/classes/scores").unwrap(),
            headers: vec![
                ("X-Magazzino-Application-Id".into(), "app".into()),
                ("Host".into(), "ignored".into()),
                ("Connection".into(), "keep-alive".into()),
            ],
            body: Some(b"{}".to_vec()),
            timeout: Duration::from_secs(10),
            response_kind: ResponseKind::Json,
            want_response_headers: false,
            raw_passthrough: false,
            protocol: ProtocolPreference::Http2,
        };
        let head = h2_request_head(&descriptor);
        assert_eq!(head[0], (":method".to_string(), "POST".to_string()));
        assert_eq!(head[1].0, ":scheme");
        assert_eq!(head[2], (":authority".to_string(), "api.example.com".to_string()));
        assert_eq!(head[3].0, ":path");
        assert!(head.iter().any(|(n, _)| n == "x-magazzino-application-id"));
        assert!(!head.iter().any(|(n, _)| n == "host" || n == "connection"));
        assert!(head.contains(&("content-length".to_string(), "2".to_string())));
    }
}

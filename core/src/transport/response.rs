/*
 * response.rs
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

//! Success-value shapes and the shared status/decoding classification used
//! by the executors once a buffered response is complete.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::transport::descriptor::{RequestDescriptor, ResponseKind};

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Response headers as captured by the executor that ran the request. The
/// two executors diverge structurally on purpose: the blocking executor
/// reports one concatenated header-block string, the stream executor a
/// (name, value) list. This is a documented contract, not an accident.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderBlock {
    /// Blocking executor: "name: value\r\n" lines joined into one string.
    Raw(String),
    /// Stream executor: ordered (name, value) pairs.
    Map(Vec<(String, String)>),
}

/// Success value when `want_response_headers` is set.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub body: Payload,
    pub headers: HeaderBlock,
    pub status: u16,
}

/// Live response stream handed to raw-passthrough callers. Ownership of
/// consumption transfers entirely to the caller; chunk errors surface as
/// `Err` items and end-of-body closes the channel.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    chunks: mpsc::UnboundedReceiver<Result<Bytes, ApiError>>,
}

impl RawResponse {
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        chunks: mpsc::UnboundedReceiver<Result<Bytes, ApiError>>,
    ) -> Self {
        Self {
            status,
            headers,
            chunks,
        }
    }

    /// Next body chunk, None at end of stream.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, ApiError>> {
        self.chunks.recv().await
    }
}

/// The one canonical success type produced by every executor.
#[derive(Debug)]
pub enum ApiSuccess {
    /// Bare decoded body (`want_response_headers` unset).
    Body(Payload),
    /// Body wrapped with headers and status.
    Enveloped(Envelope),
    /// Live stream (raw passthrough only).
    Raw(RawResponse),
}

impl ApiSuccess {
    /// The decoded payload for buffered responses; None for raw.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            ApiSuccess::Body(p) => Some(p),
            ApiSuccess::Enveloped(e) => Some(&e.body),
            ApiSuccess::Raw(_) => None,
        }
    }
}

/// Canonical reason phrases for statuses we may see without one (HTTP/2 has
/// no reason phrase on the wire).
pub fn default_status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        416 => "Range Not Satisfiable",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "HTTP Error",
    }
}

/// Decode an accumulated body per the requested kind. Json falls back to
/// text when the body is not valid JSON; invalid UTF-8 for a textual kind is
/// a decode error.
pub fn decode_payload(kind: ResponseKind, body: Vec<u8>) -> Result<Payload, ApiError> {
    match kind {
        ResponseKind::Binary => Ok(Payload::Binary(body)),
        ResponseKind::Text => match String::from_utf8(body) {
            Ok(s) => Ok(Payload::Text(s)),
            Err(e) => Err(ApiError::decode(e.to_string())),
        },
        ResponseKind::Json => match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(v) => Ok(Payload::Json(v)),
            Err(_) => match String::from_utf8(body) {
                Ok(s) => Ok(Payload::Text(s)),
                Err(e) => Err(ApiError::decode(e.to_string())),
            },
        },
    }
}

/// Classify a complete buffered response from the stream executor: status in
/// [200,300) succeeds with a decoded payload (optionally enveloped); any
/// other status fails with the server's body as response_text (omitted for
/// the binary kind).
pub fn finish_buffered(
    descriptor: &RequestDescriptor,
    status: u16,
    reason: Option<&str>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
) -> Result<ApiSuccess, ApiError> {
    if (200..300).contains(&status) {
        let payload = decode_payload(descriptor.response_kind, body)?;
        if descriptor.want_response_headers {
            Ok(ApiSuccess::Enveloped(Envelope {
                body: payload,
                headers: HeaderBlock::Map(headers),
                status,
            }))
        } else {
            Ok(ApiSuccess::Body(payload))
        }
    } else {
        let status_text = reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| default_status_text(status).to_string());
        let response_text = if descriptor.response_kind == ResponseKind::Binary {
            String::new()
        } else {
            String::from_utf8_lossy(&body).into_owned()
        };
        let data = serde_json::from_slice::<serde_json::Value>(&body).ok();
        let mut err = ApiError::protocol(status, status_text, response_text);
        err.data = data;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::descriptor::{HttpMethod, ProtocolPreference, Url};
    use std::time::Duration;

    fn descriptor(kind: ResponseKind, want_headers: bool) -> RequestDescriptor {
        RequestDescriptor {
            method: HttpMethod::Get,
            url: Url::parse("https://api.example.com/x").unwrap(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(10),
            response_kind: kind,
            want_response_headers: want_headers,
            raw_passthrough: false,
            protocol: ProtocolPreference::Http1,
        }
    }

    #[test]
    fn statuses_in_2xx_succeed_everything_else_fails() {
        for status in [0u16, 100, 199, 200, 201, 204, 299, 300, 304, 400, 404, 500, 599] {
            let d = descriptor(ResponseKind::Text, false);
            let result = finish_buffered(&d, status, None, Vec::new(), b"body".to_vec());
            if (200..300).contains(&status) {
                assert!(result.is_ok(), "status {} should succeed", status);
            } else {
                let err = result.unwrap_err();
                assert_eq!(err.status, status);
            }
        }
    }

    #[test]
    fn json_kind_parses_with_text_fallback() {
        let p = decode_payload(ResponseKind::Json, b"{\"ok\":true}".to_vec()).unwrap();
        assert_eq!(p.as_json().unwrap()["ok"], serde_json::Value::Bool(true));
        let p = decode_payload(ResponseKind::Json, b"not json".to_vec()).unwrap();
        assert_eq!(p.as_text(), Some("not json"));
    }

    #[test]
    fn invalid_utf8_text_is_a_decode_error() {
        let err = decode_payload(ResponseKind::Text, vec![0xff, 0xfe]).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn envelope_toggle_changes_only_the_wrapper() {
        let body = b"{\"n\":1}".to_vec();
        let headers = vec![("content-type".to_string(), "application/json".to_string())];

        let bare = finish_buffered(
            &descriptor(ResponseKind::Json, false),
            200,
            Some("OK"),
            headers.clone(),
            body.clone(),
        )
        .unwrap();
        let wrapped = finish_buffered(
            &descriptor(ResponseKind::Json, true),
            200,
            Some("OK"),
            headers.clone(),
            body,
        )
        .unwrap();

        let bare_payload = match bare {
            ApiSuccess::Body(p) => p,
            other => panic!("expected bare body, got {:?}", other),
        };
        match wrapped {
            ApiSuccess::Enveloped(e) => {
                assert_eq!(e.status, 200);
                assert_eq!(e.body, bare_payload);
                assert_eq!(e.headers, HeaderBlock::Map(headers));
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn protocol_error_carries_raw_body_and_parsed_data() {
        let d = descriptor(ResponseKind::Json, false);
        let body = b"{\"code\":\"E404001\",\"error\":\"No data\"}".to_vec();
        let err = finish_buffered(&d, 404, None, Vec::new(), body).unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.status_text, "Not Found");
        assert_eq!(err.response_text, "{\"code\":\"E404001\",\"error\":\"No data\"}");
        assert_eq!(err.data.unwrap()["code"], "E404001");
    }

    #[test]
    fn binary_protocol_error_omits_response_text() {
        let d = descriptor(ResponseKind::Binary, false);
        let err = finish_buffered(&d, 500, None, Vec::new(), vec![1, 2, 3]).unwrap_err();
        assert!(err.response_text.is_empty());
    }
}

/*
 * facade.rs
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

//! Request facade: builds the transport descriptor from call-site intent
//! (verb, path, query, body, auth), adds the fixed identification headers
//! and the session token, dispatches to the environment's executor, and
//! adapts the single canonical completion into either an awaitable or a
//! callback pair. Configuration errors surface synchronously from `start`;
//! everything after that arrives through the completion exactly once.

use std::time::Duration;

use crate::config;
use crate::error::{ApiError, ConfigError, SdkError};
use crate::transport;
use crate::transport::completion::{Completion, Pending};
use crate::transport::descriptor::{
    encode_query, quote_entity_tag, range_header_value, HttpMethod, ProtocolPreference,
    RequestDescriptor, ResponseKind, Url,
};
use crate::transport::response::ApiSuccess;

/// Fixed identification headers carried by every request.
pub const HEADER_APPLICATION_ID: &str = "X-Magazzino-Application-Id";
pub const HEADER_API_KEY: &str = "X-Magazzino-Api-Key";
/// Session token header, present once a user has logged in.
pub const HEADER_SESSION_TOKEN: &str = "X-Magazzino-Session-Token";

/// Success callback for the callback-pair calling convention.
pub type OnSuccess = Box<dyn FnOnce(ApiSuccess) + Send + 'static>;
/// Error callback for the callback-pair calling convention.
pub type OnError = Box<dyn FnOnce(ApiError) + Send + 'static>;

/// Body value before serialization: strings and bytes pass through
/// untouched, everything else is JSON-serialized.
#[derive(Debug, Clone)]
enum RequestBody {
    Bytes(Vec<u8>),
    Text(String),
    Json(serde_json::Value),
}

/// One API request under construction. Obtain from
/// `Service::build_request`, refine, then `execute`/`execute_with`.
pub struct ApiRequest {
    app_id: String,
    api_key: String,
    session_token: Option<String>,
    method: HttpMethod,
    url: String,
    query: Vec<(String, String)>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    timeout: Option<Duration>,
    response_kind: ResponseKind,
    want_response_headers: bool,
    raw_passthrough: bool,
    protocol: ProtocolPreference,
    range: Option<String>,
}

impl ApiRequest {
    pub fn new(
        method: HttpMethod,
        url: impl Into<String>,
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            session_token,
            method,
            url: url.into(),
            query: Vec::new(),
            content_type: None,
            headers: Vec::new(),
            body: None,
            timeout: None,
            response_kind: ResponseKind::Json,
            want_response_headers: false,
            raw_passthrough: false,
            protocol: ProtocolPreference::Http1,
            range: None,
        }
    }

    /// Add one query parameter (percent-encoded at build time).
    pub fn query(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a one-off header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(&mut self, value: impl Into<String>) -> &mut Self {
        self.content_type = Some(value.into());
        self
    }

    /// Raw body, sent untouched.
    pub fn body_bytes(&mut self, data: Vec<u8>) -> &mut Self {
        self.body = Some(RequestBody::Bytes(data));
        self
    }

    /// String body, sent untouched.
    pub fn body_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.body = Some(RequestBody::Text(text.into()));
        self
    }

    /// Structured body; JSON-serialized at build time with content type
    /// application/json unless one was set explicitly.
    pub fn body_json<T: serde::Serialize>(&mut self, value: &T) -> Result<&mut Self, ConfigError> {
        let json = serde_json::to_value(value)
            .map_err(|e| ConfigError::new(format!("body serialization failed: {}", e)))?;
        self.body = Some(RequestBody::Json(json));
        Ok(self)
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn response_kind(&mut self, kind: ResponseKind) -> &mut Self {
        self.response_kind = kind;
        self
    }

    /// Wrap the success value as {body, headers, status}.
    pub fn want_response_headers(&mut self, want: bool) -> &mut Self {
        self.want_response_headers = want;
        self
    }

    /// Resolve with the live response stream instead of a buffered body.
    /// Only honoured by the stream executor.
    pub fn raw_passthrough(&mut self) -> &mut Self {
        self.raw_passthrough = true;
        self
    }

    /// Opt into a pooled multiplexed HTTP/2 session for this request.
    pub fn use_http2(&mut self) -> &mut Self {
        self.protocol = ProtocolPreference::Http2;
        self
    }

    /// Request a byte range. Bounds are validated here, before any I/O.
    pub fn range(&mut self, start: Option<i64>, end: Option<i64>) -> Result<&mut Self, ConfigError> {
        self.range = range_header_value(start, end)?;
        Ok(self)
    }

    /// Conditional request on an entity tag (quoted per convention).
    pub fn if_match(&mut self, etag: &str) -> &mut Self {
        self.headers
            .push(("If-Match".to_string(), quote_entity_tag(etag)));
        self
    }

    pub fn if_range(&mut self, etag: &str) -> &mut Self {
        self.headers
            .push(("If-Range".to_string(), quote_entity_tag(etag)));
        self
    }

    /// Build the immutable transport descriptor. All configuration errors
    /// (bad URL, bad range, unserializable body) surface here.
    pub fn build(&self) -> Result<RequestDescriptor, ConfigError> {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&encode_query(&self.query));
        }
        let url = Url::parse(&url)?;

        let mut headers = vec![
            (HEADER_APPLICATION_ID.to_string(), self.app_id.clone()),
            (HEADER_API_KEY.to_string(), self.api_key.clone()),
        ];
        if let Some(token) = &self.session_token {
            headers.push((HEADER_SESSION_TOKEN.to_string(), token.clone()));
        }

        let (body, default_content_type) = match &self.body {
            None => (None, None),
            Some(RequestBody::Bytes(data)) => (Some(data.clone()), None),
            Some(RequestBody::Text(text)) => (Some(text.clone().into_bytes()), None),
            Some(RequestBody::Json(value)) => {
                let data = serde_json::to_vec(value)
                    .map_err(|e| ConfigError::new(format!("body serialization failed: {}", e)))?;
                (Some(data), Some("application/json"))
            }
        };
        match (&self.content_type, default_content_type) {
            (Some(explicit), _) => headers.push(("Content-Type".to_string(), explicit.clone())),
            (None, Some(default)) => headers.push(("Content-Type".to_string(), default.to_string())),
            (None, None) => {}
        }
        if let Some(range) = &self.range {
            headers.push(("Range".to_string(), range.clone()));
        }
        headers.extend(self.headers.iter().cloned());

        Ok(RequestDescriptor {
            method: self.method,
            url,
            headers,
            body,
            timeout: self.timeout.unwrap_or_else(config::default_timeout),
            response_kind: self.response_kind,
            want_response_headers: self.want_response_headers,
            raw_passthrough: self.raw_passthrough,
            protocol: self.protocol,
        })
    }

    /// Build, dispatch to the environment's executor, and return the
    /// awaitable. Configuration errors are returned here synchronously; the
    /// awaitable only ever carries the request outcome.
    pub fn start(self) -> Result<Pending, ConfigError> {
        let descriptor = self.build()?;
        let (completion, pending) = Completion::channel();
        transport::dispatch(descriptor, completion);
        Ok(pending)
    }

    /// Awaitable convenience: start and wait.
    pub async fn execute(self) -> Result<ApiSuccess, SdkError> {
        let pending = self.start()?;
        pending.wait().await.map_err(SdkError::Api)
    }

    /// Blocking convenience for callers outside a runtime.
    pub fn execute_blocking(self) -> Result<ApiSuccess, SdkError> {
        let pending = self.start()?;
        pending.wait_blocking().map_err(SdkError::Api)
    }

    /// Callback-pair convention: no awaitable is returned; the outcome is
    /// funnelled into exactly one of the callbacks. Callbacks may run on a
    /// runtime worker or a backend thread.
    pub fn execute_with(self, on_success: OnSuccess, on_error: OnError) -> Result<(), ConfigError> {
        let pending = self.start()?;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match pending.wait().await {
                        Ok(value) => on_success(value),
                        Err(e) => on_error(e),
                    }
                });
            }
            Err(_) => {
                std::thread::spawn(move || match pending.wait_blocking() {
                    Ok(value) => on_success(value),
                    Err(e) => on_error(e),
                });
            }
        }
        Ok(())
    }
}

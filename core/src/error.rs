/*
 * error.rs
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

//! SDK errors: the unified request error (ApiError), synchronous
//! configuration errors (ConfigError), and the combined SdkError used by the
//! service layer.

use std::fmt;

/// Unified error for a failed request. Status 0 is reserved for
/// transport-level failures (connect, timeout, abort, decode); any real HTTP
/// status outside [200,300) is a protocol failure and carries the server's
/// body in `response_text` when it was decodable.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: u16,
    pub status_text: String,
    pub response_text: String,
    /// Parsed JSON error body when the server sent one.
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    /// Transport-level failure (never got a real HTTP status).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            status_text: message.into(),
            response_text: String::new(),
            data: None,
        }
    }

    /// Request timed out before completion.
    pub fn timeout() -> Self {
        Self::transport("Request timed out")
    }

    /// Response body could not be decoded as the requested kind.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::transport(format!("Response decode failed: {}", message.into()))
    }

    /// HTTP/2 stream ended without ever delivering response headers.
    pub fn no_response() -> Self {
        Self::transport("Unable to get proper response")
    }

    /// HTTP-level failure with the server's status and (decoded) body.
    pub fn protocol(status: u16, status_text: impl Into<String>, response_text: String) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            response_text,
            data: None,
        }
    }

    /// True when the request never reached a real HTTP status.
    pub fn is_transport(&self) -> bool {
        self.status == 0
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == 0 {
            write!(f, "{}", self.status_text)
        } else {
            write!(f, "{} {}", self.status, self.status_text)
        }
    }
}

impl std::error::Error for ApiError {}

/// Configuration errors: raised synchronously at call time, before any I/O,
/// and never delivered through a completion channel.
#[derive(Debug)]
pub enum ConfigError {
    /// Generic error message.
    Message(String),
    /// TLS option key outside the allow-list. This is a security boundary:
    /// unknown keys are rejected, not ignored.
    DisallowedTlsOption { key: String },
    /// URL could not be parsed into scheme/host/port/path.
    InvalidUrl(String),
    /// Range bound was negative.
    InvalidRange(String),
}

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Message(m) => write!(f, "{}", m),
            ConfigError::DisallowedTlsOption { key } => {
                write!(f, "TLS option {:?} is not allowed", key)
            }
            ConfigError::InvalidUrl(u) => write!(f, "invalid URL: {}", u),
            ConfigError::InvalidRange(m) => write!(f, "invalid range: {}", m),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error type for the service layer: either a synchronous configuration
/// error or an asynchronous request failure.
#[derive(Debug)]
pub enum SdkError {
    Config(ConfigError),
    Api(ApiError),
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::Config(e) => write!(f, "{}", e),
            SdkError::Api(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<ConfigError> for SdkError {
    fn from(e: ConfigError) -> Self {
        SdkError::Config(e)
    }
}

impl From<ApiError> for SdkError {
    fn from(e: ApiError) -> Self {
        SdkError::Api(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_status_zero() {
        assert!(ApiError::timeout().is_transport());
        assert!(ApiError::transport("connect refused").is_transport());
        assert!(ApiError::no_response().is_transport());
        assert!(!ApiError::protocol(404, "Not Found", String::new()).is_transport());
    }

    #[test]
    fn display_includes_status_for_protocol_errors() {
        let e = ApiError::protocol(503, "Service Unavailable", String::new());
        assert_eq!(e.to_string(), "503 Service Unavailable");
        let t = ApiError::timeout();
        assert_eq!(t.to_string(), "Request timed out");
    }
}

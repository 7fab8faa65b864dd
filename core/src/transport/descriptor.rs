/*
 * descriptor.rs
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

//! Transport descriptor: the immutable value handed to an executor. Built
//! fresh per call by the facade, never reused. Also home to the URL parser,
//! query-string serialization, and the Range/entity-tag header builders,
//! all of which fail fast (ConfigError) before any I/O.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::ConfigError;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// How the response body should be decoded before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Text,
    /// JSON parse with text fallback when the body is not valid JSON.
    Json,
    Binary,
}

/// Which protocol the stream executor should use. Http2 opts into the
/// multiplexed session pool; the blocking executor ignores this and always
/// speaks HTTP/1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolPreference {
    Http1,
    Http2,
}

/// Parsed request URL: scheme, host, port, path + query.
#[derive(Debug, Clone)]
pub struct Url {
    pub secure: bool,
    pub host: String,
    pub port: u16,
    /// Path plus serialized query string, always starting with '/'.
    pub path_and_query: String,
}

impl Url {
    /// Parse an absolute http/https URL. Anything else is a ConfigError.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let (secure, rest) = if let Some(r) = url.strip_prefix("https://") {
            (true, r)
        } else if let Some(r) = url.strip_prefix("http://") {
            (false, r)
        } else {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        };
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        let (host, port) = match authority.rfind(':') {
            Some(colon) => {
                let port = authority[colon + 1..]
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
                (authority[..colon].to_string(), port)
            }
            None => (authority.to_string(), if secure { 443 } else { 80 }),
        };
        if host.is_empty() {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            secure,
            host,
            port,
            path_and_query: path.to_string(),
        })
    }

    /// Authority key used by the HTTP/2 session pool: scheme://host:port.
    pub fn authority(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Host header value: port omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        let default = if self.secure { 443 } else { 80 };
        if self.port == default {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Immutable description of one request, handed to an executor. Constructed
/// fresh per call; executors never mutate or reuse it.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: Url,
    /// Ordered header list, names as given (sent verbatim on HTTP/1.1,
    /// lowercased for HTTP/2).
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub response_kind: ResponseKind,
    /// Wrap the success value as {body, headers, status}.
    pub want_response_headers: bool,
    /// Resolve with the live response stream instead of buffering.
    pub raw_passthrough: bool,
    pub protocol: ProtocolPreference,
}

impl RequestDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Query component safe set: RFC 3986 unreserved characters only; everything
/// else (including the sub-delims '&', '=', '+') is percent-encoded so values
/// survive verbatim.
const QUERY_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'?')
    .add(b'/')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b':')
    .add(b';')
    .add(b'@')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'|');

/// Serialize query parameters: percent-encoded key=value pairs joined with
/// '&'. Empty input yields an empty string (no '?' is appended anywhere).
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, QUERY_COMPONENT),
                utf8_percent_encode(v, QUERY_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Build a Range header value per RFC 7233: both bounds → "bytes=start-end",
/// start only → "bytes=start-", end only → "bytes=-end", neither → None.
/// Bounds are used exactly as given (no ordering correction); negative
/// bounds fail fast.
pub fn range_header_value(
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Option<String>, ConfigError> {
    if let Some(s) = start {
        if s < 0 {
            return Err(ConfigError::InvalidRange(format!("start {}", s)));
        }
    }
    if let Some(e) = end {
        if e < 0 {
            return Err(ConfigError::InvalidRange(format!("end {}", e)));
        }
    }
    Ok(match (start, end) {
        (None, None) => None,
        (Some(s), None) => Some(format!("bytes={}-", s)),
        (None, Some(e)) => Some(format!("bytes=-{}", e)),
        (Some(s), Some(e)) => Some(format!("bytes={}-{}", s, e)),
    })
}

/// Wrap an entity tag in double quotes for If-Match / If-Range, unless the
/// caller already quoted it.
pub fn quote_entity_tag(tag: &str) -> String {
    if tag.starts_with('"') && tag.ends_with('"') && tag.len() >= 2 {
        tag.to_string()
    } else {
        format!("\"{}\"", tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_parse_defaults_ports() {
        let u = Url::parse("https://api.example.com/2013-09-01/classes").unwrap();
        assert!(u.secure);
        assert_eq!(u.host, "api.example.com");
        assert_eq!(u.port, 443);
        assert_eq!(u.path_and_query, "/2013-09-01/classes");

        let u = Url::parse("http://localhost").unwrap();
        assert!(!u.secure);
        assert_eq!(u.port, 80);
        assert_eq!(u.path_and_query, "/");
    }

    #[test]
    fn url_parse_explicit_port_and_authority() {
        let u = Url::parse("https://host.example:8443/a/b").unwrap();
        assert_eq!(u.port, 8443);
        assert_eq!(u.authority(), "https://host.example:8443");
        assert_eq!(u.host_header(), "host.example:8443");
        let u = Url::parse("https://host.example/a").unwrap();
        assert_eq!(u.host_header(), "host.example");
    }

    #[test]
    fn url_parse_rejects_other_schemes() {
        assert!(Url::parse("ftp://host/x").is_err());
        assert!(Url::parse("host/x").is_err());
        assert!(Url::parse("https://").is_err());
        assert!(Url::parse("https://:8443/x").is_err());
        assert!(Url::parse("https://h:notaport/x").is_err());
    }

    #[test]
    fn query_encoding_joins_with_ampersand() {
        let q = encode_query(&[
            ("where".to_string(), "{\"a\":1}".to_string()),
            ("limit".to_string(), "10".to_string()),
        ]);
        assert_eq!(q, "where=%7B%22a%22%3A1%7D&limit=10");
        assert_eq!(encode_query(&[]), "");
    }

    #[test]
    fn query_encoding_escapes_reserved() {
        let q = encode_query(&[("k".to_string(), "a&b=c d+e".to_string())]);
        assert_eq!(q, "k=a%26b%3Dc%20d%2Be");
    }

    // Exhaustive table from the transport contract.
    #[test]
    fn range_header_table() {
        assert_eq!(range_header_value(None, None).unwrap(), None);
        assert_eq!(range_header_value(Some(0), None).unwrap().unwrap(), "bytes=0-");
        assert_eq!(range_header_value(None, Some(0)).unwrap().unwrap(), "bytes=-0");
        assert_eq!(
            range_header_value(Some(1), Some(100)).unwrap().unwrap(),
            "bytes=1-100"
        );
        // No ordering correction.
        assert_eq!(
            range_header_value(Some(100), Some(1)).unwrap().unwrap(),
            "bytes=100-1"
        );
        assert!(range_header_value(Some(-1), None).is_err());
        assert!(range_header_value(None, Some(-5)).is_err());
    }

    #[test]
    fn entity_tag_quoting() {
        assert_eq!(quote_entity_tag("abc123"), "\"abc123\"");
        assert_eq!(quote_entity_tag("\"abc123\""), "\"abc123\"");
    }
}

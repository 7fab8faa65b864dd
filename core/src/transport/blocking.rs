/*
 * blocking.rs
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

//! Blocking executor: the synchronous-environment strategy. One std socket
//! per request (optionally wrapped in rustls), HTTP/1.1 only, fully
//! buffered. The exchange progresses open → send → parse-to-done, and only
//! the terminal state is surfaced, as a single completion.
//! `ProtocolPreference::Http2` and raw passthrough are not available here.
//!
//! Divergences kept on purpose: the headers envelope carries one
//! concatenated header-block string (not a map), and a host-reported status
//! of 0 is surfaced with the fixed "Not Found" status text.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::config;
use crate::error::ApiError;
use crate::transport::completion::Completion;
use crate::transport::descriptor::{RequestDescriptor, ResponseKind};
use crate::transport::response::{
    decode_payload, default_status_text, ApiSuccess, Envelope, HeaderBlock,
};
use crate::transport::tls::{client_config, Alpn};
use crate::wire::h1::{H1Events, H1Parser};

/// Accumulates the full response; the host-side buffer of this executor.
#[derive(Default)]
struct BufferedResponse {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl H1Events for BufferedResponse {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        self.status = code;
        self.reason = reason.map(|s| s.to_string());
    }
    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
    fn start_body(&mut self) {}
    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }
    fn end_body(&mut self) {}
    fn trailer(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
    fn complete(&mut self) {}
}

/// Run one request to completion and deliver the outcome. One-shot: no
/// retries, no partial success.
pub fn execute(descriptor: RequestDescriptor, completion: Arc<Completion>) {
    match exchange(&descriptor) {
        Ok(response) => finish(&descriptor, response, &completion),
        Err(e) => completion.reject(e),
    }
}

fn exchange(descriptor: &RequestDescriptor) -> Result<BufferedResponse, ApiError> {
    let deadline = Instant::now() + descriptor.timeout;

    let addr = (descriptor.url.host.as_str(), descriptor.url.port)
        .to_socket_addrs()
        .map_err(|e| ApiError::transport(format!("could not resolve host: {}", e)))?
        .next()
        .ok_or_else(|| {
            ApiError::transport(format!("could not resolve host {}", descriptor.url.host))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, remaining(deadline)?)
        .map_err(map_io_error)?;

    if descriptor.url.secure {
        let tls_config = client_config(&config::tls_options(), Alpn::Http1)
            .map_err(|e| ApiError::transport(e.to_string()))?;
        let server_name = rustls::pki_types::ServerName::try_from(descriptor.url.host.clone())
            .map_err(|_| ApiError::transport("invalid host name for TLS"))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| ApiError::transport(format!("TLS setup failed: {}", e)))?;
        let mut stream = rustls::StreamOwned::new(conn, tcp);
        run_exchange(descriptor, &mut stream, deadline)
    } else {
        let mut stream = tcp;
        run_exchange(descriptor, &mut stream, deadline)
    }
}

/// Write the request and drive the response parser to completion.
fn run_exchange<S: Read + Write + SocketDeadline>(
    descriptor: &RequestDescriptor,
    stream: &mut S,
    deadline: Instant,
) -> Result<BufferedResponse, ApiError> {
    stream.set_deadline(remaining(deadline)?)?;
    stream
        .write_all(&request_head(descriptor))
        .map_err(map_io_error)?;
    if let Some(body) = &descriptor.body {
        stream.write_all(body).map_err(map_io_error)?;
    }
    stream.flush().map_err(map_io_error)?;

    let mut parser = H1Parser::new();
    let mut response = BufferedResponse::default();
    let mut buf = BytesMut::with_capacity(8192);
    let mut tmp = [0u8; 8192];
    while !parser.is_done() {
        stream.set_deadline(remaining(deadline)?)?;
        match stream.read(&mut tmp) {
            Ok(0) => {
                parser
                    .eof(&mut response)
                    .map_err(|e| ApiError::transport(e.to_string()))?;
            }
            Ok(n) => {
                buf.extend_from_slice(&tmp[..n]);
                parser
                    .receive(&mut buf, &mut response)
                    .map_err(|e| ApiError::transport(e.to_string()))?;
            }
            Err(e) => return Err(map_io_error(e)),
        }
    }
    Ok(response)
}

/// Serialize the request head. The body, when present, is framed with
/// Content-Length (this executor never sends chunked requests); the
/// connection is one-shot so keep-alive is declined.
fn request_head(descriptor: &RequestDescriptor) -> Vec<u8> {
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\n",
        descriptor.method.as_str(),
        descriptor.url.path_and_query,
        descriptor.url.host_header()
    );
    for (name, value) in &descriptor.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if let Some(body) = &descriptor.body {
        if descriptor.header("Content-Length").is_none() {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
    }
    head.push_str("Connection: close\r\n\r\n");
    head.into_bytes()
}

/// Classify the buffered response and deliver it, preserving this
/// executor's envelope and status-0 contracts.
fn finish(descriptor: &RequestDescriptor, response: BufferedResponse, completion: &Completion) {
    let BufferedResponse {
        status,
        reason,
        headers,
        body,
    } = response;

    if (200..300).contains(&status) {
        let payload = match decode_payload(descriptor.response_kind, body) {
            Ok(p) => p,
            Err(e) => {
                completion.reject(e);
                return;
            }
        };
        if descriptor.want_response_headers {
            let block = headers
                .iter()
                .map(|(n, v)| format!("{}: {}\r\n", n, v))
                .collect::<String>();
            completion.resolve(ApiSuccess::Enveloped(Envelope {
                body: payload,
                headers: HeaderBlock::Raw(block),
                status,
            }));
        } else {
            completion.resolve(ApiSuccess::Body(payload));
        }
        return;
    }

    // Status 0 means the exchange never yielded a usable status; the fixed
    // "Not Found" text matches the long-standing contract for this executor.
    let status_text = if status == 0 {
        "Not Found".to_string()
    } else {
        reason.unwrap_or_else(|| default_status_text(status).to_string())
    };
    let response_text = if descriptor.response_kind == ResponseKind::Binary {
        String::new()
    } else {
        String::from_utf8_lossy(&body).into_owned()
    };
    let data = serde_json::from_slice::<serde_json::Value>(&body).ok();
    let mut err = ApiError::protocol(status, status_text, response_text);
    err.data = data;
    completion.reject(err);
}

fn remaining(deadline: Instant) -> Result<Duration, ApiError> {
    let now = Instant::now();
    if now >= deadline {
        return Err(ApiError::timeout());
    }
    Ok(deadline - now)
}

fn map_io_error(e: std::io::Error) -> ApiError {
    match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => ApiError::timeout(),
        _ => ApiError::transport(format!("connection failed: {}", e)),
    }
}

/// Socket deadline plumbing for plain and TLS streams.
trait SocketDeadline {
    fn set_deadline(&mut self, timeout: Duration) -> Result<(), ApiError>;
}

impl SocketDeadline for TcpStream {
    fn set_deadline(&mut self, timeout: Duration) -> Result<(), ApiError> {
        self.set_read_timeout(Some(timeout))
            .and_then(|_| self.set_write_timeout(Some(timeout)))
            .map_err(|e| ApiError::transport(e.to_string()))
    }
}

impl SocketDeadline for rustls::StreamOwned<rustls::ClientConnection, TcpStream> {
    fn set_deadline(&mut self, timeout: Duration) -> Result<(), ApiError> {
        self.sock.set_deadline(timeout)
    }
}

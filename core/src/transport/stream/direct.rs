/*
 * direct.rs
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

//! Direct sub-protocol: one connection per request over HTTP/1.1, plain or
//! TLS, optionally tunnelled through the process-wide HTTP proxy.
//!
//! Buffered mode accumulates the body and classifies at end-of-response.
//! Raw-passthrough mode resolves with the live chunk stream as soon as a 2xx
//! header block arrives; from that point ownership of consumption is the
//! caller's and the descriptor timeout no longer applies. The timeout aborts
//! the connection in every pre-resolution phase.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config;
use crate::error::ApiError;
use crate::transport::completion::Completion;
use crate::transport::descriptor::RequestDescriptor;
use crate::transport::proxy;
use crate::transport::response::{finish_buffered, ApiSuccess, RawResponse};
use crate::transport::tls::{client_config, Alpn};
use crate::wire::h1::{H1Events, H1Parser};

/// Unified request stream: plain TCP or TLS.
enum DirectStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for DirectStream {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut *self {
            DirectStream::Plain(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            DirectStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DirectStream {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match &mut *self {
            DirectStream::Plain(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            DirectStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut *self {
            DirectStream::Plain(s) => std::pin::Pin::new(s).poll_flush(cx),
            DirectStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut *self {
            DirectStream::Plain(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            DirectStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Response accumulator. In raw mode the body only holds chunks that arrived
/// in the same read as the header block, before the stream was handed over.
#[derive(Default)]
struct Collected {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl H1Events for Collected {
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

/// Forwards body chunks into the raw channel after hand-over.
struct RawPump {
    tx: mpsc::UnboundedSender<Result<Bytes, ApiError>>,
}

impl H1Events for RawPump {
    fn status(&mut self, _code: u16, _reason: Option<&str>) {}
    fn header(&mut self, _name: &str, _value: &str) {}
    fn start_body(&mut self) {}
    fn body_chunk(&mut self, data: &[u8]) {
        let _ = self.tx.send(Ok(Bytes::copy_from_slice(data)));
    }
    fn end_body(&mut self) {}
    fn trailer(&mut self, _name: &str, _value: &str) {}
    fn complete(&mut self) {}
}

/// Run one request over its own connection and deliver the outcome.
pub async fn execute(descriptor: RequestDescriptor, completion: Arc<Completion>) {
    let deadline = Instant::now() + descriptor.timeout;
    if descriptor.raw_passthrough {
        execute_raw(descriptor, completion, deadline).await;
    } else {
        let result = match tokio::time::timeout_at(deadline, run_buffered(&descriptor)).await {
            Ok(r) => r,
            Err(_) => Err(ApiError::timeout()),
        };
        match result {
            Ok(collected) => {
                match finish_buffered(
                    &descriptor,
                    collected.status,
                    collected.reason.as_deref(),
                    collected.headers,
                    collected.body,
                ) {
                    Ok(success) => completion.resolve(success),
                    Err(e) => completion.reject(e),
                }
            }
            Err(e) => completion.reject(e),
        }
    }
}

async fn run_buffered(descriptor: &RequestDescriptor) -> Result<Collected, ApiError> {
    let mut stream = connect(descriptor).await?;
    send_request(&mut stream, descriptor).await?;

    let mut parser = H1Parser::new();
    let mut collected = Collected::default();
    let mut buf = BytesMut::with_capacity(8192);
    while !parser.is_done() {
        let n = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| ApiError::transport(format!("read failed: {}", e)))?;
        if n == 0 {
            parser
                .eof(&mut collected)
                .map_err(|e| ApiError::transport(e.to_string()))?;
        } else {
            parser
                .receive(&mut buf, &mut collected)
                .map_err(|e| ApiError::transport(e.to_string()))?;
        }
    }
    Ok(collected)
}

async fn execute_raw(
    descriptor: RequestDescriptor,
    completion: Arc<Completion>,
    deadline: Instant,
) {
    // Everything up to the header block runs under the timeout.
    let setup = tokio::time::timeout_at(deadline, read_until_headers(&descriptor)).await;
    let (mut stream, mut parser, mut buf, mut collected) = match setup {
        Ok(Ok(parts)) => parts,
        Ok(Err(e)) => {
            completion.reject(e);
            return;
        }
        Err(_) => {
            completion.reject(ApiError::timeout());
            return;
        }
    };

    if !(200..300).contains(&collected.status) {
        // Failure: buffer the rest (still under the timeout) and reject with
        // the protocol error, same as the buffered path.
        let rest = tokio::time::timeout_at(
            deadline,
            drain_to_end(&mut stream, &mut parser, &mut buf, &mut collected),
        )
        .await;
        let outcome = match rest {
            Ok(Ok(())) => finish_buffered(
                &descriptor,
                collected.status,
                collected.reason.as_deref(),
                collected.headers,
                collected.body,
            ),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ApiError::timeout()),
        };
        match outcome {
            Ok(success) => completion.resolve(success),
            Err(e) => completion.reject(e),
        }
        return;
    }

    // Success: hand the live stream over. The caller owns consumption now;
    // the descriptor timeout no longer applies.
    let (tx, rx) = mpsc::unbounded_channel();
    if !collected.body.is_empty() {
        let _ = tx.send(Ok(Bytes::from(std::mem::take(&mut collected.body))));
    }
    completion.resolve(ApiSuccess::Raw(RawResponse::new(
        collected.status,
        collected.headers,
        rx,
    )));

    if parser.is_done() {
        return; // channel closes when tx drops
    }
    tokio::spawn(async move {
        let mut pump = RawPump { tx };
        loop {
            match stream.read_buf(&mut buf).await {
                Ok(0) => {
                    if let Err(e) = parser.eof(&mut pump) {
                        let _ = pump.tx.send(Err(ApiError::transport(e.to_string())));
                    }
                    return;
                }
                Ok(_) => {
                    if let Err(e) = parser.receive(&mut buf, &mut pump) {
                        let _ = pump.tx.send(Err(ApiError::transport(e.to_string())));
                        return;
                    }
                    if parser.is_done() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = pump
                        .tx
                        .send(Err(ApiError::transport(format!("read failed: {}", e))));
                    return;
                }
            }
        }
    });
}

type RawSetup = (DirectStream, H1Parser, BytesMut, Collected);

/// Connect, send, and read until the full header block is parsed. Body
/// chunks that arrive in the same reads are kept in `Collected.body`.
async fn read_until_headers(descriptor: &RequestDescriptor) -> Result<RawSetup, ApiError> {
    let mut stream = connect(descriptor).await?;
    send_request(&mut stream, descriptor).await?;

    let mut parser = H1Parser::new();
    let mut collected = Collected::default();
    let mut buf = BytesMut::with_capacity(8192);
    while !parser.headers_done() {
        let n = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| ApiError::transport(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(ApiError::transport("connection closed before response"));
        }
        parser
            .receive(&mut buf, &mut collected)
            .map_err(|e| ApiError::transport(e.to_string()))?;
    }
    Ok((stream, parser, buf, collected))
}

async fn drain_to_end(
    stream: &mut DirectStream,
    parser: &mut H1Parser,
    buf: &mut BytesMut,
    collected: &mut Collected,
) -> Result<(), ApiError> {
    while !parser.is_done() {
        let n = stream
            .read_buf(buf)
            .await
            .map_err(|e| ApiError::transport(format!("read failed: {}", e)))?;
        if n == 0 {
            parser
                .eof(collected)
                .map_err(|e| ApiError::transport(e.to_string()))?;
        } else {
            parser
                .receive(buf, collected)
                .map_err(|e| ApiError::transport(e.to_string()))?;
        }
    }
    Ok(())
}

/// Open the connection: proxy tunnel when configured, then TLS when the
/// scheme requires it.
async fn connect(descriptor: &RequestDescriptor) -> Result<DirectStream, ApiError> {
    let host = descriptor.url.host.as_str();
    let port = descriptor.url.port;

    let tcp = match config::proxy() {
        Some(proxy_config) => proxy::tunnel(&proxy_config, host, port)
            .await
            .map_err(|e| ApiError::transport(format!("proxy tunnel failed: {}", e)))?,
        None => TcpStream::connect((host, port))
            .await
            .map_err(|e| ApiError::transport(format!("connect failed: {}", e)))?,
    };

    if !descriptor.url.secure {
        return Ok(DirectStream::Plain(tcp));
    }

    let tls_config = client_config(&config::tls_options(), Alpn::Http1)
        .map_err(|e| ApiError::transport(e.to_string()))?;
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|_| ApiError::transport("invalid host name for TLS"))?;
    let tls = TlsConnector::from(tls_config)
        .connect(server_name, tcp)
        .await
        .map_err(|e| ApiError::transport(format!("TLS handshake failed: {}", e)))?;
    Ok(DirectStream::Tls(Box::new(tls)))
}

/// Serialize and send the request. Bodies are framed with Content-Length
/// unless the caller set explicit framing headers.
async fn send_request(
    stream: &mut DirectStream,
    descriptor: &RequestDescriptor,
) -> Result<(), ApiError> {
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
        if descriptor.header("Content-Length").is_none()
            && descriptor.header("Transfer-Encoding").is_none()
        {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
    }
    head.push_str("Connection: close\r\n\r\n");

    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|e| ApiError::transport(format!("write failed: {}", e)))?;
    if let Some(body) = &descriptor.body {
        stream
            .write_all(body)
            .await
            .map_err(|e| ApiError::transport(format!("write failed: {}", e)))?;
    }
    stream
        .flush()
        .await
        .map_err(|e| ApiError::transport(format!("write failed: {}", e)))?;
    Ok(())
}

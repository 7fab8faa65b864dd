/*
 * h2.rs
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

//! Multiplexed HTTP/2 session: one long-lived TLS connection per authority,
//! owned by a spawned task. Requests from any number of callers are queued
//! over an mpsc channel and issued as concurrent streams; per-stream replies
//! travel back over oneshot channels.
//!
//! The task owns all protocol state: frame codec, HPACK tables, stream map,
//! and both directions of flow control. Session lifetime is independent of
//! any request; the pool keeps the handle until the session dies or is
//! explicitly closed. Shutdown is graceful first (GOAWAY, drain in-flight
//! streams) with a forced kill as fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config;
use crate::error::ApiError;
use crate::transport::descriptor::Url;
use crate::transport::proxy;
use crate::transport::response::RawResponse;
use crate::transport::tls::{client_config, Alpn};
use crate::wire::h2::{
    error_code_name, frames, FrameReader, FrameSink, FrameWriter, DEFAULT_INITIAL_WINDOW_SIZE,
    DEFAULT_MAX_FRAME_SIZE, ERROR_CANCEL, ERROR_NO_ERROR, SETTING_ENABLE_PUSH,
    SETTING_INITIAL_WINDOW_SIZE, SETTING_MAX_CONCURRENT_STREAMS, SETTING_MAX_FRAME_SIZE,
};
use crate::wire::hpack;

/// How long a graceful shutdown may drain before the session is destroyed.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Response from one HTTP/2 stream, before status classification.
#[derive(Debug)]
pub enum H2Response {
    Buffered {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Raw(RawResponse),
}

/// Why a session could not be opened.
#[derive(Debug)]
pub enum SessionOpenError {
    /// TLS succeeded but ALPN negotiated http/1.1; the caller should fall
    /// back to the direct sub-protocol.
    NotNegotiated,
    Failed(ApiError),
}

type Reply = oneshot::Sender<Result<H2Response, ApiError>>;

pub(crate) enum Command {
    Request {
        token: u64,
        head: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        raw: bool,
        reply: Reply,
    },
    Abort {
        token: u64,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
    Kill,
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Handle to one live session. Cheap to clone via Arc in the pool; liveness
/// is observable through the command channel.
pub struct H2Session {
    authority: String,
    commands: mpsc::UnboundedSender<Command>,
}

impl H2Session {
    /// Open a session to the URL's authority: TCP (optionally via proxy
    /// tunnel), TLS with ALPN h2 preferred, connection preface, then the
    /// spawned connection task takes the socket over.
    pub async fn open(url: &Url) -> Result<H2Session, SessionOpenError> {
        let authority = url.authority();
        let host = url.host.as_str();

        let tcp = match config::proxy() {
            Some(proxy_config) => proxy::tunnel(&proxy_config, host, url.port)
                .await
                .map_err(|e| {
                    SessionOpenError::Failed(ApiError::transport(format!(
                        "proxy tunnel failed: {}",
                        e
                    )))
                })?,
            None => TcpStream::connect((host, url.port)).await.map_err(|e| {
                SessionOpenError::Failed(ApiError::transport(format!("connect failed: {}", e)))
            })?,
        };

        let tls_config = client_config(&config::tls_options(), Alpn::H2)
            .map_err(|e| SessionOpenError::Failed(ApiError::transport(e.to_string())))?;
        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|_| SessionOpenError::Failed(ApiError::transport("invalid host name")))?;
        let tls = TlsConnector::from(tls_config)
            .connect(server_name, tcp)
            .await
            .map_err(|e| {
                SessionOpenError::Failed(ApiError::transport(format!(
                    "TLS handshake failed: {}",
                    e
                )))
            })?;

        let negotiated_h2 = tls.get_ref().1.alpn_protocol() == Some(b"h2".as_ref());
        if !negotiated_h2 {
            return Err(SessionOpenError::NotNegotiated);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(connection_task(tls, command_rx, authority.clone()));
        Ok(H2Session {
            authority,
            commands: command_tx,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// True while the connection task is running. A dead session is evicted
    /// from the pool on the next sweep.
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Issue one request as a stream on this session. On timeout the stream
    /// is aborted with RST_STREAM(CANCEL); the session itself stays usable.
    pub async fn request(
        &self,
        head: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        raw: bool,
        deadline: tokio::time::Instant,
    ) -> Result<H2Response, ApiError> {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Request {
                token,
                head,
                body,
                raw,
                reply: reply_tx,
            })
            .map_err(|_| ApiError::transport("session closed"))?;
        match tokio::time::timeout_at(deadline, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApiError::transport("session terminated")),
            Err(_) => {
                let _ = self.commands.send(Command::Abort { token });
                Err(ApiError::timeout())
            }
        }
    }

    /// Graceful close: GOAWAY, drain in-flight streams, then force-destroy
    /// if draining exceeds the deadline. Listeners are released either way.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Shutdown { done: done_tx })
            .is_err()
        {
            return; // already dead
        }
        if tokio::time::timeout(DRAIN_TIMEOUT, done_rx).await.is_err() {
            let _ = self.commands.send(Command::Kill);
        }
    }

    /// Session handle whose task only parks the command channel; for pool
    /// bookkeeping tests.
    #[cfg(test)]
    pub(crate) fn stub(authority: &str) -> (H2Session, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            H2Session {
                authority: authority.to_string(),
                commands: tx,
            },
            rx,
        )
    }
}

// ── Connection task ──────────────────────────────────────────────────

struct PendingBody {
    data: Vec<u8>,
    offset: usize,
}

struct StreamState {
    token: u64,
    reply: Option<Reply>,
    raw: bool,
    raw_tx: Option<mpsc::UnboundedSender<Result<Bytes, ApiError>>>,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    header_block: BytesMut,
    end_stream_pending: bool,
    body: Vec<u8>,
    pending: Option<PendingBody>,
    send_window: i64,
}

/// All connection-scoped protocol state. Implements `FrameSink` so the frame
/// reader can dispatch straight into it.
struct Conn {
    authority: String,
    writer: FrameWriter,
    hpack: hpack::Decoder,
    streams: HashMap<u32, StreamState>,
    tokens: HashMap<u64, u32>,
    next_stream_id: u32,
    conn_send_window: i64,
    initial_send_window: i64,
    max_frame_size: usize,
    goaway_received: bool,
    draining: Option<oneshot::Sender<()>>,
    fatal: bool,
}

impl Conn {
    fn new(authority: String) -> Self {
        Self {
            authority,
            writer: FrameWriter::new(),
            hpack: hpack::Decoder::new(4096),
            streams: HashMap::new(),
            tokens: HashMap::new(),
            next_stream_id: 1,
            conn_send_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            initial_send_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            goaway_received: false,
            draining: None,
            fatal: false,
        }
    }

    fn begin_request(
        &mut self,
        token: u64,
        head: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        raw: bool,
        reply: Reply,
    ) {
        if self.goaway_received || self.draining.is_some() {
            let _ = reply.send(Err(ApiError::transport("session is closing")));
            return;
        }
        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;

        let head_refs: Vec<(&str, &str)> = head
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let block = hpack::encode_block(&head_refs);
        let pending = match body {
            Some(data) if !data.is_empty() => Some(PendingBody { data, offset: 0 }),
            _ => None,
        };
        self.writer.headers(stream_id, &block, pending.is_none());

        self.streams.insert(
            stream_id,
            StreamState {
                token,
                reply: Some(reply),
                raw,
                raw_tx: None,
                status: None,
                headers: Vec::new(),
                header_block: BytesMut::new(),
                end_stream_pending: false,
                body: Vec::new(),
                pending,
                send_window: self.initial_send_window,
            },
        );
        self.tokens.insert(token, stream_id);
        self.pump_sends();
    }

    fn abort(&mut self, token: u64) {
        if let Some(stream_id) = self.tokens.remove(&token) {
            if self.streams.remove(&stream_id).is_some() {
                self.writer.rst_stream(stream_id, ERROR_CANCEL);
            }
        }
    }

    fn start_drain(&mut self, done: oneshot::Sender<()>) {
        self.writer.goaway(0, ERROR_NO_ERROR);
        self.draining = Some(done);
    }

    /// Write as much pending body data as both flow-control windows allow.
    fn pump_sends(&mut self) {
        let mut ids: Vec<u32> = self
            .streams
            .iter()
            .filter(|(_, s)| s.pending.is_some())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        for id in ids {
            if self.conn_send_window <= 0 {
                break;
            }
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            let Some(pending) = stream.pending.as_mut() else {
                continue;
            };
            while pending.offset < pending.data.len()
                && self.conn_send_window > 0
                && stream.send_window > 0
            {
                let n = (pending.data.len() - pending.offset)
                    .min(self.conn_send_window as usize)
                    .min(stream.send_window as usize)
                    .min(self.max_frame_size);
                let end = pending.offset + n == pending.data.len();
                self.writer
                    .data(id, &pending.data[pending.offset..pending.offset + n], end);
                pending.offset += n;
                self.conn_send_window -= n as i64;
                stream.send_window -= n as i64;
            }
            if pending.offset >= pending.data.len() {
                stream.pending = None;
            }
        }
    }

    fn finish_stream(&mut self, stream_id: u32) {
        let Some(stream) = self.streams.remove(&stream_id) else {
            return;
        };
        self.tokens.remove(&stream.token);
        if stream.raw_tx.is_some() {
            // Dropping the sender closes the chunk channel: end of stream.
            return;
        }
        if let Some(reply) = stream.reply {
            let outcome = match stream.status {
                Some(status) => Ok(H2Response::Buffered {
                    status,
                    headers: stream.headers,
                    body: stream.body,
                }),
                // Stream ended without response metadata.
                None => Err(ApiError::no_response()),
            };
            let _ = reply.send(outcome);
        }
    }

    fn fail_stream(&mut self, stream_id: u32, error: ApiError) {
        let Some(stream) = self.streams.remove(&stream_id) else {
            return;
        };
        self.tokens.remove(&stream.token);
        if let Some(raw_tx) = stream.raw_tx {
            let _ = raw_tx.send(Err(error));
        } else if let Some(reply) = stream.reply {
            let _ = reply.send(Err(error));
        }
    }

    fn fail_all(&mut self, error: ApiError) {
        let ids: Vec<u32> = self.streams.keys().copied().collect();
        for id in ids {
            self.fail_stream(id, error.clone());
        }
    }

    /// A complete header block arrived for the stream: split pseudo-headers
    /// out, record the status, and hand over raw streams on 2xx.
    fn header_block_done(&mut self, stream_id: u32, end_stream: bool) {
        let block = match self.streams.get_mut(&stream_id) {
            Some(s) => s.header_block.split().freeze(),
            None => return,
        };
        let decoded = match self.hpack.decode_block(&block) {
            Ok(d) => d,
            Err(e) => {
                // Compression state is connection-global; this is fatal.
                eprintln!("[h2] {}: header decode failed: {}", self.authority, e);
                self.writer.goaway(0, frames::ERROR_COMPRESSION_ERROR);
                self.fail_all(ApiError::transport("response header decode failed"));
                self.fatal = true;
                return;
            }
        };
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        for (name, value) in decoded {
            if name == ":status" {
                if stream.status.is_none() {
                    stream.status = value.parse::<u16>().ok();
                }
            } else if !name.starts_with(':') {
                stream.headers.push((name, value));
            }
        }

        if stream.raw {
            if let Some(status) = stream.status {
                if (200..300).contains(&status) && stream.raw_tx.is_none() {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let raw = RawResponse::new(status, stream.headers.clone(), rx);
                    if let Some(reply) = stream.reply.take() {
                        let _ = reply.send(Ok(H2Response::Raw(raw)));
                    }
                    stream.raw_tx = Some(tx);
                }
            }
        }
        if end_stream {
            self.finish_stream(stream_id);
        }
    }
}

impl FrameSink for Conn {
    fn on_data(&mut self, stream_id: u32, end_stream: bool, data: Bytes) {
        // Replenish the connection window even for unknown (e.g. aborted)
        // streams; their data still consumed it.
        if !data.is_empty() {
            self.writer.window_update(0, data.len() as u32);
        }
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        if !data.is_empty() && !end_stream {
            self.writer.window_update(stream_id, data.len() as u32);
        }
        match &stream.raw_tx {
            Some(tx) => {
                let _ = tx.send(Ok(data));
            }
            None => stream.body.extend_from_slice(&data),
        }
        if end_stream {
            self.finish_stream(stream_id);
        }
    }

    fn on_headers(&mut self, stream_id: u32, end_stream: bool, end_headers: bool, fragment: Bytes) {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        stream.header_block.extend_from_slice(&fragment);
        stream.end_stream_pending = end_stream;
        if end_headers {
            self.header_block_done(stream_id, end_stream);
        }
    }

    fn on_continuation(&mut self, stream_id: u32, end_headers: bool, fragment: Bytes) {
        let end_stream = {
            let Some(stream) = self.streams.get_mut(&stream_id) else {
                return;
            };
            stream.header_block.extend_from_slice(&fragment);
            stream.end_stream_pending
        };
        if end_headers {
            self.header_block_done(stream_id, end_stream);
        }
    }

    fn on_settings(&mut self, ack: bool, settings: Vec<(u16, u32)>) {
        if ack {
            return;
        }
        for (id, value) in settings {
            match id {
                SETTING_INITIAL_WINDOW_SIZE => {
                    let delta = value as i64 - self.initial_send_window;
                    self.initial_send_window = value as i64;
                    for stream in self.streams.values_mut() {
                        stream.send_window += delta;
                    }
                }
                SETTING_MAX_FRAME_SIZE => {
                    self.max_frame_size = value as usize;
                }
                _ => {}
            }
        }
        self.writer.settings_ack();
        self.pump_sends();
    }

    fn on_ping(&mut self, ack: bool, opaque: u64) {
        if !ack {
            self.writer.ping(opaque, true);
        }
    }

    fn on_goaway(&mut self, last_stream_id: u32, error_code: u32, _debug: Bytes) {
        if error_code != ERROR_NO_ERROR {
            eprintln!(
                "[h2] {}: GOAWAY {}",
                self.authority,
                error_code_name(error_code)
            );
        }
        self.goaway_received = true;
        // Streams the server will not process are failed now; streams at or
        // below last_stream_id are allowed to finish.
        let unprocessed: Vec<u32> = self
            .streams
            .keys()
            .copied()
            .filter(|id| *id > last_stream_id)
            .collect();
        for id in unprocessed {
            self.fail_stream(id, ApiError::transport("connection closing (GOAWAY)"));
        }
    }

    fn on_window_update(&mut self, stream_id: u32, increment: u32) {
        if stream_id == 0 {
            self.conn_send_window += increment as i64;
        } else if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.send_window += increment as i64;
        }
        self.pump_sends();
    }

    fn on_rst_stream(&mut self, stream_id: u32, error_code: u32) {
        self.fail_stream(
            stream_id,
            ApiError::transport(format!(
                "stream reset by server: {}",
                error_code_name(error_code)
            )),
        );
    }

    fn on_frame_error(&mut self, error_code: u32, _stream_id: u32, message: String) {
        eprintln!("[h2] {}: protocol error: {}", self.authority, message);
        self.writer.goaway(0, error_code);
        self.fail_all(ApiError::transport(format!("protocol error: {}", message)));
        self.fatal = true;
    }
}

async fn flush_writer(
    tls: &mut TlsStream<TcpStream>,
    writer: &mut FrameWriter,
) -> std::io::Result<()> {
    if !writer.is_empty() {
        let bytes = writer.take();
        tls.write_all(&bytes).await?;
        tls.flush().await?;
    }
    Ok(())
}

/// The session's event loop: owns the socket until the session dies.
async fn connection_task(
    mut tls: TlsStream<TcpStream>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    authority: String,
) {
    let mut reader = FrameReader::new();
    let mut conn = Conn::new(authority);
    conn.writer.preface(&[
        (SETTING_ENABLE_PUSH, 0),
        (SETTING_MAX_CONCURRENT_STREAMS, 100),
    ]);
    if flush_writer(&mut tls, &mut conn.writer).await.is_err() {
        conn.fail_all(ApiError::transport("connection failed during preface"));
        return;
    }

    let mut read_buf = BytesMut::with_capacity(DEFAULT_MAX_FRAME_SIZE);
    let mut commands_open = true;
    loop {
        if conn.fatal {
            break;
        }
        if conn.streams.is_empty() {
            if let Some(done) = conn.draining.take() {
                let _ = done.send(());
                break;
            }
            if !commands_open {
                break;
            }
        }

        tokio::select! {
            cmd = commands.recv(), if commands_open => match cmd {
                Some(Command::Request { token, head, body, raw, reply }) => {
                    conn.begin_request(token, head, body, raw, reply);
                }
                Some(Command::Abort { token }) => conn.abort(token),
                Some(Command::Shutdown { done }) => conn.start_drain(done),
                Some(Command::Kill) => {
                    conn.fail_all(ApiError::transport("session destroyed"));
                    break;
                }
                None => commands_open = false,
            },
            result = tls.read_buf(&mut read_buf) => match result {
                Ok(0) => {
                    conn.fail_all(ApiError::transport("connection closed by server"));
                    break;
                }
                Ok(_) => {
                    if reader.receive(&mut read_buf, &mut conn).is_err() {
                        conn.fail_all(ApiError::transport("frame parse failed"));
                        break;
                    }
                }
                Err(e) => {
                    conn.fail_all(ApiError::transport(format!("connection error: {}", e)));
                    break;
                }
            },
        }

        if flush_writer(&mut tls, &mut conn.writer).await.is_err() {
            conn.fail_all(ApiError::transport("connection write failed"));
            break;
        }

        // Apply the peer's max frame size to subsequent parsing.
        reader.set_max_frame_size(conn.max_frame_size);
    }
    let _ = tls.shutdown().await;
}

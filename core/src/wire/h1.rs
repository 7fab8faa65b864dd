/*
 * h1.rs
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

//! HTTP/1.1 response push parser: status line, headers, body
//! (Content-Length, chunked, or read-until-close), trailers.
//!
//! The parser decides the body framing itself from the headers it has seen
//! (Content-Length / Transfer-Encoding / 204 / 304), so callers only feed
//! bytes and receive events. Body chunks are delivered strictly in arrival
//! order; for read-until-close responses the caller signals end-of-stream
//! via `eof()`.

use bytes::{Buf, BytesMut};
use std::io;

/// Callback for HTTP/1.1 response events. Data passed to `body_chunk` is
/// only valid for the duration of the call.
pub trait H1Events {
    /// Status line received.
    fn status(&mut self, code: u16, reason: Option<&str>);
    /// One response header (may repeat for multi-value headers).
    fn header(&mut self, name: &str, value: &str);
    /// Body begins. Not emitted for bodyless responses (204, 304, length 0).
    fn start_body(&mut self);
    /// One chunk of body data, in arrival order.
    fn body_chunk(&mut self, data: &[u8]);
    /// Body complete. Trailers, if any, follow as `trailer` calls.
    fn end_body(&mut self);
    /// Chunked-encoding trailer header.
    fn trailer(&mut self, name: &str, value: &str);
    /// Response fully complete.
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum H1State {
    StatusLine,
    Headers,
    FixedBody,
    UntilClose,
    ChunkHead,
    ChunkBody,
    ChunkBodyEnd,
    Trailers,
    Done,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; call
/// `eof()` when the peer closes the connection. `is_done()` reports whether
/// the response completed.
pub struct H1Parser {
    state: H1State,
    status_code: u16,
    content_length: Option<u64>,
    chunked: bool,
    body_remaining: u64,
    chunk_remaining: u64,
}

impl H1Parser {
    pub fn new() -> Self {
        Self {
            state: H1State::StatusLine,
            status_code: 0,
            content_length: None,
            chunked: false,
            body_remaining: 0,
            chunk_remaining: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == H1State::Done
    }

    /// True once the full header block (status line + headers) is parsed.
    pub fn headers_done(&self) -> bool {
        !matches!(self.state, H1State::StatusLine | H1State::Headers)
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Consume and parse as much as possible from `buf`; partial tokens stay
    /// in the buffer for the next call.
    pub fn receive<H: H1Events>(&mut self, buf: &mut BytesMut, events: &mut H) -> io::Result<()> {
        loop {
            match self.state {
                H1State::StatusLine => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid status line UTF-8")
                    })?;
                    // "HTTP/1.1 200 OK" or "HTTP/1.1 200"
                    let mut parts = line_str.splitn(3, ' ');
                    let _version = parts.next();
                    self.status_code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .unwrap_or(0);
                    events.status(self.status_code, parts.next());
                    self.state = H1State::Headers;
                }
                H1State::Headers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.enter_body(events);
                        continue;
                    }
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid header UTF-8")
                    })?;
                    if let Some(colon) = line_str.find(':') {
                        let name = line_str[..colon].trim();
                        let value = line_str[colon + 1..].trim();
                        if name.eq_ignore_ascii_case("content-length") {
                            self.content_length = value.parse::<u64>().ok();
                        } else if name.eq_ignore_ascii_case("transfer-encoding")
                            && value.to_ascii_lowercase().contains("chunked")
                        {
                            self.chunked = true;
                        }
                        events.header(name, value);
                    }
                }
                H1State::FixedBody => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let take = (self.body_remaining as usize).min(buf.len());
                    let chunk = buf.split_to(take);
                    events.body_chunk(&chunk);
                    self.body_remaining -= take as u64;
                    if self.body_remaining == 0 {
                        events.end_body();
                        events.complete();
                        self.state = H1State::Done;
                    }
                }
                H1State::UntilClose => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let chunk = buf.split_to(buf.len());
                    events.body_chunk(&chunk);
                }
                H1State::ChunkHead => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    let hex = line_str.split(';').next().unwrap_or("").trim();
                    self.chunk_remaining = u64::from_str_radix(hex, 16).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    if self.chunk_remaining == 0 {
                        self.state = H1State::Trailers;
                    } else {
                        self.state = H1State::ChunkBody;
                    }
                }
                H1State::ChunkBody => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let take = (self.chunk_remaining as usize).min(buf.len());
                    let chunk = buf.split_to(take);
                    events.body_chunk(&chunk);
                    self.chunk_remaining -= take as u64;
                    if self.chunk_remaining == 0 {
                        self.state = H1State::ChunkBodyEnd;
                    }
                }
                H1State::ChunkBodyEnd => {
                    // CRLF terminating the chunk data
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    buf.advance(2);
                    self.state = H1State::ChunkHead;
                }
                H1State::Trailers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        events.end_body();
                        events.complete();
                        self.state = H1State::Done;
                        continue;
                    }
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid trailer UTF-8")
                    })?;
                    if let Some(colon) = line_str.find(':') {
                        events.trailer(line_str[..colon].trim(), line_str[colon + 1..].trim());
                    }
                }
                H1State::Done => return Ok(()),
            }
        }
    }

    /// Peer closed the connection. For read-until-close bodies this is the
    /// normal end of the response; anywhere else it is a truncation error.
    pub fn eof<H: H1Events>(&mut self, events: &mut H) -> io::Result<()> {
        match self.state {
            H1State::UntilClose => {
                events.end_body();
                events.complete();
                self.state = H1State::Done;
                Ok(())
            }
            H1State::Done => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-response",
            )),
        }
    }

    fn enter_body<H: H1Events>(&mut self, events: &mut H) {
        let bodyless = self.status_code == 204
            || self.status_code == 304
            || (100..200).contains(&self.status_code);
        if bodyless || (!self.chunked && self.content_length == Some(0)) {
            events.complete();
            self.state = H1State::Done;
            return;
        }
        events.start_body();
        if self.chunked {
            self.state = H1State::ChunkHead;
        } else if let Some(len) = self.content_length {
            self.body_remaining = len;
            self.state = H1State::FixedBody;
        } else {
            self.state = H1State::UntilClose;
        }
    }
}

impl Default for H1Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records all events for inspection.
    #[derive(Default)]
    struct Recorder {
        status: Option<(u16, Option<String>)>,
        headers: Vec<(String, String)>,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
        started: bool,
        ended: bool,
        completed: bool,
    }

    impl H1Events for Recorder {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(|s| s.to_string())));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        fn start_body(&mut self) {
            self.started = true;
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn end_body(&mut self) {
            self.ended = true;
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.to_string(), value.to_string()));
        }
        fn complete(&mut self) {
            self.completed = true;
        }
    }

    fn feed(parser: &mut H1Parser, rec: &mut Recorder, data: &[u8]) {
        let mut buf = BytesMut::from(data);
        parser.receive(&mut buf, rec).unwrap();
    }

    #[test]
    fn content_length_response() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        feed(
            &mut p,
            &mut r,
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
        );
        assert_eq!(r.status, Some((200, Some("OK".into()))));
        assert_eq!(r.body, b"{}");
        assert!(r.started && r.ended && r.completed);
        assert!(p.is_done());
    }

    #[test]
    fn body_split_across_reads_concatenates_in_order() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"HTTP/1.1 200 OK\r\nContent-Length: 9\r\n\r\n");
        p.receive(&mut buf, &mut r).unwrap();
        for piece in [&b"abc"[..], b"def", b"ghi"] {
            buf.extend_from_slice(piece);
            p.receive(&mut buf, &mut r).unwrap();
        }
        assert_eq!(r.body, b"abcdefghi");
        assert!(p.is_done());
    }

    #[test]
    fn chunked_response_with_trailer() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        feed(
            &mut p,
            &mut r,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
              5\r\nhello\r\n6\r\n world\r\n0\r\nX-Checksum: abc\r\n\r\n",
        );
        assert_eq!(r.body, b"hello world");
        assert_eq!(r.trailers, vec![("X-Checksum".into(), "abc".into())]);
        assert!(p.is_done());
    }

    #[test]
    fn chunked_split_at_every_boundary() {
        // Deliver one byte at a time; buffering must still reassemble.
        let raw =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n";
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        let mut buf = BytesMut::new();
        for &b in raw.iter() {
            buf.extend_from_slice(&[b]);
            p.receive(&mut buf, &mut r).unwrap();
        }
        assert_eq!(r.body, b"foobar");
        assert!(p.is_done());
    }

    #[test]
    fn no_content_response_has_no_body() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        feed(&mut p, &mut r, b"HTTP/1.1 204 No Content\r\n\r\n");
        assert!(!r.started);
        assert!(r.completed);
        assert!(p.is_done());
    }

    #[test]
    fn read_until_close_ends_on_eof() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        feed(&mut p, &mut r, b"HTTP/1.1 200 OK\r\n\r\npartial body");
        assert!(!p.is_done());
        p.eof(&mut r).unwrap();
        assert_eq!(r.body, b"partial body");
        assert!(r.completed && p.is_done());
    }

    #[test]
    fn eof_mid_fixed_body_is_an_error() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        feed(&mut p, &mut r, b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc");
        assert!(p.eof(&mut r).is_err());
    }

    #[test]
    fn status_without_reason() {
        let mut p = H1Parser::new();
        let mut r = Recorder::default();
        feed(&mut p, &mut r, b"HTTP/1.1 404\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(r.status, Some((404, None)));
        assert!(p.is_done());
    }
}

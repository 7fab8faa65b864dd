/*
 * writer.rs
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

//! HTTP/2 frame writer: serializes frames into a buffer. The connection task
//! drains the buffer to the socket after each batch of events.

use bytes::{BufMut, Bytes, BytesMut};

use super::frames::*;
use super::CONNECTION_PREFACE;

/// Accumulates serialized frames. `take()` hands the pending bytes to the
/// caller and leaves the writer reusable.
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_MAX_FRAME_SIZE + FRAME_HEADER_LENGTH),
        }
    }

    fn frame_header(&mut self, length: usize, frame_type: u8, flags: u8, stream_id: u32) {
        self.buf.put_u8((length >> 16) as u8);
        self.buf.put_u8((length >> 8) as u8);
        self.buf.put_u8(length as u8);
        self.buf.put_u8(frame_type);
        self.buf.put_u8(flags);
        self.buf.put_u32(stream_id);
    }

    /// Client connection preface followed by the given SETTINGS.
    pub fn preface(&mut self, settings: &[(u16, u32)]) {
        self.buf.extend_from_slice(CONNECTION_PREFACE);
        self.settings(settings);
    }

    pub fn settings(&mut self, settings: &[(u16, u32)]) {
        self.frame_header(settings.len() * 6, FRAME_SETTINGS, 0, 0);
        for (id, value) in settings {
            self.buf.put_u16(*id);
            self.buf.put_u32(*value);
        }
    }

    pub fn settings_ack(&mut self) {
        self.frame_header(0, FRAME_SETTINGS, FLAG_ACK, 0);
    }

    /// HEADERS frame carrying a complete HPACK block (END_HEADERS always
    /// set; this client never emits CONTINUATION).
    pub fn headers(&mut self, stream_id: u32, block: &[u8], end_stream: bool) {
        let mut flags = FLAG_END_HEADERS;
        if end_stream {
            flags |= FLAG_END_STREAM;
        }
        self.frame_header(block.len(), FRAME_HEADERS, flags, stream_id);
        self.buf.extend_from_slice(block);
    }

    pub fn data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) {
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        self.frame_header(data.len(), FRAME_DATA, flags, stream_id);
        self.buf.extend_from_slice(data);
    }

    pub fn ping(&mut self, opaque: u64, ack: bool) {
        let flags = if ack { FLAG_ACK } else { 0 };
        self.frame_header(8, FRAME_PING, flags, 0);
        self.buf.put_u64(opaque);
    }

    pub fn rst_stream(&mut self, stream_id: u32, error_code: u32) {
        self.frame_header(4, FRAME_RST_STREAM, 0, stream_id);
        self.buf.put_u32(error_code);
    }

    pub fn goaway(&mut self, last_stream_id: u32, error_code: u32) {
        self.frame_header(8, FRAME_GOAWAY, 0, 0);
        self.buf.put_u32(last_stream_id & 0x7fff_ffff);
        self.buf.put_u32(error_code);
    }

    pub fn window_update(&mut self, stream_id: u32, increment: u32) {
        self.frame_header(4, FRAME_WINDOW_UPDATE, 0, stream_id);
        self.buf.put_u32(increment & 0x7fff_ffff);
    }

    /// Take the accumulated bytes; the writer stays usable.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preface_starts_with_magic() {
        let mut w = FrameWriter::new();
        w.preface(&[(SETTING_ENABLE_PUSH, 0)]);
        let out = w.take();
        assert!(out.starts_with(CONNECTION_PREFACE));
        // SETTINGS frame follows: length 6, type 4, flags 0, stream 0
        let rest = &out[CONNECTION_PREFACE.len()..];
        assert_eq!(&rest[..5], &[0, 0, 6, FRAME_SETTINGS, 0]);
    }

    #[test]
    fn headers_frame_sets_end_flags() {
        let mut w = FrameWriter::new();
        w.headers(1, &[0x82], true);
        let out = w.take();
        assert_eq!(out[3], FRAME_HEADERS);
        assert_eq!(out[4], FLAG_END_HEADERS | FLAG_END_STREAM);
        assert_eq!(&out[9..], &[0x82][..]);
    }

    #[test]
    fn take_leaves_writer_reusable() {
        let mut w = FrameWriter::new();
        w.ping(7, false);
        assert!(!w.is_empty());
        let first = w.take();
        assert!(w.is_empty());
        w.ping(7, true);
        let second = w.take();
        assert_eq!(first.len(), second.len());
        assert_ne!(first[4], second[4]); // ack flag differs
    }
}

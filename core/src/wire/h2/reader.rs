/*
 * reader.rs
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

//! HTTP/2 frame push parser: consumes complete frames from a buffer and
//! dispatches to a `FrameSink`. Client subset: PRIORITY frames are consumed
//! and dropped; PUSH_PROMISE is a protocol error because the client disables
//! push in its SETTINGS.

use bytes::{Buf, Bytes, BytesMut};
use std::io;

use super::frames::*;

/// Callback for parsed HTTP/2 frames. Payloads are `Bytes` (zero-copy where
/// possible).
pub trait FrameSink {
    fn on_data(&mut self, stream_id: u32, end_stream: bool, data: Bytes);
    fn on_headers(&mut self, stream_id: u32, end_stream: bool, end_headers: bool, fragment: Bytes);
    fn on_continuation(&mut self, stream_id: u32, end_headers: bool, fragment: Bytes);
    fn on_settings(&mut self, ack: bool, settings: Vec<(u16, u32)>);
    fn on_ping(&mut self, ack: bool, opaque: u64);
    fn on_goaway(&mut self, last_stream_id: u32, error_code: u32, debug: Bytes);
    fn on_window_update(&mut self, stream_id: u32, increment: u32);
    fn on_rst_stream(&mut self, stream_id: u32, error_code: u32);
    /// Connection-level protocol violation detected while parsing.
    fn on_frame_error(&mut self, error_code: u32, stream_id: u32, message: String);
}

/// Push parser for HTTP/2 frames. Feed bytes via `receive`; the sink is
/// invoked for each complete frame. Partial frames stay buffered.
pub struct FrameReader {
    max_frame_size: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Apply the peer's SETTINGS_MAX_FRAME_SIZE.
    pub fn set_max_frame_size(&mut self, size: usize) {
        if (MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&size) {
            self.max_frame_size = size;
        }
    }

    pub fn receive<S: FrameSink>(&mut self, buf: &mut BytesMut, sink: &mut S) -> io::Result<()> {
        while buf.len() >= FRAME_HEADER_LENGTH {
            let length = (buf[0] as usize) << 16 | (buf[1] as usize) << 8 | (buf[2] as usize);
            if length > self.max_frame_size {
                sink.on_frame_error(
                    ERROR_FRAME_SIZE_ERROR,
                    0,
                    format!("frame size {} exceeds max {}", length, self.max_frame_size),
                );
                return Ok(());
            }
            if buf.len() < FRAME_HEADER_LENGTH + length {
                return Ok(());
            }
            let frame_type = buf[3];
            let flags = buf[4];
            let stream_id = ((buf[5] & 0x7f) as u32) << 24
                | (buf[6] as u32) << 16
                | (buf[7] as u32) << 8
                | (buf[8] as u32);
            buf.advance(FRAME_HEADER_LENGTH);
            let payload = buf.split_to(length).freeze();
            self.dispatch(frame_type, flags, stream_id, payload, sink);
        }
        Ok(())
    }

    fn dispatch<S: FrameSink>(
        &mut self,
        frame_type: u8,
        flags: u8,
        stream_id: u32,
        payload: Bytes,
        sink: &mut S,
    ) {
        match frame_type {
            FRAME_DATA => read_data(flags, stream_id, payload, sink),
            FRAME_HEADERS => read_headers(flags, stream_id, payload, sink),
            FRAME_CONTINUATION => {
                if stream_id == 0 {
                    sink.on_frame_error(ERROR_PROTOCOL_ERROR, 0, "CONTINUATION on stream 0".into());
                    return;
                }
                sink.on_continuation(stream_id, flags & FLAG_END_HEADERS != 0, payload);
            }
            FRAME_SETTINGS => read_settings(flags, stream_id, payload, sink),
            FRAME_PING => read_ping(flags, stream_id, payload, sink),
            FRAME_GOAWAY => read_goaway(stream_id, payload, sink),
            FRAME_WINDOW_UPDATE => read_window_update(stream_id, payload, sink),
            FRAME_RST_STREAM => read_rst_stream(stream_id, payload, sink),
            FRAME_PRIORITY => {
                // Priority hints are not used by this client; validate length only.
                if payload.len() != 5 {
                    sink.on_frame_error(
                        ERROR_FRAME_SIZE_ERROR,
                        stream_id,
                        "PRIORITY frame must be 5 bytes".into(),
                    );
                }
            }
            FRAME_PUSH_PROMISE => {
                // Push is disabled in our SETTINGS; receiving one is a violation.
                sink.on_frame_error(
                    ERROR_PROTOCOL_ERROR,
                    stream_id,
                    "PUSH_PROMISE received with push disabled".into(),
                );
            }
            _ => {} // unknown frame types are ignored per RFC 7540 §4.1
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_data<S: FrameSink>(flags: u8, stream_id: u32, mut payload: Bytes, sink: &mut S) {
    if stream_id == 0 {
        sink.on_frame_error(ERROR_PROTOCOL_ERROR, 0, "DATA on stream 0".into());
        return;
    }
    let end_stream = flags & FLAG_END_STREAM != 0;
    let data = if flags & FLAG_PADDED != 0 {
        if payload.is_empty() {
            sink.on_frame_error(ERROR_PROTOCOL_ERROR, stream_id, "DATA padding missing".into());
            return;
        }
        let pad = payload.get_u8() as usize;
        if payload.len() < pad {
            sink.on_frame_error(
                ERROR_PROTOCOL_ERROR,
                stream_id,
                "DATA padding exceeds payload".into(),
            );
            return;
        }
        payload.split_to(payload.len() - pad)
    } else {
        payload
    };
    sink.on_data(stream_id, end_stream, data);
}

fn read_headers<S: FrameSink>(flags: u8, stream_id: u32, mut payload: Bytes, sink: &mut S) {
    if stream_id == 0 {
        sink.on_frame_error(ERROR_PROTOCOL_ERROR, 0, "HEADERS on stream 0".into());
        return;
    }
    let end_stream = flags & FLAG_END_STREAM != 0;
    let end_headers = flags & FLAG_END_HEADERS != 0;
    let pad = if flags & FLAG_PADDED != 0 {
        if payload.is_empty() {
            sink.on_frame_error(ERROR_PROTOCOL_ERROR, stream_id, "HEADERS padding missing".into());
            return;
        }
        payload.get_u8() as usize
    } else {
        0
    };
    if flags & FLAG_PRIORITY != 0 {
        // Exclusive bit, dependency, weight: not used by this client.
        if payload.len() < 5 {
            sink.on_frame_error(
                ERROR_FRAME_SIZE_ERROR,
                stream_id,
                "HEADERS with PRIORITY too short".into(),
            );
            return;
        }
        payload.advance(5);
    }
    if payload.len() < pad {
        sink.on_frame_error(
            ERROR_PROTOCOL_ERROR,
            stream_id,
            "HEADERS padding exceeds payload".into(),
        );
        return;
    }
    let fragment = payload.split_to(payload.len() - pad);
    sink.on_headers(stream_id, end_stream, end_headers, fragment);
}

fn read_settings<S: FrameSink>(flags: u8, stream_id: u32, payload: Bytes, sink: &mut S) {
    if stream_id != 0 {
        sink.on_frame_error(ERROR_PROTOCOL_ERROR, stream_id, "SETTINGS on a stream".into());
        return;
    }
    let ack = flags & FLAG_ACK != 0;
    if ack && !payload.is_empty() {
        sink.on_frame_error(ERROR_FRAME_SIZE_ERROR, 0, "SETTINGS ACK with payload".into());
        return;
    }
    if payload.len() % 6 != 0 {
        sink.on_frame_error(
            ERROR_FRAME_SIZE_ERROR,
            0,
            "SETTINGS payload not a multiple of 6".into(),
        );
        return;
    }
    let mut settings = Vec::with_capacity(payload.len() / 6);
    let mut p = payload;
    while p.len() >= 6 {
        let id = p.get_u16();
        let value = p.get_u32();
        settings.push((id, value));
    }
    sink.on_settings(ack, settings);
}

fn read_ping<S: FrameSink>(flags: u8, stream_id: u32, payload: Bytes, sink: &mut S) {
    if stream_id != 0 {
        sink.on_frame_error(ERROR_PROTOCOL_ERROR, stream_id, "PING on a stream".into());
        return;
    }
    if payload.len() != 8 {
        sink.on_frame_error(ERROR_FRAME_SIZE_ERROR, 0, "PING must be 8 bytes".into());
        return;
    }
    let mut p = payload;
    sink.on_ping(flags & FLAG_ACK != 0, p.get_u64());
}

fn read_goaway<S: FrameSink>(stream_id: u32, payload: Bytes, sink: &mut S) {
    if stream_id != 0 {
        sink.on_frame_error(ERROR_PROTOCOL_ERROR, stream_id, "GOAWAY on a stream".into());
        return;
    }
    if payload.len() < 8 {
        sink.on_frame_error(ERROR_FRAME_SIZE_ERROR, 0, "GOAWAY shorter than 8 bytes".into());
        return;
    }
    let mut p = payload;
    let last_stream_id = p.get_u32() & 0x7fff_ffff;
    let error_code = p.get_u32();
    sink.on_goaway(last_stream_id, error_code, p);
}

fn read_window_update<S: FrameSink>(stream_id: u32, payload: Bytes, sink: &mut S) {
    if payload.len() != 4 {
        sink.on_frame_error(
            ERROR_FRAME_SIZE_ERROR,
            stream_id,
            "WINDOW_UPDATE must be 4 bytes".into(),
        );
        return;
    }
    let mut p = payload;
    let increment = p.get_u32() & 0x7fff_ffff;
    if increment == 0 {
        sink.on_frame_error(
            ERROR_PROTOCOL_ERROR,
            stream_id,
            "WINDOW_UPDATE increment of zero".into(),
        );
        return;
    }
    sink.on_window_update(stream_id, increment);
}

fn read_rst_stream<S: FrameSink>(stream_id: u32, payload: Bytes, sink: &mut S) {
    if stream_id == 0 {
        sink.on_frame_error(ERROR_PROTOCOL_ERROR, 0, "RST_STREAM on stream 0".into());
        return;
    }
    if payload.len() != 4 {
        sink.on_frame_error(
            ERROR_FRAME_SIZE_ERROR,
            stream_id,
            "RST_STREAM must be 4 bytes".into(),
        );
        return;
    }
    let mut p = payload;
    sink.on_rst_stream(stream_id, p.get_u32());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        data: Vec<(u32, bool, Vec<u8>)>,
        headers: Vec<(u32, bool, bool, Vec<u8>)>,
        settings: Vec<(bool, Vec<(u16, u32)>)>,
        pings: Vec<(bool, u64)>,
        window_updates: Vec<(u32, u32)>,
        resets: Vec<(u32, u32)>,
        goaways: Vec<(u32, u32)>,
        errors: Vec<String>,
    }

    impl FrameSink for Collect {
        fn on_data(&mut self, stream_id: u32, end_stream: bool, data: Bytes) {
            self.data.push((stream_id, end_stream, data.to_vec()));
        }
        fn on_headers(&mut self, id: u32, es: bool, eh: bool, fragment: Bytes) {
            self.headers.push((id, es, eh, fragment.to_vec()));
        }
        fn on_continuation(&mut self, id: u32, eh: bool, fragment: Bytes) {
            self.headers.push((id, false, eh, fragment.to_vec()));
        }
        fn on_settings(&mut self, ack: bool, settings: Vec<(u16, u32)>) {
            self.settings.push((ack, settings));
        }
        fn on_ping(&mut self, ack: bool, opaque: u64) {
            self.pings.push((ack, opaque));
        }
        fn on_goaway(&mut self, last: u32, code: u32, _debug: Bytes) {
            self.goaways.push((last, code));
        }
        fn on_window_update(&mut self, id: u32, incr: u32) {
            self.window_updates.push((id, incr));
        }
        fn on_rst_stream(&mut self, id: u32, code: u32) {
            self.resets.push((id, code));
        }
        fn on_frame_error(&mut self, _code: u32, _id: u32, message: String) {
            self.errors.push(message);
        }
    }

    fn frame(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push((payload.len() >> 16) as u8);
        out.push((payload.len() >> 8) as u8);
        out.push(payload.len() as u8);
        out.push(frame_type);
        out.push(flags);
        out.extend_from_slice(&stream_id.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn data_frame_with_end_stream() {
        let mut buf = BytesMut::from(&frame(FRAME_DATA, FLAG_END_STREAM, 1, b"hello")[..]);
        let mut sink = Collect::default();
        FrameReader::new().receive(&mut buf, &mut sink).unwrap();
        assert_eq!(sink.data, vec![(1, true, b"hello".to_vec())]);
    }

    #[test]
    fn padded_data_frame_strips_padding() {
        let mut payload = vec![3u8]; // pad length
        payload.extend_from_slice(b"abc");
        payload.extend_from_slice(&[0, 0, 0]);
        let mut buf = BytesMut::from(&frame(FRAME_DATA, FLAG_PADDED, 3, &payload)[..]);
        let mut sink = Collect::default();
        FrameReader::new().receive(&mut buf, &mut sink).unwrap();
        assert_eq!(sink.data, vec![(3, false, b"abc".to_vec())]);
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let full = frame(FRAME_DATA, 0, 1, b"abcdef");
        let mut buf = BytesMut::from(&full[..7]);
        let mut sink = Collect::default();
        let mut reader = FrameReader::new();
        reader.receive(&mut buf, &mut sink).unwrap();
        assert!(sink.data.is_empty());
        buf.extend_from_slice(&full[7..]);
        reader.receive(&mut buf, &mut sink).unwrap();
        assert_eq!(sink.data.len(), 1);
    }

    #[test]
    fn settings_parsed_as_pairs() {
        let payload = [
            0x00, 0x04, 0x00, 0x01, 0x00, 0x00, // INITIAL_WINDOW_SIZE = 65536
            0x00, 0x03, 0x00, 0x00, 0x00, 0x64, // MAX_CONCURRENT_STREAMS = 100
        ];
        let mut buf = BytesMut::from(&frame(FRAME_SETTINGS, 0, 0, &payload)[..]);
        let mut sink = Collect::default();
        FrameReader::new().receive(&mut buf, &mut sink).unwrap();
        assert_eq!(
            sink.settings,
            vec![(false, vec![(SETTING_INITIAL_WINDOW_SIZE, 65536), (SETTING_MAX_CONCURRENT_STREAMS, 100)])]
        );
    }

    #[test]
    fn push_promise_is_a_protocol_error() {
        let mut buf = BytesMut::from(&frame(FRAME_PUSH_PROMISE, 0, 1, &[0, 0, 0, 2])[..]);
        let mut sink = Collect::default();
        FrameReader::new().receive(&mut buf, &mut sink).unwrap();
        assert_eq!(sink.errors.len(), 1);
    }

    #[test]
    fn window_update_zero_increment_rejected() {
        let mut buf = BytesMut::from(&frame(FRAME_WINDOW_UPDATE, 0, 1, &[0, 0, 0, 0])[..]);
        let mut sink = Collect::default();
        FrameReader::new().receive(&mut buf, &mut sink).unwrap();
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.window_updates.is_empty());
    }
}

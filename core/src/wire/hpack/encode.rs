/*
 * encode.rs
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

//! HPACK encoder for request header blocks. Stateless: well-known
//! (name, value) pairs use a static-table index; everything else is emitted
//! as a literal without indexing, so no dynamic-table synchronization with
//! the peer is needed.

use super::huffman;
use super::table::static_index;

/// Encode an ordered header list into one HPACK block.
pub fn encode_block(headers: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(headers.len() * 32);
    for &(name, value) in headers {
        match static_index(name, value) {
            Some(index) => write_int(&mut out, index as u64, 7, 0x80),
            None => {
                // Literal without indexing, new name (index 0).
                out.push(0x00);
                write_string(&mut out, name.as_bytes());
                write_string(&mut out, value.as_bytes());
            }
        }
    }
    out
}

/// RFC 7541 §5.2: Huffman-code the string when that is shorter.
fn write_string(out: &mut Vec<u8>, s: &[u8]) {
    let coded_len = huffman::encoded_len(s);
    if coded_len < s.len() {
        write_int(out, coded_len as u64, 7, 0x80);
        out.extend_from_slice(&huffman::encode(s));
    } else {
        write_int(out, s.len() as u64, 7, 0x00);
        out.extend_from_slice(s);
    }
}

/// RFC 7541 §5.1 prefixed integer.
fn write_int(out: &mut Vec<u8>, mut value: u64, prefix_bits: u8, opcode: u8) {
    let prefix_max = (1u64 << prefix_bits) - 1;
    if value < prefix_max {
        out.push(opcode | value as u8);
        return;
    }
    out.push(opcode | prefix_max as u8);
    value -= prefix_max;
    while value >= 0x80 {
        out.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    out.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pairs_use_static_index() {
        let block = encode_block(&[(":method", "GET")]);
        assert_eq!(block, vec![0x82]);
        let block = encode_block(&[(":status", "404")]);
        assert_eq!(block, vec![0x8d]);
    }

    #[test]
    fn unknown_pair_is_literal_without_indexing() {
        let block = encode_block(&[("x-k", "v")]);
        assert_eq!(block[0], 0x00);
        // Short strings are not Huffman-coded (no gain).
        assert_eq!(&block[1..], &[0x03, b'x', b'-', b'k', 0x01, b'v']);
    }

    #[test]
    fn long_string_is_huffman_coded() {
        let value = "www.example.com"; // 15 plain, 12 Huffman
        let block = encode_block(&[("host-alias", value)]);
        // Find the value string: last segment; flag bit 0x80 set, length 12.
        let tail = &block[block.len() - 13..];
        assert_eq!(tail[0], 0x80 | 12);
    }

    #[test]
    fn integer_prefix_spillover() {
        let mut out = Vec::new();
        write_int(&mut out, 1337, 5, 0x00); // RFC 7541 C.1.2
        assert_eq!(out, vec![0x1f, 0x9a, 0x0a]);
    }
}

/*
 * huffman.rs
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

//! Huffman codec for HPACK (RFC 7541 Appendix B). Trie-based decoding;
//! encoding walks the static code table directly.

use std::io;
use std::sync::OnceLock;

/// (code, bit length) per symbol 0..=256; index 256 is EOS.
#[rustfmt::skip]
const CODES: [(u32, u8); 257] = [
    (0x1ff8, 13), (0x7fffd8, 23), (0xfffffe2, 28), (0xfffffe3, 28),
    (0xfffffe4, 28), (0xfffffe5, 28), (0xfffffe6, 28), (0xfffffe7, 28),
    (0xfffffe8, 28), (0xffffea, 24), (0x3ffffffc, 30), (0xfffffe9, 28),
    (0xfffffea, 28), (0x3ffffffd, 30), (0xfffffeb, 28), (0xfffffec, 28),
    (0xfffffed, 28), (0xfffffee, 28), (0xfffffef, 28), (0xffffff0, 28),
    (0xffffff1, 28), (0xffffff2, 28), (0x3ffffffe, 30), (0xffffff3, 28),
    (0xffffff4, 28), (0xffffff5, 28), (0xffffff6, 28), (0xffffff7, 28),
    (0xffffff8, 28), (0xffffff9, 28), (0xffffffa, 28), (0xffffffb, 28),
    (0x14, 6), (0x3f8, 10), (0x3f9, 10), (0xffa, 12),
    (0x1ff9, 13), (0x15, 6), (0xf8, 8), (0x7fa, 11),
    (0x3fa, 10), (0x3fb, 10), (0xf9, 8), (0x7fb, 11),
    (0xfa, 8), (0x16, 6), (0x17, 6), (0x18, 6),
    (0x0, 5), (0x1, 5), (0x2, 5), (0x19, 6),
    (0x1a, 6), (0x1b, 6), (0x1c, 6), (0x1d, 6),
    (0x1e, 6), (0x1f, 6), (0x5c, 7), (0xfb, 8),
    (0x7ffc, 15), (0x20, 6), (0xffb, 12), (0x3fc, 10),
    (0x1ffa, 13), (0x21, 6), (0x5d, 7), (0x5e, 7),
    (0x5f, 7), (0x60, 7), (0x61, 7), (0x62, 7),
    (0x63, 7), (0x64, 7), (0x65, 7), (0x66, 7),
    (0x67, 7), (0x68, 7), (0x69, 7), (0x6a, 7),
    (0x6b, 7), (0x6c, 7), (0x6d, 7), (0x6e, 7),
    (0x6f, 7), (0x70, 7), (0x71, 7), (0x72, 7),
    (0xfc, 8), (0x73, 7), (0xfd, 8), (0x1ffb, 13),
    (0x7fff0, 19), (0x1ffc, 13), (0x3ffc, 14), (0x22, 6),
    (0x7ffd, 15), (0x3, 5), (0x23, 6), (0x4, 5),
    (0x24, 6), (0x5, 5), (0x25, 6), (0x26, 6),
    (0x27, 6), (0x6, 5), (0x74, 7), (0x75, 7),
    (0x28, 6), (0x29, 6), (0x2a, 6), (0x7, 5),
    (0x2b, 6), (0x76, 7), (0x2c, 6), (0x8, 5),
    (0x9, 5), (0x2d, 6), (0x77, 7), (0x78, 7),
    (0x79, 7), (0x7a, 7), (0x7b, 7), (0x7ffe, 15),
    (0x7fc, 11), (0x3ffd, 14), (0x1ffd, 13), (0xffffffc, 28),
    (0xfffe6, 20), (0x3fffd2, 22), (0xfffe7, 20), (0xfffe8, 20),
    (0x3fffd3, 22), (0x3fffd4, 22), (0x3fffd5, 22), (0x7fffd9, 23),
    (0x3fffd6, 22), (0x7fffda, 23), (0x7fffdb, 23), (0x7fffdc, 23),
    (0x7fffdd, 23), (0x7fffde, 23), (0xffffeb, 24), (0x7fffdf, 23),
    (0xffffec, 24), (0xffffed, 24), (0x3fffd7, 22), (0x7fffe0, 23),
    (0xffffee, 24), (0x7fffe1, 23), (0x7fffe2, 23), (0x7fffe3, 23),
    (0x7fffe4, 23), (0x1fffdc, 21), (0x3fffd8, 22), (0x7fffe5, 23),
    (0x3fffd9, 22), (0x7fffe6, 23), (0x7fffe7, 23), (0xffffef, 24),
    (0x3fffda, 22), (0x1fffdd, 21), (0xfffe9, 20), (0x3fffdb, 22),
    (0x3fffdc, 22), (0x7fffe8, 23), (0x7fffe9, 23), (0x1fffde, 21),
    (0x7fffea, 23), (0x3fffdd, 22), (0x3fffde, 22), (0xfffff0, 24),
    (0x1fffdf, 21), (0x3fffdf, 22), (0x7fffeb, 23), (0x7fffec, 23),
    (0x1fffe0, 21), (0x1fffe1, 21), (0x3fffe0, 22), (0x1fffe2, 21),
    (0x7fffed, 23), (0x3fffe1, 22), (0x7fffee, 23), (0x7fffef, 23),
    (0xfffea, 20), (0x3fffe2, 22), (0x3fffe3, 22), (0x3fffe4, 22),
    (0x7ffff0, 23), (0x3fffe5, 22), (0x3fffe6, 22), (0x7ffff1, 23),
    (0x3ffffe0, 26), (0x3ffffe1, 26), (0xfffeb, 20), (0x7fff1, 19),
    (0x3fffe7, 22), (0x7ffff2, 23), (0x3fffe8, 22), (0x1ffffec, 25),
    (0x3ffffe2, 26), (0x3ffffe3, 26), (0x3ffffe4, 26), (0x7ffffde, 27),
    (0x7ffffdf, 27), (0x3ffffe5, 26), (0xfffff1, 24), (0x1ffffed, 25),
    (0x7fff2, 19), (0x1fffe3, 21), (0x3ffffe6, 26), (0x7ffffe0, 27),
    (0x7ffffe1, 27), (0x3ffffe7, 26), (0x7ffffe2, 27), (0xfffff2, 24),
    (0x1fffe4, 21), (0x1fffe5, 21), (0x3ffffe8, 26), (0x3ffffe9, 26),
    (0xffffffd, 28), (0x7ffffe3, 27), (0x7ffffe4, 27), (0x7ffffe5, 27),
    (0xfffec, 20), (0xfffff3, 24), (0xfffed, 20), (0x1fffe6, 21),
    (0x3fffe9, 22), (0x1fffe7, 21), (0x1fffe8, 21), (0x7ffff3, 23),
    (0x3fffea, 22), (0x3fffeb, 22), (0x1ffffee, 25), (0x1ffffef, 25),
    (0xfffff4, 24), (0xfffff5, 24), (0x3ffffea, 26), (0x7ffff4, 23),
    (0x3ffffeb, 26), (0x7ffffe6, 27), (0x3ffffec, 26), (0x3ffffed, 26),
    (0x7ffffe7, 27), (0x7ffffe8, 27), (0x7ffffe9, 27), (0x7ffffea, 27),
    (0x7ffffeb, 27), (0xffffffe, 28), (0x7ffffec, 27), (0x7ffffed, 27),
    (0x7ffffee, 27), (0x7ffffef, 27), (0x7fffff0, 27), (0x3ffffee, 26),
    (0x3fffffff, 30),
];

const EOS: i16 = 256;

struct Node {
    symbol: i16,
    branch: [Option<Box<Node>>; 2],
}

impl Node {
    fn leaf_free() -> Self {
        Self {
            symbol: -1,
            branch: [None, None],
        }
    }
}

fn build_trie() -> Box<Node> {
    let mut root = Box::new(Node::leaf_free());
    for (symbol, &(code, bits)) in CODES.iter().enumerate() {
        let mut node = &mut *root;
        for i in (0..bits).rev() {
            let bit = ((code >> i) & 1) as usize;
            if node.branch[bit].is_none() {
                node.branch[bit] = Some(Box::new(Node::leaf_free()));
            }
            node = node.branch[bit].as_deref_mut().unwrap();
        }
        node.symbol = symbol as i16;
    }
    root
}

static TRIE: OnceLock<Box<Node>> = OnceLock::new();

fn trie() -> &'static Node {
    TRIE.get_or_init(build_trie)
}

/// Decode a Huffman-coded HPACK string. Padding must be all 1-bits and at
/// most 7 bits long; an embedded EOS symbol is an error.
pub fn decode(encoded: &[u8]) -> io::Result<Vec<u8>> {
    let root = trie();
    let mut out = Vec::with_capacity(encoded.len() * 2);
    let mut node = root;
    let mut bits_since_symbol = 0u32;

    for &byte in encoded {
        for shift in (0..8).rev() {
            let bit = ((byte >> shift) & 1) as usize;
            node = match node.branch[bit].as_deref() {
                Some(next) => next,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Huffman: invalid bit sequence",
                    ))
                }
            };
            bits_since_symbol += 1;
            if node.symbol >= 0 {
                if node.symbol == EOS {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Huffman: EOS inside string",
                    ));
                }
                out.push(node.symbol as u8);
                node = root;
                bits_since_symbol = 0;
            }
        }
    }

    // Trailing bits must be a prefix of EOS: all ones, fewer than 8.
    if bits_since_symbol > 7 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Huffman: padding longer than 7 bits",
        ));
    }
    if bits_since_symbol > 0 {
        let last = encoded[encoded.len() - 1];
        let mask = (1u8 << bits_since_symbol) - 1;
        if last & mask != mask {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Huffman: padding is not all 1-bits",
            ));
        }
    }
    Ok(out)
}

/// Huffman-encode plaintext, padding the final byte with 1-bits.
pub fn encode(plain: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(plain.len());
    let mut acc: u64 = 0;
    let mut acc_bits: u32 = 0;
    for &b in plain {
        let (code, bits) = CODES[b as usize];
        acc = (acc << bits) | code as u64;
        acc_bits += bits as u32;
        while acc_bits >= 8 {
            acc_bits -= 8;
            out.push((acc >> acc_bits) as u8);
        }
    }
    if acc_bits > 0 {
        let pad = 8 - acc_bits;
        out.push(((acc << pad) as u8) | ((1u8 << pad) - 1));
    }
    out
}

/// Encoded length in bytes for the given plaintext.
pub fn encoded_len(plain: &[u8]) -> usize {
    let bits: usize = plain.iter().map(|&b| CODES[b as usize].1 as usize).sum();
    (bits + 7) / 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_abc() {
        let encoded = encode(b"abc");
        assert_eq!(encoded, vec![0x1c, 0x64]);
        assert_eq!(decode(&encoded).unwrap(), b"abc");
    }

    #[test]
    fn known_vector_www_example_com() {
        // RFC 7541 C.4.1
        let encoded = encode(b"www.example.com");
        let expected: &[u8] = &[
            0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff,
        ];
        assert_eq!(encoded, expected);
        assert_eq!(decode(&encoded).unwrap(), b"www.example.com");
    }

    #[test]
    fn empty_both_ways() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn bad_padding_rejected() {
        // 5-bit '0' symbol (00000) followed by zero-bit padding: the three
        // trailing bits are 0s, not the required 1s.
        assert!(decode(&[0x00]).is_err());
    }

    #[test]
    fn roundtrip_all_byte_values() {
        let plain: Vec<u8> = (0u8..=255).collect();
        let encoded = encode(&plain);
        assert_eq!(decode(&encoded).unwrap(), plain);
        assert_eq!(encoded_len(&plain), encoded.len());
    }
}

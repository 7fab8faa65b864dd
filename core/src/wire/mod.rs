/*
 * mod.rs
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

//! Wire-level protocol codecs, shared by both executors.
//!
//! - HTTP/1.1: push-parsed responses (`h1::H1Parser` + `h1::H1Events`).
//! - HTTP/2: frame parser/writer + HPACK, no external h2 crate.
//!
//! All parsers are sans-io: callers feed bytes from whatever socket they own
//! (std or tokio) and receive callbacks for complete protocol events.

pub mod h1;
pub mod h2;
pub mod hpack;

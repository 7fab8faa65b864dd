/*
 * lib.rs
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

//! Magazzino core: client SDK for the Magazzino backend service.
//!
//! Layers, bottom up:
//! - `wire`: HTTP/1.1 response push parser, HTTP/2 frame codec, HPACK (no
//!   external h2/httparse crates).
//! - `transport`: request descriptor, at-most-once completion channel, the
//!   two executors (blocking and stream), HTTP/2 session pool, TLS/proxy
//!   plumbing, and the `ApiRequest` facade.
//! - `service`: typed object/file/user/group operations over the facade.
//!
//! The facade picks an executor per request: inside a tokio runtime the
//! stream executor is used (HTTP/1.1 per-request connections, opt-in
//! multiplexed HTTP/2 sessions); outside a runtime the blocking executor
//! performs the same exchange over std sockets.

pub mod config;
pub mod error;
pub mod service;
pub mod transport;
pub mod wire;

pub use error::{ApiError, ConfigError, SdkError};
pub use service::Service;
pub use transport::facade::ApiRequest;

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

//! Request transport: descriptor, completion channel, executors, facade.
//!
//! The executor seam is a strategy choice made once per request by a
//! capability probe: inside a tokio runtime the stream executor runs the
//! exchange on the event loop; outside one, the blocking executor runs it on
//! a dedicated thread over std sockets. Both report through the same
//! completion channel and produce the same outcome shapes.

pub mod blocking;
pub mod completion;
pub mod descriptor;
pub mod facade;
pub mod proxy;
pub mod response;
pub mod stream;
pub mod tls;

use std::sync::Arc;

use completion::Completion;
use descriptor::RequestDescriptor;

/// Hand the descriptor to the executor for the current environment. The
/// completion receives exactly one outcome either way.
pub(crate) fn dispatch(descriptor: RequestDescriptor, completion: Arc<Completion>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(stream::execute(descriptor, completion));
        }
        Err(_) => {
            std::thread::spawn(move || blocking::execute(descriptor, completion));
        }
    }
}

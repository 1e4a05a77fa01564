/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Rover, a command-line web client.
 *
 * Rover is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Rover is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Rover.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Connection contracts shared by every transport.
//!
//! A `Connection` is push-style: the transport calls the data-received delegate as bytes arrive
//! and the broken delegate once when the connection ends. A `ClientTransport` opens connections
//! and wires those delegates. The TLS decorator is itself a `ClientTransport` whose connections
//! have exactly the same shape, so callers cannot tell a TLS connection from a plaintext one.

use std::sync::Arc;

use crate::error::TransportError;

pub mod tcp;
pub mod tls;

/// Called with each run of bytes received from the peer, in order.
pub type DataReceivedDelegate = Box<dyn FnMut(&[u8]) + Send>;

/// Called at most once when the connection is broken. The flag is true for a graceful close.
pub type BrokenDelegate = Box<dyn FnOnce(bool) + Send>;

/// An open byte-stream connection.
///
/// Implementations must not block in `send` and must not invoke either delegate synchronously
/// from inside `send`, `disconnect` or the query methods.
pub trait Connection: Send + Sync {
    /// Queue bytes for transmission to the peer.
    fn send(&self, data: &[u8]);

    /// Break the connection. `clean` asks for an orderly shutdown (pending data flushed first);
    /// otherwise the connection is aborted.
    fn disconnect(&self, clean: bool);

    /// Address of the peer, without port.
    fn peer_address(&self) -> String;

    /// Identifier of the peer (address and port).
    fn peer_id(&self) -> String;
}

/// Opens client connections.
pub trait ClientTransport: Send + Sync {
    /// Connect to `host:port`. On success the delegates are owned by the returned connection.
    fn connect(
        &self,
        host: &str,
        port: u16,
        on_data: DataReceivedDelegate,
        on_broken: BrokenDelegate,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}

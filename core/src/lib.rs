/*
 * lib.rs
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

//! Rover core: callback-driven connections, a TLS decorator for any connection factory, and a
//! small HTTP/1.1 client that runs over either.
//!
//! Layering, bottom up:
//! - `net`: the `Connection` / `ClientTransport` contracts and the plaintext TCP transport.
//! - `net::tls`: `TlsDecorator` wraps a `ClientTransport` so every connection it hands out runs
//!   through rustls. One worker thread per connection drives the engine.
//! - `protocol::http`: request builder, push parser, `HttpClient::fetch`.

pub mod cancel;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod uri;

pub use cancel::Cancellation;
pub use config::TlsConfig;
pub use error::{ConfigError, ParseError, TlsError, TransportError, UrlError};
pub use net::tcp::TcpTransport;
pub use net::tls::TlsDecorator;
pub use net::{BrokenDelegate, ClientTransport, Connection, DataReceivedDelegate};

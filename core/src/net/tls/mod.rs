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

//! TLS over any `ClientTransport`.
//!
//! - `engine`: rustls client session driven through read/write hooks over in-memory buffers.
//! - `connection`: the per-connection worker that moves bytes between the raw connection, the
//!   engine and the caller.
//! - `decorator`: the `ClientTransport` that puts the two together.

mod connection;
mod decorator;
mod engine;

pub use connection::{Phase, TlsConnection};
pub use decorator::TlsDecorator;
pub use engine::{ReadOutcome, TlsEngine, WriteOutcome};

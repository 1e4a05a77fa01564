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

//! Minimal HTTP/1.1 client.
//!
//! - `request`: `RequestBuilder` serialized with `Host` and `Connection: close`.
//! - `parser`: push parser for the response (Content-Length, chunked, read-until-close).
//! - `response`: collected `Response` and its body framing rules.
//! - `client`: `HttpClient::fetch`, one request per connection over any `ClientTransport`.

mod request;
mod response;

pub mod client;
pub mod parser;

pub use client::{HttpClient, Transaction, TransactionState, DEFAULT_RESPONSE_TIMEOUT};
pub use parser::{BodyMode, ResponseHandler, ResponseParser};
pub use request::{Method, RequestBuilder};
pub use response::{Response, ResponseCollector};

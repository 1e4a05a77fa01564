/*
 * response.rs
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

//! Collected HTTP response.

use crate::protocol::http::parser::{BodyMode, ResponseHandler};

/// Status, headers in arrival order, and the full body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// First value of the named header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Informational head (100 Continue, 103 Early Hints, ...) followed by the final response.
    /// 101 Switching Protocols is final.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.code) && self.code != 101
    }

    /// Body framing implied by the head. `head_request` is true when the request method was HEAD.
    pub fn body_mode(&self, head_request: bool) -> BodyMode {
        if head_request || (100..200).contains(&self.code) || self.code == 204 || self.code == 304 {
            return BodyMode::Empty;
        }
        let chunked = self
            .header("Transfer-Encoding")
            .map(|te| te.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        if chunked {
            return BodyMode::Chunked;
        }
        match self.header("Content-Length").map(|v| v.parse::<u64>()) {
            Some(Ok(n)) => BodyMode::Length(n),
            _ => BodyMode::UntilClose,
        }
    }
}

/// Builds a `Response` from parser events.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    response: Response,
    complete: bool,
}

impl ResponseCollector {
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

impl ResponseHandler for ResponseCollector {
    fn status(&mut self, code: u16, reason: &str) {
        self.response.code = code;
        self.response.reason = reason.to_string();
    }

    fn header(&mut self, name: &str, value: &str) {
        self.response.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {}

    fn body_chunk(&mut self, data: &[u8]) {
        self.response.body.extend_from_slice(data);
    }

    fn end_body(&mut self) {}

    fn trailer(&mut self, name: &str, value: &str) {
        self.header(name, value);
    }

    fn complete(&mut self) {
        self.complete = true;
    }
}

/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or
//! read-until-close).

use bytes::{Buf, BytesMut};

use crate::error::ParseError;

/// Callback for response events, in order: status, headers, start_body, body_chunk (×n),
/// end_body, trailers, complete.
pub trait ResponseHandler {
    fn status(&mut self, code: u16, reason: &str);
    fn header(&mut self, name: &str, value: &str);
    fn start_body(&mut self);
    fn body_chunk(&mut self, data: &[u8]);
    fn end_body(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

/// How the end of the body is found, decided from the response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body (HEAD, 1xx, 204, 304, or Content-Length: 0).
    Empty,
    Length(u64),
    Chunked,
    /// Body runs until the connection closes.
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Head parsed; `set_body_mode` must be called before more data is consumed.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
    Complete,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; consumed bytes are removed
/// from the front of the buffer and partial lines stay in it.
pub struct ResponseParser {
    state: ParseState,
    mode: BodyMode,
    /// Body bytes still expected (Content-Length) or left in the current chunk.
    remaining: u64,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            mode: BodyMode::UntilClose,
            remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Complete
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Take one CRLF-terminated line off the front of `buf`, without the CRLF.
    fn take_line(buf: &mut BytesMut) -> Option<BytesMut> {
        let end = Self::find_crlf(buf)?;
        let mut line = buf.split_to(end + 2);
        line.truncate(end);
        Some(line)
    }

    fn split_header(line: &[u8]) -> Result<(&str, &str), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::HeaderLine)?;
        let (name, value) = line.split_once(':').ok_or(ParseError::HeaderLine)?;
        Ok((name.trim(), value.trim()))
    }

    /// Consume as much of `buf` as possible. Stops at `HeadersComplete` and `Complete`.
    pub fn receive<H: ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> Result<(), ParseError> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    let line = String::from_utf8_lossy(&line);
                    // HTTP/1.1 200 OK, or HTTP/1.1 200
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or_default();
                    let code = parts.next().and_then(|s| s.parse::<u16>().ok());
                    match code {
                        Some(code) if version.starts_with("HTTP/") => {
                            handler.status(code, parts.next().unwrap_or_default().trim());
                        }
                        _ => return Err(ParseError::StatusLine(line.into_owned())),
                    }
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let (name, value) = Self::split_header(&line)?;
                    handler.header(name, value);
                }
                ParseState::HeadersComplete | ParseState::Complete => return Ok(()),
                ParseState::Body => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    if self.mode == BodyMode::UntilClose {
                        let chunk = buf.split();
                        handler.body_chunk(&chunk);
                        return Ok(());
                    }
                    let n = self.remaining.min(buf.len() as u64) as usize;
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.finish_body(handler);
                    }
                }
                ParseState::ChunkSize => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    let line = String::from_utf8_lossy(&line);
                    let hex = line.split(';').next().unwrap_or_default().trim();
                    self.remaining = u64::from_str_radix(hex, 16)
                        .map_err(|_| ParseError::ChunkSize(line.to_string()))?;
                    self.state = if self.remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = self.remaining.min(buf.len() as u64) as usize;
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(ParseError::ChunkSize(
                            String::from_utf8_lossy(&buf[..2]).into_owned(),
                        ));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.finish_body(handler);
                    } else {
                        let (name, value) = Self::split_header(&line)?;
                        handler.trailer(name, value);
                    }
                }
            }
        }
    }

    /// Called once the head is parsed (state `HeadersComplete`).
    pub fn set_body_mode<H: ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.mode = mode;
        match mode {
            BodyMode::Empty | BodyMode::Length(0) => {
                self.state = ParseState::Complete;
                handler.complete();
            }
            BodyMode::Length(n) => {
                self.remaining = n;
                self.state = ParseState::Body;
                handler.start_body();
            }
            BodyMode::Chunked => {
                self.state = ParseState::ChunkSize;
                handler.start_body();
            }
            BodyMode::UntilClose => {
                self.state = ParseState::Body;
                handler.start_body();
            }
        }
    }

    /// The connection closed. Completes a read-until-close body; returns whether the response
    /// is complete.
    pub fn connection_closed<H: ResponseHandler>(&mut self, handler: &mut H) -> bool {
        if self.state == ParseState::Body && self.mode == BodyMode::UntilClose {
            self.finish_body(handler);
        }
        self.is_complete()
    }

    fn finish_body<H: ResponseHandler>(&mut self, handler: &mut H) {
        handler.end_body();
        handler.complete();
        self.state = ParseState::Complete;
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

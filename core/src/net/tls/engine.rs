/*
 * engine.rs
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

//! Non-blocking adapter over a rustls client session.
//!
//! rustls pulls ciphertext through `io::Read` and pushes it through `io::Write`. The two hooks
//! here satisfy that contract without ever blocking: `CiphertextSource` serves bytes already
//! buffered from the raw connection (or `WouldBlock` when there are none yet and the connection
//! is still open, or 0 once it is closed and drained), and `CiphertextSink` forwards outbound
//! records straight to the raw connection's `send`.
//!
//! Both hooks borrow state owned by the connection lock holder, so engine calls only ever happen
//! on the worker while it holds that lock.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use tracing::trace;

use crate::error::{TlsError, TransportError};
use crate::net::Connection;

/// Result of one plaintext read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes of plaintext written to the caller's buffer. 0 means the peer closed the session.
    Data(usize),
    /// No ciphertext available yet.
    WouldBlock,
    /// The engine must flush outbound records before it can decrypt more.
    WouldBlockOnWrite,
}

/// Result of one plaintext write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Bytes of the caller's plaintext accepted by the engine (may be fewer than offered).
    Consumed(usize),
    /// The engine needs more ciphertext from the peer before it accepts plaintext.
    WouldBlockOnRead,
}

/// Engine hook serving ciphertext received from the raw connection.
pub(crate) struct CiphertextSource<'a> {
    pending: &'a mut BytesMut,
    open: bool,
    can_feed_engine: &'a mut bool,
}

impl<'a> CiphertextSource<'a> {
    pub(crate) fn new(pending: &'a mut BytesMut, open: bool, can_feed_engine: &'a mut bool) -> Self {
        Self {
            pending,
            open,
            can_feed_engine,
        }
    }
}

impl Read for CiphertextSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let amount = buf.len().min(self.pending.len());
        trace!("engine wants {} ciphertext bytes, {} available", buf.len(), self.pending.len());
        if amount == 0 {
            if self.open {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            return Ok(0);
        }
        *self.can_feed_engine = true;
        buf[..amount].copy_from_slice(&self.pending[..amount]);
        self.pending.advance(amount);
        Ok(amount)
    }
}

/// Engine hook forwarding ciphertext to the raw connection.
pub(crate) struct CiphertextSink<'a> {
    upper: &'a dyn Connection,
    open: bool,
}

impl<'a> CiphertextSink<'a> {
    pub(crate) fn new(upper: &'a dyn Connection, open: bool) -> Self {
        Self { upper, open }
    }
}

impl Write for CiphertextSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        trace!("engine emits {} ciphertext bytes", buf.len());
        // after the raw connection broke there is nobody to send to; discard
        if self.open {
            self.upper.send(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Both hooks for one engine call.
pub(crate) struct Hooks<'a> {
    pub(crate) source: CiphertextSource<'a>,
    pub(crate) sink: CiphertextSink<'a>,
}

/// rustls client session driven through `Hooks`.
pub struct TlsEngine {
    session: ClientConnection,
    max_encrypt_chunk: usize,
}

impl TlsEngine {
    /// Configure a client session for `server_name` (SNI and certificate name). The ClientHello
    /// is queued now and goes out on the first `decrypt`.
    pub fn start_handshake(
        config: Arc<ClientConfig>,
        server_name: &str,
        max_encrypt_chunk: usize,
    ) -> Result<Self, TransportError> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TransportError::InvalidServerName(server_name.to_string()))?;
        let session = ClientConnection::new(config, name).map_err(TlsError::from)?;
        Ok(Self {
            session,
            max_encrypt_chunk: max_encrypt_chunk.max(1),
        })
    }

    pub fn is_handshaking(&self) -> bool {
        self.session.is_handshaking()
    }

    /// One non-blocking attempt to read plaintext into `out`.
    pub(crate) fn decrypt(&mut self, hooks: &mut Hooks<'_>, out: &mut [u8]) -> Result<ReadOutcome, TlsError> {
        let mut eof = false;
        loop {
            if !self.flush(hooks)? {
                return Ok(ReadOutcome::WouldBlockOnWrite);
            }
            match self.session.reader().read(out) {
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    trace!("peer closed without close_notify");
                    return Ok(ReadOutcome::Data(0));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if eof {
                        return Ok(ReadOutcome::Data(0));
                    }
                }
                Err(e) => return Err(e.into()),
            }
            match self.session.read_tls(&mut hooks.source) {
                Ok(0) => eof = true,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadOutcome::WouldBlock),
                Err(e) => return Err(e.into()),
            }
            self.process(hooks)?;
        }
    }

    /// One non-blocking attempt to hand plaintext to the engine.
    pub(crate) fn encrypt(&mut self, hooks: &mut Hooks<'_>, data: &[u8]) -> Result<WriteOutcome, TlsError> {
        self.flush(hooks)?;
        if self.session.is_handshaking() {
            return Ok(WriteOutcome::WouldBlockOnRead);
        }
        let chunk = &data[..data.len().min(self.max_encrypt_chunk)];
        let consumed = self.session.writer().write(chunk)?;
        self.flush(hooks)?;
        Ok(WriteOutcome::Consumed(consumed))
    }

    /// True when decrypted plaintext is waiting inside the engine. A session error found here is
    /// fatal like any other; its alert is pushed out first.
    pub(crate) fn has_pending_plaintext(&mut self, hooks: &mut Hooks<'_>) -> Result<bool, TlsError> {
        match self.session.process_new_packets() {
            Ok(state) => Ok(state.plaintext_bytes_to_read() > 0),
            Err(err) => {
                let _ = self.session.write_tls(&mut hooks.sink);
                Err(err.into())
            }
        }
    }

    /// Queue close_notify and push it out.
    pub(crate) fn close(&mut self, hooks: &mut Hooks<'_>) -> Result<(), TlsError> {
        self.session.send_close_notify();
        self.flush(hooks).map(|_| ())
    }

    fn process(&mut self, hooks: &mut Hooks<'_>) -> Result<(), TlsError> {
        if let Err(err) = self.session.process_new_packets() {
            // rustls queued an alert describing the failure; best effort to deliver it
            let _ = self.session.write_tls(&mut hooks.sink);
            return Err(err.into());
        }
        Ok(())
    }

    /// Write all queued records to the sink. Returns false if the sink would block.
    fn flush(&mut self, hooks: &mut Hooks<'_>) -> Result<bool, TlsError> {
        while self.session.wants_write() {
            match self.session.write_tls(&mut hooks.sink) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

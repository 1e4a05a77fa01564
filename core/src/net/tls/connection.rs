/*
 * connection.rs
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

//! TLS connection: bridges a raw byte-stream connection (ciphertext) and a `TlsEngine`
//! (plaintext) with one worker thread per session.
//!
//! Shared state lives behind a single mutex with a condition variable. The raw connection's
//! delegates and the caller's `send` only append to buffers and wake the worker; every engine
//! call happens on the worker while it holds the lock. Decrypted plaintext is delivered with the
//! lock released, so the data delegate may call back into the connection (e.g. to send more).
//!
//! Worker cycle:
//! 1. write: if plaintext is queued, the engine may be fed, and the raw connection is open,
//!    hand the queue to the engine. Would-block-on-read pauses writes until ciphertext is read.
//! 2. read: if ciphertext is buffered, or the last read produced data, ask the engine for
//!    plaintext and deliver it.
//! 3. if the raw connection is closed, all buffered ciphertext is consumed and the engine holds no
//!    more plaintext, report broken.
//! 4. wait for: stop, ciphertext, or (plaintext and the engine may be fed).
//!
//! A break reported by the raw connection while the worker is parked with nothing buffered is
//! passed to the caller at once; otherwise the worker reports it after delivering what remains.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::net::tls::engine::{CiphertextSink, CiphertextSource, Hooks, ReadOutcome, TlsEngine, WriteOutcome};
use crate::net::{BrokenDelegate, Connection, DataReceivedDelegate};

/// Lifecycle of a TLS connection as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Raw connection open; engine reads and writes are attempted.
    Active,
    /// Raw connection broke but buffered ciphertext is still being decrypted.
    Draining,
    /// Broken reported, or torn down.
    Closed,
}

struct State {
    send_buffer: BytesMut,
    secure_receive_buffer: BytesMut,
    open: bool,
    clean_close: bool,
    can_feed_engine: bool,
    stop_requested: bool,
    /// The TLS session hit a fatal error; nothing more goes through the engine.
    engine_failed: bool,
    /// Worker is parked in its wait: no plaintext is in flight to the caller.
    worker_waiting: bool,
    on_broken: Option<BrokenDelegate>,
}

impl State {
    /// Hooks for one engine call, borrowing the buffers owned by the lock holder.
    fn hooks<'a>(&'a mut self, upper: &'a dyn Connection) -> Hooks<'a> {
        Hooks {
            source: CiphertextSource::new(
                &mut self.secure_receive_buffer,
                self.open,
                &mut self.can_feed_engine,
            ),
            sink: CiphertextSink::new(upper, self.open),
        }
    }

    /// Take the broken delegate if the connection is closed and drained.
    fn take_broken(&mut self) -> Option<(BrokenDelegate, bool)> {
        if self.open || !self.secure_receive_buffer.is_empty() {
            return None;
        }
        self.on_broken.take().map(|delegate| (delegate, self.clean_close))
    }

    /// Plaintext can only go out while the raw connection is open and the session is healthy.
    fn can_write(&self) -> bool {
        self.open && !self.engine_failed
    }

    fn should_wake(&self) -> bool {
        self.stop_requested
            || !self.secure_receive_buffer.is_empty()
            || (!self.send_buffer.is_empty() && self.can_feed_engine && self.can_write())
    }
}

/// State shared by the connection handle, the worker and the raw connection's delegates.
pub(crate) struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    pub(crate) fn new(on_broken: BrokenDelegate) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                send_buffer: BytesMut::new(),
                secure_receive_buffer: BytesMut::new(),
                open: true,
                clean_close: false,
                can_feed_engine: true,
                stop_requested: false,
                engine_failed: false,
                worker_waiting: false,
                on_broken: Some(on_broken),
            }),
            wake: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delegate for the raw connection: ciphertext arrived.
    pub(crate) fn ciphertext_delegate(self: &Arc<Self>) -> DataReceivedDelegate {
        let shared = Arc::downgrade(self);
        Box::new(move |data| {
            if let Some(shared) = shared.upgrade() {
                shared.secure_data_received(data);
            }
        })
    }

    /// Delegate for the raw connection: it broke.
    pub(crate) fn broken_delegate(self: &Arc<Self>) -> BrokenDelegate {
        let shared: Weak<Self> = Arc::downgrade(self);
        Box::new(move |clean| {
            if let Some(shared) = shared.upgrade() {
                shared.connection_broken(clean);
            }
        })
    }

    fn secure_data_received(&self, data: &[u8]) {
        let mut state = self.lock();
        trace!(
            "received {} ciphertext bytes ({} buffered)",
            data.len(),
            data.len() + state.secure_receive_buffer.len()
        );
        state.secure_receive_buffer.extend_from_slice(data);
        self.wake.notify_all();
    }

    fn connection_broken(&self, clean: bool) {
        debug!("raw connection broken (clean: {})", clean);
        let broken = {
            let mut state = self.lock();
            state.open = false;
            state.clean_close = clean;
            self.wake.notify_all();
            if state.worker_waiting {
                state.take_broken()
            } else {
                None
            }
        };
        // otherwise the worker reports once the buffered ciphertext is drained
        if let Some((delegate, clean)) = broken {
            delegate(clean);
        }
    }
}

/// A connection whose traffic passes through TLS. Same contract as the raw connection it wraps.
pub struct TlsConnection {
    shared: Arc<Shared>,
    upper: Arc<dyn Connection>,
    worker: Option<JoinHandle<()>>,
}

impl TlsConnection {
    /// Take ownership of the raw connection and start the worker that drives `engine`.
    /// `shared` must be the state whose delegates were registered on `upper`.
    pub(crate) fn start(
        shared: Arc<Shared>,
        upper: Arc<dyn Connection>,
        engine: TlsEngine,
        on_data: DataReceivedDelegate,
        decrypt_buffer_size: usize,
    ) -> Result<Self, TransportError> {
        let worker = Worker {
            shared: shared.clone(),
            upper: upper.clone(),
            engine,
            on_data,
            scratch: vec![0u8; decrypt_buffer_size.max(1)],
        };
        let handle = thread::Builder::new()
            .name("tls-worker".to_string())
            .spawn(move || worker.run())
            .map_err(TransportError::Worker)?;
        Ok(Self {
            shared,
            upper,
            worker: Some(handle),
        })
    }

    pub fn phase(&self) -> Phase {
        let state = self.shared.lock();
        if state.stop_requested || state.on_broken.is_none() {
            Phase::Closed
        } else if state.open {
            Phase::Active
        } else {
            Phase::Draining
        }
    }
}

impl Connection for TlsConnection {
    fn send(&self, data: &[u8]) {
        let mut state = self.shared.lock();
        if !state.can_write() {
            trace!("dropping {} plaintext bytes sent after close", data.len());
            return;
        }
        trace!("queueing {} plaintext bytes", data.len());
        state.send_buffer.extend_from_slice(data);
        self.shared.wake.notify_all();
    }

    /// Always abrupt: no close_notify is attempted on this path.
    fn disconnect(&self, _clean: bool) {
        debug!("breaking TLS connection");
        self.upper.disconnect(false);
    }

    fn peer_address(&self) -> String {
        self.upper.peer_address()
    }

    fn peer_id(&self) -> String {
        self.upper.peer_id()
    }
}

impl Drop for TlsConnection {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.stop_requested = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            // dropped from inside a delegate running on the worker: it exits on its own
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!("TLS worker panicked");
            }
        }
    }
}

/// Everything the worker thread owns. The engine is only ever touched here.
struct Worker {
    shared: Arc<Shared>,
    upper: Arc<dyn Connection>,
    engine: TlsEngine,
    on_data: DataReceivedDelegate,
    scratch: Vec<u8>,
}

impl Worker {
    fn run(mut self) {
        debug!("worker: starting");
        let shared = self.shared.clone();
        let mut state = shared.lock();
        let mut try_read = true;
        while !state.stop_requested {
            let mut abort = false;

            if !state.can_write() && !state.send_buffer.is_empty() {
                trace!("discarding {} unsent plaintext bytes", state.send_buffer.len());
                state.send_buffer.clear();
            }

            if state.engine_failed {
                // the session is dead; nothing can decrypt what is still arriving
                state.secure_receive_buffer.clear();
            } else {
                if !state.send_buffer.is_empty() && state.can_feed_engine && state.open {
                    let pending = state.send_buffer.split();
                    let result = {
                        let mut hooks = state.hooks(self.upper.as_ref());
                        self.engine.encrypt(&mut hooks, &pending)
                    };
                    let consumed = match result {
                        Ok(WriteOutcome::WouldBlockOnRead) => {
                            trace!("encrypt: waiting for handshake data");
                            state.can_feed_engine = false;
                            0
                        }
                        Ok(WriteOutcome::Consumed(n)) => {
                            trace!("encrypt: {} of {} bytes", n, pending.len());
                            n
                        }
                        Err(e) => {
                            warn!("encrypt failed: {}", e);
                            abort = true;
                            0
                        }
                    };
                    // put the unconsumed tail back in front of anything queued meanwhile
                    let mut rest = BytesMut::from(&pending[consumed..]);
                    rest.unsplit(std::mem::take(&mut state.send_buffer));
                    state.send_buffer = rest;
                }

                if !abort && (!state.secure_receive_buffer.is_empty() || try_read) {
                    try_read = true;
                    let result = {
                        let mut hooks = state.hooks(self.upper.as_ref());
                        self.engine.decrypt(&mut hooks, &mut self.scratch)
                    };
                    match result {
                        Ok(ReadOutcome::WouldBlock) => trace!("decrypt: waiting for ciphertext"),
                        Ok(ReadOutcome::WouldBlockOnWrite) => trace!("decrypt: waiting to flush"),
                        Ok(ReadOutcome::Data(0)) => {
                            trace!("decrypt: end of stream");
                            try_read = false;
                        }
                        Ok(ReadOutcome::Data(n)) => {
                            trace!("decrypt: {} bytes", n);
                            drop(state);
                            (self.on_data)(&self.scratch[..n]);
                            state = shared.lock();
                        }
                        Err(e) => {
                            warn!("decrypt failed: {}", e);
                            abort = true;
                        }
                    }
                }
            }

            let mut pending = false;
            if !abort && !state.engine_failed {
                let result = {
                    let mut hooks = state.hooks(self.upper.as_ref());
                    self.engine.has_pending_plaintext(&mut hooks)
                };
                match result {
                    Ok(more) => {
                        pending = more;
                        try_read |= more;
                    }
                    Err(e) => {
                        warn!("TLS session failed: {}", e);
                        abort = true;
                    }
                }
            }

            if abort {
                state.engine_failed = true;
                try_read = false;
                state.secure_receive_buffer.clear();
                state.send_buffer.clear();
                drop(state);
                self.upper.disconnect(false);
                state = shared.lock();
            }

            if !pending {
                if let Some((delegate, clean)) = state.take_broken() {
                    drop(state);
                    delegate(clean);
                    state = shared.lock();
                }
            }

            if state.stop_requested {
                break;
            }
            if pending {
                continue;
            }
            state.worker_waiting = true;
            state = shared
                .wake
                .wait_while(state, |s| !s.should_wake())
                .unwrap_or_else(PoisonError::into_inner);
            state.worker_waiting = false;
            trace!("worker: wake up");
        }

        if state.can_write() {
            let mut hooks = state.hooks(self.upper.as_ref());
            if let Err(e) = self.engine.close(&mut hooks) {
                debug!("close_notify failed: {}", e);
            }
        }
        debug!("worker: stopping");
    }
}

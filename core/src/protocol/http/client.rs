/*
 * client.rs
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

//! HTTP client: one request per connection over any `ClientTransport`, waited on in short slices
//! so cancellation and the response timeout are noticed promptly.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::cancel::Cancellation;
use crate::net::{BrokenDelegate, ClientTransport, DataReceivedDelegate};
use crate::protocol::http::parser::{ParseState, ResponseParser};
use crate::protocol::http::request::{Method, RequestBuilder};
use crate::protocol::http::response::{Response, ResponseCollector};

/// Default time allowed for the response after the request is sent.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between checks for cancellation and timeout while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How a fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Completed,
    UnableToConnect,
    /// Connection broke (or the response was malformed) before the response completed.
    Broken,
    Timeout,
    Cancelled,
}

/// Result of a fetch. `response` holds what was received, complete only when `Completed`.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub state: TransactionState,
    pub response: Response,
}

struct Progress {
    parser: ResponseParser,
    buffer: BytesMut,
    collector: ResponseCollector,
    head_request: bool,
    outcome: Option<TransactionState>,
}

impl Progress {
    fn data_received(&mut self, data: &[u8]) {
        if self.outcome.is_some() {
            return;
        }
        self.buffer.extend_from_slice(data);
        loop {
            if let Err(e) = self.parser.receive(&mut self.buffer, &mut self.collector) {
                warn!("bad response: {}", e);
                self.outcome = Some(TransactionState::Broken);
                return;
            }
            if self.parser.state() != ParseState::HeadersComplete {
                break;
            }
            if self.collector.response().is_interim() {
                debug!("skipping interim response {}", self.collector.response().code);
                self.parser = ResponseParser::new();
                self.collector = ResponseCollector::default();
                continue;
            }
            let mode = self.collector.response().body_mode(self.head_request);
            debug!("response head received; body {:?}", mode);
            self.parser.set_body_mode(mode, &mut self.collector);
        }
        if self.collector.is_complete() {
            self.outcome = Some(TransactionState::Completed);
        }
    }

    fn connection_broken(&mut self, clean: bool) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(if self.parser.connection_closed(&mut self.collector) {
            TransactionState::Completed
        } else {
            debug!("connection broken before response completed (clean: {})", clean);
            TransactionState::Broken
        });
    }
}

struct Exchange {
    progress: Mutex<Progress>,
    done: Condvar,
}

impl Exchange {
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// HTTP/1.1 client. Connections come from the transport, so the same client runs over plain
/// TCP or a `TlsDecorator`.
pub struct HttpClient {
    transport: Arc<dyn ClientTransport>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect, send the request and wait for the response. Blocks the calling thread, which
    /// must not be a runtime worker of the transport.
    pub fn fetch(&self, request: &RequestBuilder, cancel: &Cancellation) -> Transaction {
        let url = &request.url;
        info!("fetching {}", url);
        let exchange = Arc::new(Exchange {
            progress: Mutex::new(Progress {
                parser: ResponseParser::new(),
                buffer: BytesMut::new(),
                collector: ResponseCollector::default(),
                head_request: request.method == Method::Head,
                outcome: None,
            }),
            done: Condvar::new(),
        });

        let on_data: DataReceivedDelegate = {
            let exchange = exchange.clone();
            Box::new(move |data| {
                let mut progress = exchange.lock();
                progress.data_received(data);
                if progress.outcome.is_some() {
                    exchange.done.notify_all();
                }
            })
        };
        let on_broken: BrokenDelegate = {
            let exchange = exchange.clone();
            Box::new(move |clean| {
                let mut progress = exchange.lock();
                progress.connection_broken(clean);
                exchange.done.notify_all();
            })
        };

        let connection = match self.transport.connect(&url.host, url.port, on_data, on_broken) {
            Ok(connection) => connection,
            Err(e) => {
                warn!("unable to connect to {}: {}", url.authority(), e);
                return Transaction {
                    state: TransactionState::UnableToConnect,
                    response: Response::default(),
                };
            }
        };
        debug!("connected to {}", connection.peer_id());
        connection.send(&request.to_bytes());

        let deadline = Instant::now() + self.timeout;
        let state = {
            let mut progress = exchange.lock();
            loop {
                if let Some(outcome) = progress.outcome {
                    break outcome;
                }
                if cancel.is_cancelled() {
                    break TransactionState::Cancelled;
                }
                if Instant::now() >= deadline {
                    break TransactionState::Timeout;
                }
                progress = exchange
                    .done
                    .wait_timeout(progress, POLL_INTERVAL)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        };
        if state != TransactionState::Completed {
            connection.disconnect(false);
        }
        // releases the transport's resources (the TLS worker is joined here)
        drop(connection);

        let response = std::mem::take(&mut exchange.lock().collector).into_response();
        debug!("fetch of {} finished: {:?}", url, state);
        Transaction { state, response }
    }
}

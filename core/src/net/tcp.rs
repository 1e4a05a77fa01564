/*
 * tcp.rs
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

//! Plaintext TCP transport on tokio.
//!
//! Each connection runs two tasks on the given runtime: a reader that pushes received bytes to
//! the data delegate, and a writer fed by an unbounded command channel, so `send` and
//! `disconnect` never block the caller. The broken delegate fires at most once, from whichever
//! task notices the end first.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::net::{BrokenDelegate, ClientTransport, Connection, DataReceivedDelegate};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const READ_BUFFER_SIZE: usize = 8192;

/// Opens plain TCP connections whose I/O runs on a tokio runtime.
pub struct TcpTransport {
    runtime: Handle,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    async fn open(&self, host: &str, port: u16) -> Result<TcpStream, TransportError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                source,
            })?
            .collect();
        let mut last_error = None;
        for addr in &addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(source) => Err(TransportError::Connect {
                addr: format!("{}:{}", host, port),
                source,
            }),
            None => Err(TransportError::NoAddress(host.to_string())),
        }
    }
}

impl ClientTransport for TcpTransport {
    /// Blocks the calling thread until connected. Must not be called from inside the runtime.
    fn connect(
        &self,
        host: &str,
        port: u16,
        on_data: DataReceivedDelegate,
        on_broken: BrokenDelegate,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let stream = self
            .runtime
            .block_on(async { timeout(self.connect_timeout, self.open(host, port)).await })
            .map_err(|_| TransportError::ConnectTimeout(format!("{}:{}", host, port)))??;
        let peer = stream.peer_addr().map_err(|source| TransportError::Connect {
            addr: format!("{}:{}", host, port),
            source,
        })?;
        let _ = stream.set_nodelay(true);
        debug!("connected to {}", peer);
        Ok(Arc::new(TcpConnection::start(
            &self.runtime,
            stream,
            peer,
            on_data,
            on_broken,
        )))
    }
}

enum Command {
    Data(Vec<u8>),
    Break { clean: bool },
}

/// Holds the broken delegate until the first report.
struct BrokenSlot(Mutex<Option<BrokenDelegate>>);

impl BrokenSlot {
    fn fire(&self, clean: bool) {
        let delegate = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(delegate) = delegate {
            delegate(clean);
        }
    }
}

/// A connected TCP stream driven by reader/writer tasks.
pub struct TcpConnection {
    commands: mpsc::UnboundedSender<Command>,
    reader: AbortHandle,
    peer: SocketAddr,
}

impl TcpConnection {
    fn start(
        runtime: &Handle,
        stream: TcpStream,
        peer: SocketAddr,
        mut on_data: DataReceivedDelegate,
        on_broken: BrokenDelegate,
    ) -> Self {
        let (mut read_half, mut write_half) = stream.into_split();
        let broken = Arc::new(BrokenSlot(Mutex::new(Some(on_broken))));

        let reader_broken = broken.clone();
        let reader = runtime.spawn(async move {
            let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
            loop {
                buf.clear();
                match read_half.read_buf(&mut buf).await {
                    Ok(0) => {
                        trace!("{}: peer closed", peer);
                        reader_broken.fire(true);
                        break;
                    }
                    Ok(n) => {
                        trace!("{}: received {} bytes", peer, n);
                        on_data(&buf[..n]);
                    }
                    Err(e) => {
                        debug!("{}: read failed: {}", peer, e);
                        reader_broken.fire(false);
                        break;
                    }
                }
            }
        });
        let reader = reader.abort_handle();

        let (commands, mut queue) = mpsc::unbounded_channel();
        let writer_reader = reader.clone();
        runtime.spawn(async move {
            while let Some(command) = queue.recv().await {
                match command {
                    Command::Data(data) => {
                        if let Err(e) = write_half.write_all(&data).await {
                            debug!("{}: write failed: {}", peer, e);
                            writer_reader.abort();
                            broken.fire(false);
                            break;
                        }
                    }
                    Command::Break { clean: true } => {
                        let _ = write_half.shutdown().await;
                        break;
                    }
                    Command::Break { clean: false } => {
                        writer_reader.abort();
                        broken.fire(false);
                        break;
                    }
                }
            }
        });

        Self {
            commands,
            reader,
            peer,
        }
    }
}

impl Connection for TcpConnection {
    fn send(&self, data: &[u8]) {
        if self.commands.send(Command::Data(data.to_vec())).is_err() {
            trace!("{}: dropping {} bytes sent after close", self.peer, data.len());
        }
    }

    fn disconnect(&self, clean: bool) {
        debug!("{}: breaking connection (clean: {})", self.peer, clean);
        let _ = self.commands.send(Command::Break { clean });
    }

    fn peer_address(&self) -> String {
        self.peer.ip().to_string()
    }

    fn peer_id(&self) -> String {
        self.peer.to_string()
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

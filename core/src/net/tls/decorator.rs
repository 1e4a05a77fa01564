/*
 * decorator.rs
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

//! `TlsDecorator`: a `ClientTransport` that wraps another one and runs every connection it opens
//! through a TLS client session.

use std::sync::{Arc, Mutex, PoisonError};

use rustls::ClientConfig;
use tracing::{debug, info, warn};

use crate::config::TlsConfig;
use crate::error::TransportError;
use crate::net::tls::connection::{Shared, TlsConnection};
use crate::net::tls::engine::TlsEngine;
use crate::net::{BrokenDelegate, ClientTransport, Connection, DataReceivedDelegate};

/// Decorates a raw transport with TLS. Configure once, then use it wherever a `ClientTransport`
/// is expected.
pub struct TlsDecorator {
    upper: Arc<dyn ClientTransport>,
    config: TlsConfig,
    server_name: Option<String>,
    /// Built on first connect and shared by later sessions (session resumption cache included).
    client_config: Mutex<Option<Arc<ClientConfig>>>,
}

impl TlsDecorator {
    pub fn new(upper: Arc<dyn ClientTransport>, config: TlsConfig) -> Self {
        Self {
            upper,
            config,
            server_name: None,
            client_config: Mutex::new(None),
        }
    }

    /// Name to present (SNI) and verify against, instead of the host passed to `connect`.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    fn client_config(&self) -> Result<Arc<ClientConfig>, TransportError> {
        let mut cached = self.client_config.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = cached.as_ref() {
            return Ok(config.clone());
        }
        let config = self.config.client_config()?;
        *cached = Some(config.clone());
        Ok(config)
    }

    /// Open a TLS connection to `host:port` and return it as the concrete type.
    pub fn connect_tls(
        &self,
        host: &str,
        port: u16,
        on_data: DataReceivedDelegate,
        on_broken: BrokenDelegate,
    ) -> Result<TlsConnection, TransportError> {
        let server_name = self.server_name.as_deref().unwrap_or(host);
        let client_config = self.client_config().inspect_err(|e| {
            warn!("TLS configuration failed: {}", e);
        })?;
        let engine =
            TlsEngine::start_handshake(client_config, server_name, self.config.max_encrypt_chunk)
                .inspect_err(|e| warn!("unable to start TLS session for {}: {}", server_name, e))?;
        let shared = Shared::new(on_broken);
        let raw = self.upper.connect(
            host,
            port,
            shared.ciphertext_delegate(),
            shared.broken_delegate(),
        )?;
        debug!("raw connection to {} open; starting TLS worker", raw.peer_id());
        match TlsConnection::start(
            shared,
            raw.clone(),
            engine,
            on_data,
            self.config.decrypt_buffer_size,
        ) {
            Ok(connection) => {
                info!("TLS connection to {} ({}:{}) started", server_name, host, port);
                Ok(connection)
            }
            Err(e) => {
                warn!("unable to start TLS worker: {}", e);
                raw.disconnect(false);
                Err(e)
            }
        }
    }
}

impl ClientTransport for TlsDecorator {
    fn connect(
        &self,
        host: &str,
        port: u16,
        on_data: DataReceivedDelegate,
        on_broken: BrokenDelegate,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let connection = self.connect_tls(host, port, on_data, on_broken)?;
        Ok(Arc::new(connection))
    }
}

/*
 * error.rs
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

//! Error types for transports, the TLS engine, configuration, URL and response parsing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to open a connection. Returned synchronously by `ClientTransport::connect`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),
    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),
    #[error("TLS configuration failed: {0}")]
    Config(#[from] ConfigError),
    #[error("TLS engine refused to start: {0}")]
    Engine(#[from] TlsError),
    #[error("unable to start TLS worker: {0}")]
    Worker(#[source] io::Error),
}

/// Error from the TLS engine. Fatal for the session it came from.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS protocol error: {0}")]
    Protocol(#[from] rustls::Error),
    #[error("TLS I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Invalid or unusable TLS configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read root certificates file '{}': {source}", .path.display())]
    ReadCertificates {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid root certificate: {0}")]
    InvalidCertificate(String),
    #[error("no usable root certificates")]
    NoRootCertificates,
    #[error("no TLS protocol versions enabled")]
    NoProtocolVersions,
    #[error(transparent)]
    Rustls(#[from] rustls::Error),
    #[error(transparent)]
    Verifier(#[from] rustls::client::VerifierBuilderError),
}

/// URL that cannot be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("no scheme in URL")]
    MissingScheme,
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("no host in URL")]
    MissingHost,
    #[error("bad port '{0}'")]
    BadPort(String),
}

/// Malformed HTTP/1.1 response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid status line {0:?}")]
    StatusLine(String),
    #[error("invalid header line")]
    HeaderLine,
    #[error("invalid Content-Length {0:?}")]
    ContentLength(String),
    #[error("invalid chunk size {0:?}")]
    ChunkSize(String),
}

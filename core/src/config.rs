/*
 * config.rs
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

//! TLS client configuration: trust roots, protocol-version allow-list, verification toggles, and
//! the buffer sizes the TLS connection worker uses.
//!
//! Certificate and name verification are on by default. Turning either off is an explicit,
//! separately named call so it cannot happen by accident.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::ConfigError;

/// Number of bytes to allocate for receiving decrypted data from the TLS engine.
pub const DEFAULT_DECRYPT_BUFFER_SIZE: usize = 65536;

/// Largest plaintext slice handed to the engine in one write (one TLS record).
pub const DEFAULT_MAX_ENCRYPT_CHUNK: usize = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Tls12,
    Tls13,
}

impl ProtocolVersion {
    fn supported(&self) -> &'static rustls::SupportedProtocolVersion {
        match self {
            ProtocolVersion::Tls12 => &rustls::version::TLS12,
            ProtocolVersion::Tls13 => &rustls::version::TLS13,
        }
    }
}

/// Where trust anchors come from.
#[derive(Debug, Clone)]
pub enum RootCertificates {
    /// Platform native certs first, then webpki-roots as fallback.
    Platform,
    /// PEM bundle contents (e.g. a cert.pem shipped next to the executable).
    Pem(Vec<u8>),
    /// Already-decoded certificates.
    Der(Vec<CertificateDer<'static>>),
}

/// TLS client settings used by `TlsDecorator`.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub roots: RootCertificates,
    pub protocol_versions: Vec<ProtocolVersion>,
    pub verify_certificate: bool,
    pub verify_name: bool,
    pub alpn_protocols: Vec<Vec<u8>>,
    pub decrypt_buffer_size: usize,
    pub max_encrypt_chunk: usize,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            roots: RootCertificates::Platform,
            protocol_versions: vec![ProtocolVersion::Tls13, ProtocolVersion::Tls12],
            verify_certificate: true,
            verify_name: true,
            alpn_protocols: vec![b"http/1.1".to_vec()],
            decrypt_buffer_size: DEFAULT_DECRYPT_BUFFER_SIZE,
            max_encrypt_chunk: DEFAULT_MAX_ENCRYPT_CHUNK,
        }
    }
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust only the certificates in the given PEM bundle.
    pub fn with_root_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.roots = RootCertificates::Pem(pem.into());
        self
    }

    /// Trust only the certificates in the PEM file at `path`.
    pub fn with_root_pem_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let pem = fs::read(path).map_err(|source| ConfigError::ReadCertificates {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.with_root_pem(pem))
    }

    pub fn with_root_certificates(mut self, certs: Vec<CertificateDer<'static>>) -> Self {
        self.roots = RootCertificates::Der(certs);
        self
    }

    pub fn with_protocol_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.protocol_versions = versions.to_vec();
        self
    }

    pub fn with_alpn_protocols(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.alpn_protocols = protocols;
        self
    }

    pub fn with_decrypt_buffer_size(mut self, size: usize) -> Self {
        self.decrypt_buffer_size = size.max(1);
        self
    }

    pub fn with_max_encrypt_chunk(mut self, size: usize) -> Self {
        self.max_encrypt_chunk = size.max(1);
        self
    }

    /// Accept any server certificate. Handshake signatures are still checked.
    pub fn insecure_skip_certificate_verification(mut self) -> Self {
        self.verify_certificate = false;
        self
    }

    /// Validate the chain but accept a certificate issued for a different name.
    pub fn insecure_skip_name_verification(mut self) -> Self {
        self.verify_name = false;
        self
    }

    /// Build the rustls client configuration (ring provider).
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, ConfigError> {
        if self.protocol_versions.is_empty() {
            return Err(ConfigError::NoProtocolVersions);
        }
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let versions: Vec<&'static rustls::SupportedProtocolVersion> =
            self.protocol_versions.iter().map(|v| v.supported()).collect();
        let builder =
            ClientConfig::builder_with_provider(provider.clone()).with_protocol_versions(&versions)?;

        let verifier: Arc<dyn ServerCertVerifier> = if self.verify_certificate {
            let roots = Arc::new(self.root_store()?);
            let webpki = WebPkiServerVerifier::builder_with_provider(roots, provider.clone()).build()?;
            if self.verify_name {
                webpki
            } else {
                Arc::new(IgnoreNameVerifier { inner: webpki })
            }
        } else {
            Arc::new(NoCertificateVerifier { provider })
        };

        let mut config = builder
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();
        config.alpn_protocols = self.alpn_protocols.clone();
        Ok(Arc::new(config))
    }

    fn root_store(&self) -> Result<RootCertStore, ConfigError> {
        let mut root_store = RootCertStore::empty();
        match &self.roots {
            RootCertificates::Platform => return Ok(platform_root_store()),
            RootCertificates::Pem(pem) => {
                for cert in CertificateDer::pem_slice_iter(pem) {
                    let cert = cert.map_err(|e| ConfigError::InvalidCertificate(e.to_string()))?;
                    root_store.add(cert)?;
                }
            }
            RootCertificates::Der(certs) => {
                for cert in certs {
                    root_store.add(cert.clone())?;
                }
            }
        }
        if root_store.is_empty() {
            return Err(ConfigError::NoRootCertificates);
        }
        Ok(root_store)
    }
}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn platform_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => tracing::debug!("native root certificates unavailable: {}", e),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Full webpki validation except the certificate-name check.
#[derive(Debug)]
struct IgnoreNameVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for IgnoreNameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => {
                tracing::warn!("accepting certificate not valid for {:?}", server_name);
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Accepts any certificate chain; handshake signatures are still verified against it.
#[derive(Debug)]
struct NoCertificateVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoCertificateVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

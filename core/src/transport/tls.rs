/*
 * tls.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Magazzino, a client SDK for the Magazzino
 * backend service.
 *
 * Magazzino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Magazzino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Magazzino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS client configuration shared by both executors: root store (platform
//! native certs, webpki fallback, or a caller-supplied CA bundle), optional
//! client certificate, optional acceptance of self-signed servers, and ALPN
//! selection. Built fresh per request so process-wide option changes take
//! effect immediately.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::ClientConfig;
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::config::TlsOptions;
use crate::error::ConfigError;

/// ALPN protocols to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alpn {
    /// http/1.1 only.
    Http1,
    /// h2 preferred, http/1.1 accepted (the caller checks what was
    /// negotiated and falls back accordingly).
    H2,
}

/// Build the root store: the CA bundle when configured, otherwise platform
/// native certs with the Mozilla roots as fallback.
fn build_root_store(ca: Option<&Path>) -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    if let Some(path) = ca {
        for cert in read_certs(path)? {
            roots
                .add(cert)
                .map_err(|e| ConfigError::new(format!("invalid CA certificate: {}", e)))?;
        }
        if roots.is_empty() {
            return Err(ConfigError::new(format!(
                "no certificates found in CA bundle {}",
                path.display()
            )));
        }
        return Ok(roots);
    }
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = roots.add(cert);
        }
    }
    if roots.is_empty() {
        roots.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    Ok(roots)
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let file = File::open(path)
        .map_err(|e| ConfigError::new(format!("cannot read {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::new(format!("invalid PEM in {}: {}", path.display(), e)))
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let file = File::open(path)
        .map_err(|e| ConfigError::new(format!("cannot read {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ConfigError::new(format!("invalid PEM in {}: {}", path.display(), e)))?
        .ok_or_else(|| ConfigError::new(format!("no private key found in {}", path.display())))
}

/// Build a rustls client config from the process-wide TLS options.
pub fn client_config(options: &TlsOptions, alpn: Alpn) -> Result<Arc<ClientConfig>, ConfigError> {
    if options.passphrase.as_deref().is_some_and(|p| !p.is_empty()) {
        return Err(ConfigError::new(
            "encrypted client keys are not supported; provide an unencrypted key",
        ));
    }
    if options.key.is_some() != options.cert.is_some() {
        return Err(ConfigError::new(
            "client certificate requires both key and cert",
        ));
    }

    let builder = if options.allow_self_signed {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new()))
    } else {
        ClientConfig::builder().with_root_certificates(build_root_store(options.ca.as_deref())?)
    };

    let mut config = match (&options.key, &options.cert) {
        (Some(key_path), Some(cert_path)) => {
            let certs = read_certs(cert_path)?;
            let key = read_private_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| ConfigError::new(format!("client certificate rejected: {}", e)))?
        }
        _ => builder.with_no_client_auth(),
    };

    config.alpn_protocols = match alpn {
        Alpn::Http1 => vec![b"http/1.1".to_vec()],
        Alpn::H2 => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
    };
    Ok(Arc::new(config))
}

/// Server certificate verifier that accepts anything. Installed only when
/// the caller explicitly sets allow_self_signed.
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyServerCert {
    fn new() -> Self {
        Self {
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
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
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_build() {
        let config = client_config(&TlsOptions::default(), Alpn::Http1).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn h2_alpn_offers_both() {
        let config = client_config(&TlsOptions::default(), Alpn::H2).unwrap();
        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }

    #[test]
    fn self_signed_acceptance_builds() {
        let options = TlsOptions {
            allow_self_signed: true,
            ..TlsOptions::default()
        };
        assert!(client_config(&options, Alpn::Http1).is_ok());
    }

    #[test]
    fn key_without_cert_rejected() {
        let options = TlsOptions {
            key: Some("/tmp/key.pem".into()),
            ..TlsOptions::default()
        };
        assert!(client_config(&options, Alpn::Http1).is_err());
    }

    #[test]
    fn passphrase_rejected_at_build_time() {
        let options = TlsOptions {
            key: Some("/tmp/key.pem".into()),
            cert: Some("/tmp/cert.pem".into()),
            passphrase: Some("secret".into()),
            ..TlsOptions::default()
        };
        assert!(client_config(&options, Alpn::Http1).is_err());
    }
}

//! TLS settings target and acceptor construction.
//!
//! [`TlsSettings`] is the TLS-capable collaborator that builder-held TLS
//! intent is pushed into (see [`SslSupport`]). Once populated it builds a
//! rustls acceptor for the listening socket.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::server::ssl::SslSupport;

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("TLS enabled but no key store path was configured")]
    MissingKeyStore,
    #[error("client auth required but no trust store path was configured")]
    MissingTrustStore,
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificate found in {0:?}")]
    NoCertificate(PathBuf),
    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),
    #[error("invalid TLS configuration: {0}")]
    Config(String),
}

/// TLS parameters of a listening socket.
///
/// The key store is a PEM file holding the certificate chain followed by the
/// private key. The trust store is a PEM file of CA certificates used to
/// verify client certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub key_store_path: Option<PathBuf>,
    pub key_store_password: Option<String>,
    pub trust_store_path: Option<PathBuf>,
    pub trust_store_password: Option<String>,
    pub client_auth_required: bool,
}

impl SslSupport for TlsSettings {
    fn set_ssl(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_key_store_path(&mut self, path: Option<PathBuf>) {
        self.key_store_path = path;
    }

    fn set_key_store_password(&mut self, password: Option<String>) {
        self.key_store_password = password;
    }

    fn set_trust_store_path(&mut self, path: Option<PathBuf>) {
        self.trust_store_path = path;
    }

    fn set_trust_store_password(&mut self, password: Option<String>) {
        self.trust_store_password = password;
    }

    fn set_client_auth_required(&mut self, required: bool) {
        self.client_auth_required = required;
    }
}

impl TlsSettings {
    /// Build an acceptor, or `None` when TLS is disabled.
    pub fn acceptor(&self) -> Result<Option<TlsAcceptor>, TlsError> {
        if !self.enabled {
            return Ok(None);
        }
        let config = self.server_config()?;
        Ok(Some(TlsAcceptor::from(Arc::new(config))))
    }

    fn server_config(&self) -> Result<ServerConfig, TlsError> {
        let key_store = self.key_store_path.as_deref().ok_or(TlsError::MissingKeyStore)?;
        if self.key_store_password.is_some() {
            tracing::debug!(path = ?key_store, "Key store password ignored for PEM key store");
        }

        let certs = load_certs(key_store)?;
        let key = load_private_key(key_store)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| TlsError::Config(e.to_string()))?;

        let builder = if self.client_auth_required {
            let trust_store = self
                .trust_store_path
                .as_deref()
                .ok_or(TlsError::MissingTrustStore)?;
            let mut roots = RootCertStore::empty();
            for cert in load_certs(trust_store)? {
                roots
                    .add(cert)
                    .map_err(|e| TlsError::Config(e.to_string()))?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| TlsError::Config(e.to_string()))?;
            builder.with_client_cert_verifier(verifier)
        } else {
            builder.with_no_client_auth()
        };

        builder
            .with_single_cert(certs, key)
            .map_err(|e| TlsError::Config(e.to_string()))
    }
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

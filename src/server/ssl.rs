//! TLS builder tier.
//!
//! TLS intent stays on the builder until a server opens its listening
//! socket and calls [`TlsArgs::configure_ssl`] on a TLS-capable target.

use std::path::PathBuf;

use crate::server::args::{ServerArgs, ServerBuilder};

/// A component that can be switched to TLS and handed credentials.
pub trait SslSupport {
    fn set_ssl(&mut self, enabled: bool);
    fn set_key_store_path(&mut self, path: Option<PathBuf>);
    fn set_key_store_password(&mut self, password: Option<String>);
    fn set_trust_store_path(&mut self, path: Option<PathBuf>);
    fn set_trust_store_password(&mut self, password: Option<String>);
    fn set_client_auth_required(&mut self, required: bool);
}

/// TLS fields held by a builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsArgs {
    pub ssl: bool,
    pub key_store_path: Option<PathBuf>,
    pub key_store_password: Option<String>,
    pub trust_store_path: Option<PathBuf>,
    pub trust_store_password: Option<String>,
    pub client_auth_required: bool,
}

impl TlsArgs {
    /// Push the TLS settings onto `target`.
    ///
    /// Does nothing when TLS is disabled. Trust-store fields and the
    /// client-auth flag are only pushed when client auth is required.
    /// Credential values are passed through unchecked.
    pub fn configure_ssl(&self, target: &mut dyn SslSupport) {
        if !self.ssl {
            return;
        }
        target.set_ssl(true);
        target.set_key_store_path(self.key_store_path.clone());
        target.set_key_store_password(self.key_store_password.clone());
        if self.client_auth_required {
            target.set_trust_store_path(self.trust_store_path.clone());
            target.set_trust_store_password(self.trust_store_password.clone());
            target.set_client_auth_required(true);
        }
    }
}

/// Fluent TLS setters for builders that embed [`TlsArgs`].
pub trait TlsBuilder: Sized {
    fn tls_args(&mut self) -> &mut TlsArgs;

    fn ssl(mut self, enabled: bool) -> Self {
        self.tls_args().ssl = enabled;
        self
    }

    fn key_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_args().key_store_path = Some(path.into());
        self
    }

    fn key_store_password(mut self, password: impl Into<String>) -> Self {
        self.tls_args().key_store_password = Some(password.into());
        self
    }

    fn trust_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_args().trust_store_path = Some(path.into());
        self
    }

    fn trust_store_password(mut self, password: impl Into<String>) -> Self {
        self.tls_args().trust_store_password = Some(password.into());
        self
    }

    fn client_auth_required(mut self, required: bool) -> Self {
        self.tls_args().client_auth_required = required;
        self
    }
}

impl TlsBuilder for TlsArgs {
    fn tls_args(&mut self) -> &mut TlsArgs {
        self
    }
}

/// Second builder tier: base arguments plus TLS.
#[derive(Clone, Default)]
pub struct TlsServerArgs {
    pub args: ServerArgs,
    pub tls: TlsArgs,
}

impl TlsServerArgs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServerBuilder for TlsServerArgs {
    fn server_args(&mut self) -> &mut ServerArgs {
        &mut self.args
    }
}

impl TlsBuilder for TlsServerArgs {
    fn tls_args(&mut self) -> &mut TlsArgs {
        &mut self.tls
    }
}

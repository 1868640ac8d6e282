//! Error types for the HTTP transport.

use std::io;
use std::net::SocketAddr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use zkhttp_config::ConfigError;

/// Errors raised while loading TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A PEM file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was being read.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The certificate file held no usable chain.
    #[error("invalid certificate chain in {path}: {message}")]
    Certificate {
        /// Certificate file.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// The key file held no usable private key.
    #[error("invalid private key in {path}: {message}")]
    PrivateKey {
        /// Key file.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// The certificate and key were rejected together.
    #[error("failed to build TLS configuration: {source}")]
    Config {
        /// Underlying rustls error.
        #[source]
        source: rustls::Error,
    },
}

impl TlsError {
    pub(crate) fn read(path: &Utf8Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_owned(),
            source,
        }
    }

    pub(crate) fn certificate(path: &Utf8Path, message: impl Into<String>) -> Self {
        Self::Certificate {
            path: path.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn private_key(path: &Utf8Path, message: impl Into<String>) -> Self {
        Self::PrivateKey {
            path: path.to_owned(),
            message: message.into(),
        }
    }
}

/// Errors surfaced while binding or running the HTTP server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listen address could not be parsed.
    #[error("invalid listen address: {source}")]
    Address {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// The listener could not be bound.
    #[error("failed to bind HTTP listener at {address}: {source}")]
    Bind {
        /// Address that was requested.
        address: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// TLS material could not be loaded.
    #[error(transparent)]
    Tls(#[from] TlsError),
    /// The server stopped with an IO error.
    #[error("HTTP server failed: {source}")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

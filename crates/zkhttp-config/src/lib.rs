//! Shared configuration for the zkhttp daemon.
//!
//! Configuration is layered with [`ortho_config`]: command-line flags override
//! `ZKHTTP_*` environment variables, which override a `.zkhttp.toml` file,
//! which overrides the defaults in [`defaults`]. The resolved [`Config`] is an
//! immutable value that the daemon passes by reference into every component
//! that needs it.

mod defaults;
mod logging;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_ENDPOINT, DEFAULT_ENSEMBLE, DEFAULT_LISTEN_ADDRESS, DEFAULT_LOG_FILTER,
    DEFAULT_SESSION_TIMEOUT_SECS, default_endpoint, default_ensemble, default_listen_address,
    default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use ortho_config::OrthoError;

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ZKHTTP")]
pub struct Config {
    /// Address the HTTP server listens on. A bare `:port` binds every
    /// interface.
    #[ortho_config(default = default_listen_address())]
    pub listen: String,
    /// Path of the command endpoint.
    #[ortho_config(default = default_endpoint())]
    pub endpoint: String,
    /// PEM certificate chain enabling TLS when paired with `key_file`.
    pub cert_file: Option<Utf8PathBuf>,
    /// PEM private key enabling TLS when paired with `cert_file`.
    pub key_file: Option<Utf8PathBuf>,
    /// Comma-separated ensemble addresses.
    #[ortho_config(default = default_ensemble())]
    pub ensemble: String,
    /// Prefix prepended to every node path.
    #[ortho_config(default = String::new())]
    pub prefix: String,
    /// Session timeout in seconds.
    #[ortho_config(default = DEFAULT_SESSION_TIMEOUT_SECS)]
    pub session_timeout_secs: u64,
    /// Forwards the coordination client's own diagnostic log into tracing.
    #[ortho_config(default = false)]
    pub client_log: bool,
    /// Filter expression applied to the tracing subscriber.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_address(),
            endpoint: default_endpoint(),
            cert_file: None,
            key_file: None,
            ensemble: default_ensemble(),
            prefix: String::new(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            client_log: false,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

/// Errors raised when a loaded configuration is internally inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The listen address could not be parsed.
    #[error("invalid listen address '{value}': {message}")]
    InvalidListen {
        /// Configured listen value.
        value: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The endpoint path does not start with `/`.
    #[error("endpoint '{value}' must start with '/'")]
    InvalidEndpoint {
        /// Configured endpoint value.
        value: String,
    },
    /// No ensemble address remained after splitting the list.
    #[error("ensemble address list is empty")]
    EmptyEnsemble,
    /// The session timeout was zero.
    #[error("session timeout must be at least one second")]
    ZeroTimeout,
}

impl Config {
    /// Validates cross-field constraints that the loader cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_address()?;
        if !self.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint {
                value: self.endpoint.clone(),
            });
        }
        if self.ensemble_addresses().is_empty() {
            return Err(ConfigError::EmptyEnsemble);
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Parses the listen address, expanding the `:port` shorthand.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidListen`] when the value is not a socket
    /// address.
    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidListen {
            value: self.listen.clone(),
            message,
        };

        if let Some(digits) = self.listen.strip_prefix(':') {
            let port = digits
                .parse::<u16>()
                .map_err(|error| invalid(error.to_string()))?;
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
        }

        self.listen
            .parse::<SocketAddr>()
            .map_err(|error| invalid(error.to_string()))
    }

    /// Returns the trimmed, non-empty ensemble addresses.
    #[must_use]
    pub fn ensemble_addresses(&self) -> Vec<String> {
        self.ensemble
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Returns the certificate and key paths when both are configured.
    #[must_use]
    pub fn tls_files(&self) -> Option<(&Utf8Path, &Utf8Path)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    /// Session timeout as a [`Duration`].
    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Node path prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

//! Defines the unified error surface for daemon launch and supervision.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::coordination::CoordinationError;
use crate::transport::TransportError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed before a session was opened.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The coordination session could not be established.
    #[error("failed to connect to the coordination service: {source}")]
    Connect {
        /// Underlying session error.
        #[source]
        source: CoordinationError,
    },
    /// The blocking connect task panicked or was cancelled.
    #[error("coordination connect task did not complete: {source}")]
    ConnectAborted {
        /// Join failure reported by the runtime.
        #[source]
        source: tokio::task::JoinError,
    },
    /// The session's event stream had already been taken.
    #[error("coordination session events are unavailable")]
    EventsUnavailable,
    /// The HTTP server could not start or failed while running.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Signal handlers could not be installed.
    #[error(transparent)]
    Signal(#[from] ShutdownError),
    /// The coordination session was lost while serving.
    #[error("coordination session lost")]
    SessionLost,
}

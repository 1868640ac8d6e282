//! Error types for request dispatch failures.
//!
//! Every failure between receiving a request body and producing a response is
//! a [`DispatchError`]. Each variant knows the HTTP status it maps to, so the
//! dispatcher can convert any error into a response at a single boundary.

use axum::http::StatusCode;
use thiserror::Error;

use crate::coordination::CoordinationError;

use super::router::CommandKind;

/// Errors surfaced during request parsing and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request body could not be parsed as JSON.
    #[error("malformed JSON: {message}")]
    MalformedJson {
        /// Parser diagnostic.
        message: String,
        /// Underlying serde error, when one was raised.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Request exceeds the maximum allowed size.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Size of the rejected body.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// The request body could not be read from the connection.
    #[error("unreadable request body: {message}")]
    UnreadableBody {
        /// Rejection reported by the HTTP layer.
        message: String,
    },

    /// Request JSON does not have the shape of a command envelope.
    #[error("invalid request structure: {message}")]
    InvalidStructure {
        /// What was wrong with the envelope.
        message: String,
    },

    /// Command name is not one the gateway implements.
    #[error("unimplemented command: {command}")]
    UnknownCommand {
        /// Normalised command name.
        command: String,
    },

    /// Invalid or missing command arguments.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Which argument was rejected and why.
        message: String,
    },

    /// The coordination service rejected the operation.
    #[error("{command} failed: {source}")]
    Coordination {
        /// Command that was running.
        command: CommandKind,
        /// Failure reported by the session.
        #[source]
        source: CoordinationError,
    },

    /// Response serialization failed.
    #[error("failed to serialize response: {0}")]
    SerializeResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Returns the HTTP status reported for this error.
    ///
    /// Unknown commands map to 501. Coordination failures use the status the
    /// command assigns to them. Everything else is a client error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownCommand { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Coordination { command, source } => (*command).failure_status(source),
            Self::MalformedJson { .. }
            | Self::RequestTooLarge { .. }
            | Self::UnreadableBody { .. }
            | Self::InvalidStructure { .. }
            | Self::InvalidArguments { .. }
            | Self::SerializeResponse(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Creates a malformed JSON error from a serde error.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed JSON error with a custom message.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJson {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a request too large error.
    #[must_use]
    pub const fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }

    /// Creates an unreadable body error.
    #[must_use]
    pub fn unreadable_body(message: impl Into<String>) -> Self {
        Self::UnreadableBody {
            message: message.into(),
        }
    }

    /// Creates an invalid structure error.
    #[must_use]
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unknown command error.
    #[must_use]
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates an invalid arguments error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Wraps a coordination failure raised while running `command`.
    #[must_use]
    pub const fn coordination(command: CommandKind, source: CoordinationError) -> Self {
        Self::Coordination { command, source }
    }
}

//! Request decoding and per-command validation.
//!
//! A request body is decoded into an untyped [`Envelope`]. The envelope is
//! then validated into a typed [`Command`] for the resolved [`CommandKind`];
//! handlers only ever see typed values.

use serde_json::{Map, Value};

use crate::coordination::{AclEntry, CreateMode};

use super::acl::acl_from_json;
use super::errors::DispatchError;
use super::path::PathResolver;
use super::router::CommandKind;

/// Maximum size of a request body in bytes.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Parses a request body into an envelope.
    ///
    /// # Errors
    ///
    /// Returns `RequestTooLarge` for bodies over [`MAX_REQUEST_BYTES`],
    /// `MalformedJson` when the body is not JSON and `InvalidStructure` when
    /// it is JSON but not an object.
    pub fn parse(body: &[u8]) -> Result<Self, DispatchError> {
        if body.len() > MAX_REQUEST_BYTES {
            return Err(DispatchError::request_too_large(
                body.len(),
                MAX_REQUEST_BYTES,
            ));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(DispatchError::malformed("empty request body"));
        }

        match serde_json::from_slice(body).map_err(DispatchError::from_json_error)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(DispatchError::invalid_structure(
                "request body must be a JSON object",
            )),
        }
    }

    /// Returns the normalised command name.
    ///
    /// Names are lowercased and `-` is treated as `_`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` when `cmd` is absent or not a string.
    pub fn command_name(&self) -> Result<String, DispatchError> {
        match self.fields.get("cmd") {
            Some(Value::String(name)) => Ok(normalise_command(name)),
            Some(_) => Err(DispatchError::invalid_structure("cmd must be a string")),
            None => Err(DispatchError::invalid_structure("cmd field is missing")),
        }
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    fn required_str(&self, key: &str) -> Result<&str, DispatchError> {
        match self.present(key) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(DispatchError::invalid_arguments(format!(
                "{key} must be a string"
            ))),
            None => Err(DispatchError::invalid_arguments(format!("{key} is required"))),
        }
    }

    fn optional_bool(&self, key: &str) -> Result<bool, DispatchError> {
        match self.present(key) {
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(DispatchError::invalid_arguments(format!(
                "{key} must be a boolean"
            ))),
            None => Ok(false),
        }
    }

    fn required_version(&self) -> Result<i32, DispatchError> {
        let value = self
            .present("version")
            .ok_or_else(|| DispatchError::invalid_arguments("version is required"))?;
        integral_i32(value)
            .ok_or_else(|| DispatchError::invalid_arguments("version must be a 32-bit integer"))
    }

    fn optional_acl(&self) -> Result<Option<Vec<AclEntry>>, DispatchError> {
        self.present("acl").map(acl_from_json).transpose()
    }
}

/// Typed, validated command ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Adds credentials to the session.
    AddAuth {
        /// Authentication scheme, usually `digest`.
        scheme: String,
        /// Scheme-specific credential bytes.
        auth: Vec<u8>,
    },
    /// Creates a node.
    Create {
        /// Resolved node path.
        path: String,
        /// Initial payload.
        data: Vec<u8>,
        /// Requested ACL; the open default applies when absent.
        acl: Option<Vec<AclEntry>>,
        /// Persistence and sequencing mode.
        mode: CreateMode,
    },
    /// Deletes a node at the expected version.
    Delete {
        /// Resolved node path.
        path: String,
        /// Expected data version, `-1` for any.
        version: i32,
    },
    /// Reports whether a node exists.
    Exists {
        /// Resolved node path.
        path: String,
    },
    /// Lists the children of a node.
    GetChildren {
        /// Resolved node path.
        path: String,
    },
    /// Reads a node's payload.
    GetData {
        /// Resolved node path.
        path: String,
    },
    /// Replaces a node's payload at the expected version.
    SetData {
        /// Resolved node path.
        path: String,
        /// New payload.
        data: Vec<u8>,
        /// Expected data version, `-1` for any.
        version: i32,
    },
    /// Reads a node's ACL.
    GetAcl {
        /// Resolved node path.
        path: String,
    },
    /// Replaces a node's ACL at the expected ACL version.
    SetAcl {
        /// Resolved node path.
        path: String,
        /// Replacement entries.
        acl: Vec<AclEntry>,
        /// Expected ACL version, `-1` for any.
        version: i32,
    },
}

impl Command {
    /// Validates the envelope fields required by `kind`.
    ///
    /// Node paths are resolved against `paths` here, so handlers receive the
    /// path sent to the ensemble.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` when a required field is missing or a field
    /// has the wrong type.
    pub fn from_envelope(
        kind: CommandKind,
        envelope: &Envelope,
        paths: &PathResolver,
    ) -> Result<Self, DispatchError> {
        let path = || {
            envelope
                .required_str("path")
                .map(|raw| paths.resolve(raw))
        };
        let command = match kind {
            CommandKind::AddAuthInfo => Self::AddAuth {
                scheme: envelope.required_str("scheme")?.to_owned(),
                auth: envelope.required_str("auth")?.as_bytes().to_vec(),
            },
            CommandKind::Create => Self::Create {
                path: path()?,
                data: envelope.required_str("data")?.as_bytes().to_vec(),
                acl: envelope.optional_acl()?,
                mode: CreateMode::from_flags(
                    envelope.optional_bool("ephemeral")?,
                    envelope.optional_bool("sequential")?,
                ),
            },
            CommandKind::Delete => Self::Delete {
                path: path()?,
                version: envelope.required_version()?,
            },
            CommandKind::Exists => Self::Exists { path: path()? },
            CommandKind::GetChildren => Self::GetChildren { path: path()? },
            CommandKind::GetData => Self::GetData { path: path()? },
            CommandKind::SetData => Self::SetData {
                path: path()?,
                data: envelope.required_str("data")?.as_bytes().to_vec(),
                version: envelope.required_version()?,
            },
            CommandKind::GetAcl => Self::GetAcl { path: path()? },
            CommandKind::SetAcl => Self::SetAcl {
                path: path()?,
                acl: envelope
                    .optional_acl()?
                    .ok_or_else(|| DispatchError::invalid_arguments("acl is required"))?,
                version: envelope.required_version()?,
            },
        };
        Ok(command)
    }
}

/// Lowercases `name` and replaces `-` with `_`.
#[must_use]
pub fn normalise_command(name: &str) -> String {
    name.to_ascii_lowercase().replace('-', "_")
}

/// Reads an integer that fits in `i32`, accepting floats with no fraction.
pub(crate) fn integral_i32(value: &Value) -> Option<i32> {
    if let Some(integer) = value.as_i64() {
        return i32::try_from(integer).ok();
    }
    let float = value.as_f64()?;
    let in_range = float.fract() == 0.0
        && float >= f64::from(i32::MIN)
        && float <= f64::from(i32::MAX);
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the value is only used when range and fraction checks pass"
    )]
    let truncated = float as i32;
    in_range.then_some(truncated)
}

//! Command routing and execution.
//!
//! [`Dispatcher::dispatch`] is the single recovery boundary for a request:
//! every failure after the body arrives is converted into a
//! [`DispatchResponse`] here, so no request can take the process down.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, warn};

use crate::coordination::{AclEntry, Coordination, CoordinationError};

use super::acl::{acl_to_json, default_acl};
use super::errors::DispatchError;
use super::path::PathResolver;
use super::request::{Command, Envelope};
use super::response::{DispatchResponse, object_body};
use super::stat::encode_stat;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Commands implemented by the gateway.
///
/// Watch variants and `multi` are not implemented; they are reported like
/// any other unknown name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CommandKind {
    /// `add_auth_info`
    AddAuthInfo,
    /// `create`
    Create,
    /// `delete`
    Delete,
    /// `exists`
    Exists,
    /// `get_children`
    GetChildren,
    /// `get_data`
    GetData,
    /// `set_data`
    SetData,
    /// `get_acl`
    GetAcl,
    /// `set_acl`
    SetAcl,
}

impl CommandKind {
    /// Parses a normalised command name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCommand` for names the gateway does not implement.
    pub fn parse(name: &str) -> Result<Self, DispatchError> {
        name.parse()
            .map_err(|_| DispatchError::unknown_command(name))
    }

    /// Returns the canonical command name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Status reported when the coordination call for this command fails.
    #[must_use]
    pub const fn failure_status(self, error: &CoordinationError) -> StatusCode {
        match (self, error) {
            (Self::Create, CoordinationError::NodeExists { .. })
            | (
                Self::Delete | Self::SetData | Self::SetAcl,
                CoordinationError::BadVersion { .. },
            ) => StatusCode::NOT_ACCEPTABLE,
            (
                Self::Create
                | Self::Delete
                | Self::GetChildren
                | Self::GetData
                | Self::SetData
                | Self::GetAcl
                | Self::SetAcl,
                CoordinationError::NoNode { .. },
            ) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct CreatedBody<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct ExistsBody {
    exist: bool,
}

#[derive(Serialize)]
struct ChildrenBody<'a> {
    children: &'a [String],
}

#[derive(Serialize)]
struct DataBody<'a> {
    data: &'a str,
}

#[derive(Serialize)]
struct AclBody {
    acl: Vec<Value>,
}

/// Decodes, validates and executes command envelopes.
pub struct Dispatcher {
    coordination: Arc<dyn Coordination>,
    paths: PathResolver,
    default_acl: Vec<AclEntry>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("paths", &self.paths)
            .field("default_acl", &self.default_acl)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher that resolves paths under `prefix`.
    #[must_use]
    pub fn new(coordination: Arc<dyn Coordination>, prefix: &str) -> Self {
        Self {
            coordination,
            paths: PathResolver::new(prefix),
            default_acl: default_acl(),
        }
    }

    /// Handles one request body.
    ///
    /// This never fails: errors are rendered as a status with a
    /// `{"message": ...}` body.
    #[must_use]
    pub fn dispatch(&self, body: &[u8]) -> DispatchResponse {
        match self.try_dispatch(body) {
            Ok(response) => response,
            Err(error) => {
                let response = DispatchResponse::from_error(&error);
                warn!(
                    target: DISPATCH_TARGET,
                    status = response.status().as_u16(),
                    %error,
                    "command failed"
                );
                response
            }
        }
    }

    fn try_dispatch(&self, body: &[u8]) -> Result<DispatchResponse, DispatchError> {
        let envelope = Envelope::parse(body)?;
        let name = envelope.command_name()?;
        let kind = CommandKind::parse(&name)?;
        let command = Command::from_envelope(kind, &envelope, &self.paths)?;

        debug!(
            target: DISPATCH_TARGET,
            command = kind.as_str(),
            "dispatching command"
        );

        self.execute(kind, command)
    }

    fn execute(
        &self,
        kind: CommandKind,
        command: Command,
    ) -> Result<DispatchResponse, DispatchError> {
        let zk = self.coordination.as_ref();
        let fail = |source| DispatchError::coordination(kind, source);

        let response = match command {
            Command::AddAuth { scheme, auth } => {
                zk.add_auth(&scheme, &auth).map_err(fail)?;
                DispatchResponse::ok()
            }
            Command::Create {
                path,
                data,
                acl,
                mode,
            } => {
                let effective_acl = self.acl_or_default(acl);
                let created = zk
                    .create(&path, &data, &effective_acl, mode)
                    .map_err(fail)?;
                DispatchResponse::ok_with(object_body(&CreatedBody { path: &created })?)
            }
            Command::Delete { path, version } => {
                zk.delete(&path, version).map_err(fail)?;
                DispatchResponse::ok()
            }
            Command::Exists { path } => match zk.exists(&path).map_err(fail)? {
                Some(stat) => {
                    let body = object_body(&ExistsBody { exist: true })?;
                    DispatchResponse::ok_with(encode_stat(Some(body), &stat))
                }
                None => DispatchResponse::ok_with(object_body(&ExistsBody { exist: false })?),
            },
            Command::GetChildren { path } => {
                let (children, stat) = zk.get_children(&path).map_err(fail)?;
                let body = object_body(&ChildrenBody {
                    children: &children,
                })?;
                DispatchResponse::ok_with(encode_stat(Some(body), &stat))
            }
            Command::GetData { path } => {
                let (data, stat) = zk.get_data(&path).map_err(fail)?;
                let text = String::from_utf8_lossy(&data);
                let body = object_body(&DataBody { data: &text })?;
                DispatchResponse::ok_with(encode_stat(Some(body), &stat))
            }
            Command::SetData {
                path,
                data,
                version,
            } => {
                let stat = zk.set_data(&path, &data, version).map_err(fail)?;
                DispatchResponse::ok_with(encode_stat(None, &stat))
            }
            Command::GetAcl { path } => {
                let (acl, stat) = zk.get_acl(&path).map_err(fail)?;
                let body = object_body(&AclBody {
                    acl: acl_to_json(&acl),
                })?;
                DispatchResponse::ok_with(encode_stat(Some(body), &stat))
            }
            Command::SetAcl { path, acl, version } => {
                let effective_acl = self.acl_or_default(Some(acl));
                let stat = zk.set_acl(&path, &effective_acl, version).map_err(fail)?;
                DispatchResponse::ok_with(encode_stat(None, &stat))
            }
        };
        Ok(response)
    }

    fn acl_or_default(&self, acl: Option<Vec<AclEntry>>) -> Vec<AclEntry> {
        acl.filter(|entries| !entries.is_empty())
            .unwrap_or_else(|| self.default_acl.clone())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("add_auth_info", CommandKind::AddAuthInfo)]
    #[case("create", CommandKind::Create)]
    #[case("get_children", CommandKind::GetChildren)]
    #[case("get_acl", CommandKind::GetAcl)]
    #[case("set_acl", CommandKind::SetAcl)]
    fn parses_command_names(#[case] name: &str, #[case] expected: CommandKind) {
        let kind = CommandKind::parse(name).expect("known command");
        assert_eq!(kind, expected);
        assert_eq!(kind.as_str(), name);
    }

    #[rstest]
    #[case("exists_watch")]
    #[case("get_children_watch")]
    #[case("get_data_watch")]
    #[case("multi")]
    #[case("Create")]
    fn rejects_unimplemented_commands(#[case] name: &str) {
        assert!(matches!(
            CommandKind::parse(name),
            Err(DispatchError::UnknownCommand { .. })
        ));
    }

    #[rstest]
    #[case(CommandKind::Create, CoordinationError::node_exists("/a"), StatusCode::NOT_ACCEPTABLE)]
    #[case(CommandKind::Create, CoordinationError::no_node("/a"), StatusCode::NOT_FOUND)]
    #[case(CommandKind::Delete, CoordinationError::no_node("/a"), StatusCode::NOT_FOUND)]
    #[case(CommandKind::Delete, CoordinationError::bad_version("/a"), StatusCode::NOT_ACCEPTABLE)]
    #[case(CommandKind::Delete, CoordinationError::node_exists("/a"), StatusCode::BAD_REQUEST)]
    #[case(CommandKind::GetChildren, CoordinationError::no_node("/a"), StatusCode::NOT_FOUND)]
    #[case(CommandKind::GetData, CoordinationError::no_node("/a"), StatusCode::NOT_FOUND)]
    #[case(CommandKind::GetData, CoordinationError::bad_version("/a"), StatusCode::BAD_REQUEST)]
    #[case(CommandKind::SetData, CoordinationError::bad_version("/a"), StatusCode::NOT_ACCEPTABLE)]
    #[case(CommandKind::GetAcl, CoordinationError::no_node("/a"), StatusCode::NOT_FOUND)]
    #[case(CommandKind::SetAcl, CoordinationError::bad_version("/a"), StatusCode::NOT_ACCEPTABLE)]
    #[case(CommandKind::Exists, CoordinationError::no_node("/a"), StatusCode::BAD_REQUEST)]
    #[case(CommandKind::AddAuthInfo, CoordinationError::SessionClosed, StatusCode::BAD_REQUEST)]
    #[case(
        CommandKind::Create,
        CoordinationError::ConnectionLoss { operation: "create" },
        StatusCode::BAD_REQUEST
    )]
    fn maps_coordination_failures(
        #[case] kind: CommandKind,
        #[case] error: CoordinationError,
        #[case] expected: StatusCode,
    ) {
        assert_eq!(kind.failure_status(&error), expected);
    }
}

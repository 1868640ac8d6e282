//! Coordination-service abstraction used by the dispatcher.
//!
//! The [`Coordination`] trait is the only seam between request handling and
//! the ensemble. [`ZkCoordination`] is the production adapter; tests install
//! in-memory doubles behind the same trait. Session lifecycle concerns
//! (event delivery and closing) live on [`ManagedSession`], which request
//! handlers never see.

mod protected;
mod zookeeper;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use zkhttp_config::Config;

pub use self::zookeeper::{ZkConnector, ZkCoordination};

#[cfg(test)]
pub(crate) use self::protected::ProtectedPath;

/// Node metadata reported by the ensemble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStat {
    /// Transaction that created the node.
    pub czxid: i64,
    /// Transaction that last modified the node.
    pub mzxid: i64,
    /// Creation time in milliseconds since the epoch.
    pub ctime: i64,
    /// Last modification time in milliseconds since the epoch.
    pub mtime: i64,
    /// Data version.
    pub version: i32,
    /// Child list version.
    pub cversion: i32,
    /// ACL version.
    pub aversion: i32,
    /// Owning session for ephemeral nodes, zero otherwise.
    pub ephemeral_owner: i64,
    /// Payload length in bytes.
    pub data_length: i32,
    /// Number of direct children.
    pub num_children: i32,
    /// Transaction that last modified the child list.
    pub pzxid: i64,
}

/// One access-control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    /// Authentication scheme, for example `world` or `digest`.
    pub scheme: String,
    /// Identity within the scheme.
    pub id: String,
    /// Permission bitmask.
    pub perms: i32,
}

impl AclEntry {
    /// Builds an entry from its parts.
    #[must_use]
    pub fn new(scheme: impl Into<String>, id: impl Into<String>, perms: i32) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            perms,
        }
    }
}

/// Node creation modes exposed through the command API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Plain persistent node.
    Persistent,
    /// Node removed when the owning session ends.
    Ephemeral,
    /// Persistent node with a sequence suffix appended by the ensemble.
    PersistentSequential,
    /// Ephemeral sequential node whose name embeds a client GUID so the
    /// create can be recovered after a connection loss.
    ProtectedEphemeralSequential,
}

impl CreateMode {
    /// Resolves the mode from the `ephemeral` and `sequential` request flags.
    #[must_use]
    pub const fn from_flags(ephemeral: bool, sequential: bool) -> Self {
        match (ephemeral, sequential) {
            (true, true) => Self::ProtectedEphemeralSequential,
            (true, false) => Self::Ephemeral,
            (false, true) => Self::PersistentSequential,
            (false, false) => Self::Persistent,
        }
    }

    /// Whether the ensemble appends a sequence suffix in this mode.
    #[must_use]
    pub const fn is_sequential(self) -> bool {
        matches!(
            self,
            Self::PersistentSequential | Self::ProtectedEphemeralSequential
        )
    }

    /// Whether nodes created in this mode are owned by the session.
    #[must_use]
    pub const fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral | Self::ProtectedEphemeralSequential)
    }
}

/// Failures reported by a [`Coordination`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinationError {
    /// The node already exists.
    #[error("node already exists: {path}")]
    NodeExists {
        /// Path that was being created.
        path: String,
    },
    /// The node, or a parent required by the operation, does not exist.
    #[error("node does not exist: {path}")]
    NoNode {
        /// Path the operation targeted.
        path: String,
    },
    /// The expected version did not match.
    #[error("version mismatch for node: {path}")]
    BadVersion {
        /// Path whose version was checked.
        path: String,
    },
    /// The connection to the ensemble dropped while the call was in flight.
    #[error("connection lost during {operation}")]
    ConnectionLoss {
        /// Operation that was in flight.
        operation: &'static str,
    },
    /// The session has been closed or has expired.
    #[error("coordination session is closed")]
    SessionClosed,
    /// The ensemble did not grant a session while connecting.
    #[error("no session established with '{ensemble}': {reason}")]
    NotEstablished {
        /// Connect string naming the ensemble members.
        ensemble: String,
        /// Last state observed, or the elapsed wait.
        reason: String,
    },
    /// Any other failure reported by the service.
    #[error("{operation} failed for '{path}': {message}")]
    Service {
        /// Operation that failed.
        operation: &'static str,
        /// Path the operation targeted.
        path: String,
        /// Message reported by the client.
        message: String,
    },
}

impl CoordinationError {
    /// Creates a node-exists error.
    #[must_use]
    pub fn node_exists(path: impl Into<String>) -> Self {
        Self::NodeExists { path: path.into() }
    }

    /// Creates a no-node error.
    #[must_use]
    pub fn no_node(path: impl Into<String>) -> Self {
        Self::NoNode { path: path.into() }
    }

    /// Creates a version mismatch error.
    #[must_use]
    pub fn bad_version(path: impl Into<String>) -> Self {
        Self::BadVersion { path: path.into() }
    }

    /// Creates a generic service error.
    #[must_use]
    pub fn service(
        operation: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            operation,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Synchronous node operations against the ensemble.
///
/// Implementations must be safe to call from many threads at once. Versions
/// follow the native convention where `-1` matches any version.
pub trait Coordination: Send + Sync {
    /// Adds authentication credentials to the session.
    fn add_auth(&self, scheme: &str, auth: &[u8]) -> Result<(), CoordinationError>;

    /// Creates a node and returns its final path.
    fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[AclEntry],
        mode: CreateMode,
    ) -> Result<String, CoordinationError>;

    /// Deletes a node if its version matches.
    fn delete(&self, path: &str, version: i32) -> Result<(), CoordinationError>;

    /// Returns the node metadata, or `None` when the node does not exist.
    fn exists(&self, path: &str) -> Result<Option<NodeStat>, CoordinationError>;

    /// Lists child names together with the parent's metadata.
    fn get_children(&self, path: &str) -> Result<(Vec<String>, NodeStat), CoordinationError>;

    /// Reads the node payload and metadata.
    fn get_data(&self, path: &str) -> Result<(Vec<u8>, NodeStat), CoordinationError>;

    /// Replaces the node payload if its version matches.
    fn set_data(&self, path: &str, data: &[u8], version: i32)
    -> Result<NodeStat, CoordinationError>;

    /// Reads the node ACL and metadata.
    fn get_acl(&self, path: &str) -> Result<(Vec<AclEntry>, NodeStat), CoordinationError>;

    /// Replaces the node ACL if its ACL version matches.
    fn set_acl(
        &self,
        path: &str,
        acl: &[AclEntry],
        version: i32,
    ) -> Result<NodeStat, CoordinationError>;
}

/// Session state transitions published by a managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionEvent {
    /// The session is established.
    Connected,
    /// The connection dropped and the client is trying another server.
    Disconnected,
    /// Authentication was rejected.
    AuthFailed,
    /// The session has ended and will not recover.
    Closed,
}

/// Receiving end of a session's event stream.
pub type SessionEvents = UnboundedReceiver<SessionEvent>;

/// A coordination session owned by the process lifecycle.
pub trait ManagedSession: Coordination {
    /// Hands out the session event stream. Only the first call returns it.
    fn take_events(&self) -> Option<SessionEvents>;

    /// Closes the session. Later calls are no-ops.
    fn close(&self);
}

/// Opens the long-lived session at startup.
pub trait SessionConnector: Send + Sync + 'static {
    /// Concrete session type produced by this connector.
    type Session: ManagedSession + 'static;

    /// Connects to the ensemble named in `config`, blocking until the
    /// session is established or the session timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns a [`CoordinationError`] when the session cannot be opened.
    fn connect(&self, config: &Config) -> Result<Self::Session, CoordinationError>;
}

//! [`Coordination`] adapter over the `zookeeper` client crate.

use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zookeeper::{
    Acl, CreateMode as NativeCreateMode, Permission, Stat, WatchedEvent, Watcher, ZkError,
    ZkResult, ZkState, ZooKeeper,
};

use zkhttp_config::Config;

use crate::session::SESSION_TARGET;
use crate::telemetry;

use super::protected::{ProtectedPath, create_with_recovery};
use super::{
    AclEntry, Coordination, CoordinationError, CreateMode, ManagedSession, NodeStat,
    SessionConnector, SessionEvent, SessionEvents,
};

const PERMISSION_FLAGS: [(i32, Permission); 5] = [
    (0x01, Permission::READ),
    (0x02, Permission::WRITE),
    (0x04, Permission::CREATE),
    (0x08, Permission::DELETE),
    (0x10, Permission::ADMIN),
];

/// Long-lived session against a ZooKeeper ensemble.
pub struct ZkCoordination {
    client: RwLock<Option<ZooKeeper>>,
    events: Mutex<Option<SessionEvents>>,
}

impl std::fmt::Debug for ZkCoordination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("ZkCoordination")
            .field("open", &open)
            .finish_non_exhaustive()
    }
}

impl ZkCoordination {
    /// Opens a session against `ensemble` and blocks until the ensemble grants
    /// it, waiting at most `timeout`.
    ///
    /// When `client_log` is set the client's own `log` records are forwarded
    /// into the tracing subscriber.
    ///
    /// # Errors
    ///
    /// Returns a [`CoordinationError`] when the client cannot be started or
    /// when no session is established within `timeout`.
    pub fn connect(
        ensemble: &[String],
        timeout: Duration,
        client_log: bool,
    ) -> Result<Self, CoordinationError> {
        if client_log && let Err(error) = telemetry::forward_client_log() {
            warn!(target: SESSION_TARGET, %error, "client log forwarding unavailable");
        }

        let connect_string = ensemble.join(",");
        info!(
            target: SESSION_TARGET,
            ensemble = %connect_string,
            timeout_ms = timeout.as_millis(),
            "connecting to ensemble"
        );

        let client = ZooKeeper::connect(&connect_string, timeout, DefaultWatcher)
            .map_err(|error| map_error("connect", &connect_string, error))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let establishment = Arc::new(Establishment::default());
        client.add_listener(state_listener(sender, Arc::clone(&establishment)));

        match establishment.wait(timeout) {
            Some(SessionEvent::Connected) => {
                info!(target: SESSION_TARGET, ensemble = %connect_string, "session established");
            }
            settled => {
                warn!(
                    target: SESSION_TARGET,
                    ensemble = %connect_string,
                    state = ?settled,
                    "session was not established"
                );
                return Err(not_established(connect_string, settled, timeout));
            }
        }

        Ok(Self {
            client: RwLock::new(Some(client)),
            events: Mutex::new(Some(receiver)),
        })
    }

    fn call<T>(
        &self,
        operation: &'static str,
        path: &str,
        request: impl FnOnce(&ZooKeeper) -> ZkResult<T>,
    ) -> Result<T, CoordinationError> {
        let guard = self.client.read().unwrap_or_else(PoisonError::into_inner);
        let client = guard.as_ref().ok_or(CoordinationError::SessionClosed)?;
        request(client).map_err(|error| map_error(operation, path, error))
    }

    fn create_protected(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
    ) -> Result<String, CoordinationError> {
        let protected = ProtectedPath::new(path, Uuid::new_v4());
        create_with_recovery(
            &protected,
            |target| {
                self.call("create", target, |client| {
                    client.create(
                        target,
                        data.to_vec(),
                        acl.to_vec(),
                        NativeCreateMode::EphemeralSequential,
                    )
                })
            },
            |parent| {
                debug!(
                    target: SESSION_TARGET,
                    parent,
                    "checking for protected node after connection loss"
                );
                self.call("get_children", parent, |client| {
                    client.get_children(parent, false)
                })
            },
        )
    }
}

impl Coordination for ZkCoordination {
    fn add_auth(&self, scheme: &str, auth: &[u8]) -> Result<(), CoordinationError> {
        self.call("add_auth", "", |client| client.add_auth(scheme, auth.to_vec()))
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[AclEntry],
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        let entries: Vec<Acl> = acl.iter().map(native_acl).collect();
        let native_mode = match mode {
            CreateMode::Persistent => NativeCreateMode::Persistent,
            CreateMode::Ephemeral => NativeCreateMode::Ephemeral,
            CreateMode::PersistentSequential => NativeCreateMode::PersistentSequential,
            CreateMode::ProtectedEphemeralSequential => {
                return self.create_protected(path, data, &entries);
            }
        };
        self.call("create", path, |client| {
            client.create(path, data.to_vec(), entries, native_mode)
        })
    }

    fn delete(&self, path: &str, version: i32) -> Result<(), CoordinationError> {
        self.call("delete", path, |client| client.delete(path, Some(version)))
    }

    fn exists(&self, path: &str) -> Result<Option<NodeStat>, CoordinationError> {
        let stat = self.call("exists", path, |client| client.exists(path, false))?;
        Ok(stat.as_ref().map(node_stat))
    }

    fn get_children(&self, path: &str) -> Result<(Vec<String>, NodeStat), CoordinationError> {
        let children = self.call("get_children", path, |client| {
            client.get_children(path, false)
        })?;
        // The children call carries no metadata; a node removed in between is
        // reported as missing.
        let stat = self
            .call("exists", path, |client| client.exists(path, false))?
            .ok_or_else(|| CoordinationError::no_node(path))?;
        Ok((children, node_stat(&stat)))
    }

    fn get_data(&self, path: &str) -> Result<(Vec<u8>, NodeStat), CoordinationError> {
        let (data, stat) = self.call("get_data", path, |client| client.get_data(path, false))?;
        Ok((data, node_stat(&stat)))
    }

    fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> Result<NodeStat, CoordinationError> {
        let stat = self.call("set_data", path, |client| {
            client.set_data(path, data.to_vec(), Some(version))
        })?;
        Ok(node_stat(&stat))
    }

    fn get_acl(&self, path: &str) -> Result<(Vec<AclEntry>, NodeStat), CoordinationError> {
        let (acl, stat) = self.call("get_acl", path, |client| client.get_acl(path))?;
        Ok((acl.iter().map(acl_entry).collect(), node_stat(&stat)))
    }

    fn set_acl(
        &self,
        path: &str,
        acl: &[AclEntry],
        version: i32,
    ) -> Result<NodeStat, CoordinationError> {
        let entries: Vec<Acl> = acl.iter().map(native_acl).collect();
        let stat = self.call("set_acl", path, |client| {
            client.set_acl(path, entries, Some(version))
        })?;
        Ok(node_stat(&stat))
    }
}

impl ManagedSession for ZkCoordination {
    fn take_events(&self) -> Option<SessionEvents> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn close(&self) {
        let taken = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = taken {
            info!(target: SESSION_TARGET, "closing coordination session");
            // Dropping the client sends the close request and releases the
            // session's ephemeral nodes.
            drop(client);
        }
    }
}

/// Connector producing [`ZkCoordination`] sessions from the daemon config.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZkConnector;

impl SessionConnector for ZkConnector {
    type Session = ZkCoordination;

    fn connect(&self, config: &Config) -> Result<Self::Session, CoordinationError> {
        ZkCoordination::connect(
            &config.ensemble_addresses(),
            config.session_timeout(),
            config.client_log,
        )
    }
}

/// Default watcher receiving session-level notifications from the client.
struct DefaultWatcher;

impl Watcher for DefaultWatcher {
    fn handle(&self, event: WatchedEvent) {
        debug!(
            target: SESSION_TARGET,
            state = ?event.keeper_state,
            path = ?event.path,
            "session watch notification"
        );
    }
}

/// First settled session state seen while a connect call is waiting.
#[derive(Debug, Default)]
struct Establishment {
    settled: Mutex<Option<SessionEvent>>,
    changed: Condvar,
}

impl Establishment {
    fn record(&self, event: SessionEvent) {
        if event == SessionEvent::Disconnected {
            return;
        }
        let mut settled = self.settled.lock().unwrap_or_else(PoisonError::into_inner);
        if settled.is_none() {
            *settled = Some(event);
            self.changed.notify_all();
        }
    }

    fn wait(&self, timeout: Duration) -> Option<SessionEvent> {
        let pending = self.settled.lock().unwrap_or_else(PoisonError::into_inner);
        let (outcome, _) = self
            .changed
            .wait_timeout_while(pending, timeout, |state| state.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        *outcome
    }
}

fn not_established(
    ensemble: String,
    settled: Option<SessionEvent>,
    timeout: Duration,
) -> CoordinationError {
    let reason = settled.map_or_else(
        || format!("no response within {}ms", timeout.as_millis()),
        |event| format!("session {event} before it was established"),
    );
    CoordinationError::NotEstablished { ensemble, reason }
}

fn state_listener(
    sender: UnboundedSender<SessionEvent>,
    establishment: Arc<Establishment>,
) -> impl Fn(ZkState) + Send + 'static {
    move |state| {
        let Some(event) = session_event(state) else {
            return;
        };
        establishment.record(event);
        if sender.send(event).is_err() {
            debug!(target: SESSION_TARGET, %event, "session event dropped after watcher stopped");
        }
    }
}

fn session_event(state: ZkState) -> Option<SessionEvent> {
    match state {
        ZkState::Connected | ZkState::ConnectedReadOnly => Some(SessionEvent::Connected),
        ZkState::Connecting => Some(SessionEvent::Disconnected),
        ZkState::AuthFailed => Some(SessionEvent::AuthFailed),
        ZkState::Closed => Some(SessionEvent::Closed),
        _ => None,
    }
}

fn map_error(operation: &'static str, path: &str, error: ZkError) -> CoordinationError {
    match error {
        ZkError::NodeExists => CoordinationError::node_exists(path),
        ZkError::NoNode => CoordinationError::no_node(path),
        ZkError::BadVersion => CoordinationError::bad_version(path),
        ZkError::ConnectionLoss => CoordinationError::ConnectionLoss { operation },
        ZkError::SessionExpired => CoordinationError::SessionClosed,
        other => CoordinationError::service(operation, path, format!("{other:?}")),
    }
}

fn node_stat(stat: &Stat) -> NodeStat {
    NodeStat {
        czxid: stat.czxid,
        mzxid: stat.mzxid,
        ctime: stat.ctime,
        mtime: stat.mtime,
        version: stat.version,
        cversion: stat.cversion,
        aversion: stat.aversion,
        ephemeral_owner: stat.ephemeral_owner,
        data_length: stat.data_length,
        num_children: stat.num_children,
        pzxid: stat.pzxid,
    }
}

fn native_acl(entry: &AclEntry) -> Acl {
    Acl::new(permission_from_bits(entry.perms), &entry.scheme, &entry.id)
}

fn acl_entry(acl: &Acl) -> AclEntry {
    AclEntry::new(acl.scheme.clone(), acl.id.clone(), permission_bits(acl.perms))
}

fn permission_from_bits(bits: i32) -> Permission {
    PERMISSION_FLAGS
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .fold(Permission::NONE, |perms, (_, flag)| perms | *flag)
}

fn permission_bits(perms: Permission) -> i32 {
    PERMISSION_FLAGS
        .iter()
        .filter(|(_, flag)| perms.can(*flag))
        .map(|(bit, _)| bit)
        .sum()
}

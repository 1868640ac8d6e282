//! In-memory coordination service with ensemble-like node semantics.
//!
//! Parents must exist before children, sequential names take the parent's
//! child version as a ten digit suffix, version checks follow the `-1` means
//! any convention, and every mutation advances a transaction counter. Closing
//! the session removes its ephemeral nodes and rejects later calls.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use crate::coordination::{
    AclEntry, Coordination, CoordinationError, CreateMode, ManagedSession, NodeStat,
    ProtectedPath, SessionEvent, SessionEvents,
};

/// Session id stamped on ephemeral nodes.
pub const SESSION_ID: i64 = 0x0100_0000_0000_0001;
const EPOCH_MILLIS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    acl: Vec<AclEntry>,
    stat: NodeStat,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    zxid: i64,
    clock: i64,
    auth: Vec<(String, Vec<u8>)>,
    closed: bool,
}

impl Tree {
    fn new() -> Self {
        let root = Node {
            data: Vec::new(),
            acl: Vec::new(),
            stat: NodeStat::default(),
        };
        Self {
            nodes: BTreeMap::from([("/".to_owned(), root)]),
            zxid: 0,
            clock: EPOCH_MILLIS,
            auth: Vec::new(),
            closed: false,
        }
    }

    fn advance(&mut self) -> (i64, i64) {
        self.zxid += 1;
        self.clock += 1;
        (self.zxid, self.clock)
    }

    fn node(&self, path: &str) -> Result<&Node, CoordinationError> {
        self.nodes
            .get(path)
            .ok_or_else(|| CoordinationError::no_node(path))
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut Node, CoordinationError> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| CoordinationError::no_node(path))
    }

    fn adjust_parent(&mut self, parent: &str, delta: i32, zxid: i64) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.stat.cversion += 1;
            node.stat.num_children += delta;
            node.stat.pzxid = zxid;
        }
    }
}

#[derive(Debug)]
struct Shared {
    tree: Mutex<Tree>,
    failures: Mutex<VecDeque<CoordinationError>>,
    calls: AtomicUsize,
    closes: AtomicUsize,
    sender: Mutex<Option<UnboundedSender<SessionEvent>>>,
    events: Mutex<Option<SessionEvents>>,
}

/// Cloneable handle to one in-memory session and its node tree.
#[derive(Debug, Clone)]
pub struct MemoryCoordination {
    shared: Arc<Shared>,
}

impl Default for MemoryCoordination {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCoordination {
    /// Creates a session holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                tree: Mutex::new(Tree::new()),
                failures: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                sender: Mutex::new(Some(sender)),
                events: Mutex::new(Some(events)),
            }),
        }
    }

    /// Number of node operations attempted so far.
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Number of times the session was closed.
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Paths of every node except the root.
    pub fn paths(&self) -> Vec<String> {
        self.lock_tree()
            .nodes
            .keys()
            .filter(|path| path.as_str() != "/")
            .cloned()
            .collect()
    }

    /// Metadata of `path`, if it exists.
    pub fn stat(&self, path: &str) -> Option<NodeStat> {
        self.lock_tree().nodes.get(path).map(|node| node.stat)
    }

    /// Payload of `path`, if it exists.
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.lock_tree().nodes.get(path).map(|node| node.data.clone())
    }

    /// Credentials added to the session.
    pub fn auth(&self) -> Vec<(String, Vec<u8>)> {
        self.lock_tree().auth.clone()
    }

    /// Makes the next node operation fail with `error`.
    pub fn fail_next(&self, error: CoordinationError) {
        self.shared
            .failures
            .lock()
            .expect("failure queue mutex poisoned")
            .push_back(error);
    }

    /// Publishes a session event. Returns `false` once the stream has ended.
    pub fn emit(&self, event: SessionEvent) -> bool {
        self.shared
            .sender
            .lock()
            .expect("event sender mutex poisoned")
            .as_ref()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// Ends the event stream without a `Closed` event.
    pub fn end_events(&self) {
        self.shared
            .sender
            .lock()
            .expect("event sender mutex poisoned")
            .take();
    }

    fn lock_tree(&self) -> MutexGuard<'_, Tree> {
        self.shared.tree.lock().expect("tree mutex poisoned")
    }

    fn enter(&self) -> Result<MutexGuard<'_, Tree>, CoordinationError> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .shared
            .failures
            .lock()
            .expect("failure queue mutex poisoned")
            .pop_front();
        if let Some(error) = injected {
            return Err(error);
        }
        let tree = self.lock_tree();
        if tree.closed {
            return Err(CoordinationError::SessionClosed);
        }
        Ok(tree)
    }
}

fn parent_of(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        _ if path == "/" => None,
        Some(("", _)) => Some("/"),
        Some((parent, _)) => Some(parent),
        None => None,
    }
}

fn child_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

fn check_version(path: &str, expected: i32, actual: i32) -> Result<(), CoordinationError> {
    if expected == -1 || expected == actual {
        Ok(())
    } else {
        Err(CoordinationError::bad_version(path))
    }
}

fn byte_len(data: &[u8]) -> i32 {
    i32::try_from(data.len()).unwrap_or(i32::MAX)
}

impl Coordination for MemoryCoordination {
    fn add_auth(&self, scheme: &str, auth: &[u8]) -> Result<(), CoordinationError> {
        let mut tree = self.enter()?;
        tree.auth.push((scheme.to_owned(), auth.to_vec()));
        Ok(())
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[AclEntry],
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        let mut tree = self.enter()?;
        if !path.starts_with('/') {
            return Err(CoordinationError::service("create", path, "BadArguments"));
        }
        let requested = match mode {
            CreateMode::ProtectedEphemeralSequential => {
                ProtectedPath::new(path, Uuid::new_v4()).path().to_owned()
            }
            _ => path.to_owned(),
        };
        let parent = parent_of(&requested)
            .ok_or_else(|| CoordinationError::node_exists(path))?
            .to_owned();

        let parent_stat = tree.node(&parent).map_err(|_| CoordinationError::no_node(path))?.stat;
        if parent_stat.ephemeral_owner != 0 {
            return Err(CoordinationError::service(
                "create",
                path,
                "NoChildrenForEphemerals",
            ));
        }
        let created = if mode.is_sequential() {
            format!("{requested}{:010}", parent_stat.cversion)
        } else {
            requested
        };
        if tree.nodes.contains_key(&created) {
            return Err(CoordinationError::node_exists(created));
        }

        let (zxid, now) = tree.advance();
        let stat = NodeStat {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            ctime: now,
            mtime: now,
            ephemeral_owner: if mode.is_ephemeral() { SESSION_ID } else { 0 },
            data_length: byte_len(data),
            ..NodeStat::default()
        };
        tree.nodes.insert(
            created.clone(),
            Node {
                data: data.to_vec(),
                acl: acl.to_vec(),
                stat,
            },
        );
        tree.adjust_parent(&parent, 1, zxid);
        Ok(created)
    }

    fn delete(&self, path: &str, version: i32) -> Result<(), CoordinationError> {
        let mut tree = self.enter()?;
        let stat = tree.node(path)?.stat;
        let Some(parent) = parent_of(path) else {
            return Err(CoordinationError::service("delete", path, "BadArguments"));
        };
        check_version(path, version, stat.version)?;
        if stat.num_children > 0 {
            return Err(CoordinationError::service("delete", path, "NotEmpty"));
        }
        tree.nodes.remove(path);
        let (zxid, _) = tree.advance();
        tree.adjust_parent(parent, -1, zxid);
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<Option<NodeStat>, CoordinationError> {
        let tree = self.enter()?;
        Ok(tree.nodes.get(path).map(|node| node.stat))
    }

    fn get_children(&self, path: &str) -> Result<(Vec<String>, NodeStat), CoordinationError> {
        let tree = self.enter()?;
        let stat = tree.node(path)?.stat;
        let children = tree
            .nodes
            .keys()
            .filter(|candidate| parent_of(candidate) == Some(path))
            .map(|candidate| child_name(candidate).to_owned())
            .collect();
        Ok((children, stat))
    }

    fn get_data(&self, path: &str) -> Result<(Vec<u8>, NodeStat), CoordinationError> {
        let tree = self.enter()?;
        let node = tree.node(path)?;
        Ok((node.data.clone(), node.stat))
    }

    fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> Result<NodeStat, CoordinationError> {
        let mut tree = self.enter()?;
        check_version(path, version, tree.node(path)?.stat.version)?;
        let (zxid, now) = tree.advance();
        let node = tree.node_mut(path)?;
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = now;
        node.stat.data_length = byte_len(data);
        Ok(node.stat)
    }

    fn get_acl(&self, path: &str) -> Result<(Vec<AclEntry>, NodeStat), CoordinationError> {
        let tree = self.enter()?;
        let node = tree.node(path)?;
        Ok((node.acl.clone(), node.stat))
    }

    fn set_acl(
        &self,
        path: &str,
        acl: &[AclEntry],
        version: i32,
    ) -> Result<NodeStat, CoordinationError> {
        let mut tree = self.enter()?;
        let node = tree.node_mut(path)?;
        check_version(path, version, node.stat.aversion)?;
        node.acl = acl.to_vec();
        node.stat.aversion += 1;
        Ok(node.stat)
    }
}

impl ManagedSession for MemoryCoordination {
    fn take_events(&self) -> Option<SessionEvents> {
        self.shared
            .events
            .lock()
            .expect("event stream mutex poisoned")
            .take()
    }

    fn close(&self) {
        if self.shared.closes.fetch_add(1, Ordering::SeqCst) > 0 {
            return;
        }
        let mut tree = self.lock_tree();
        tree.closed = true;
        tree.nodes
            .retain(|_, node| node.stat.ephemeral_owner != SESSION_ID);
        drop(tree);
        self.end_events();
    }
}

//! Naming and recovery rules for protected ephemeral-sequential creates.
//!
//! A protected create embeds a client GUID in the node name. When the
//! connection drops mid-request, the parent's children are searched for that
//! GUID so a node the ensemble did create is reported instead of duplicated.

use uuid::Uuid;

use super::CoordinationError;

/// Total number of create attempts before the connection loss is surfaced.
pub(crate) const PROTECTED_CREATE_ATTEMPTS: usize = 3;

const PROTECTED_MARKER: &str = "_c_";

/// Rewritten path for one protected create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtectedPath {
    parent: String,
    child_prefix: String,
    path: String,
}

impl ProtectedPath {
    /// Rewrites `path` as `<parent>/_c_<guid>-<name>`.
    pub(crate) fn new(path: &str, guid: Uuid) -> Self {
        let (parent, name) = match path.rfind('/') {
            Some(0) => ("/", path.get(1..).unwrap_or_default()),
            Some(index) => (
                path.get(..index).unwrap_or_default(),
                path.get(index + 1..).unwrap_or_default(),
            ),
            None => ("", path),
        };
        let child_prefix = format!("{PROTECTED_MARKER}{}-", guid.simple());
        let protected = join_child(parent, &format!("{child_prefix}{name}"));
        Self {
            parent: parent.to_owned(),
            child_prefix,
            path: protected,
        }
    }

    /// Parent node that receives the protected child.
    pub(crate) fn parent(&self) -> &str {
        &self.parent
    }

    /// Full protected path passed to the ensemble.
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Returns the full path of a child created by this request, if any.
    pub(crate) fn find_created(&self, children: &[String]) -> Option<String> {
        children
            .iter()
            .find(|child| child.starts_with(&self.child_prefix))
            .map(|child| join_child(&self.parent, child))
    }
}

/// Runs a protected create with connection-loss recovery.
///
/// `create` performs one attempt against the protected path. `list` returns
/// the parent's children and is consulted after every connection loss.
pub(crate) fn create_with_recovery<C, L>(
    protected: &ProtectedPath,
    mut create: C,
    mut list: L,
) -> Result<String, CoordinationError>
where
    C: FnMut(&str) -> Result<String, CoordinationError>,
    L: FnMut(&str) -> Result<Vec<String>, CoordinationError>,
{
    let mut last_error = CoordinationError::ConnectionLoss {
        operation: "create",
    };

    for _ in 0..PROTECTED_CREATE_ATTEMPTS {
        match create(protected.path()) {
            Err(error @ CoordinationError::ConnectionLoss { .. }) => {
                if let Ok(children) = list(protected.parent())
                    && let Some(found) = protected.find_created(&children)
                {
                    return Ok(found);
                }
                last_error = error;
            }
            result => return result,
        }
    }

    Err(last_error)
}

fn join_child(parent: &str, child: &str) -> String {
    match parent {
        "" => child.to_owned(),
        "/" => format!("/{child}"),
        _ => format!("{parent}/{child}"),
    }
}

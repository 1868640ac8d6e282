//! JSON command dispatch for the HTTP gateway.
//!
//! Each request body is a JSON object naming a command in `cmd` plus the
//! command's arguments:
//!
//! ```json
//! {"cmd":"create","path":"/services/a","data":"hello","ephemeral":true}
//! ```
//!
//! The dispatcher normalises the command name, validates the arguments into
//! a typed command, runs it against the [`Coordination`] session and encodes
//! the result. Node metadata is merged into success bodies under fixed keys:
//!
//! ```json
//! {"path":"/services/a"}
//! {"exist":true,"czxid":4,"mzxid":4,"version":0,"num_children":0,"...":0}
//! ```
//!
//! Failures are rendered as `{"message": "..."}` with a status chosen per
//! command; unknown commands answer 501.
//!
//! [`Coordination`]: crate::coordination::Coordination

mod acl;
mod errors;
mod path;
mod request;
mod response;
mod router;
mod stat;

pub use self::acl::{PERM_ALL, acl_from_json, acl_to_json, default_acl};
pub use self::errors::DispatchError;
pub use self::path::PathResolver;
pub use self::request::{Command, Envelope, MAX_REQUEST_BYTES, normalise_command};
pub use self::response::DispatchResponse;
pub use self::router::{CommandKind, Dispatcher};
pub use self::stat::{STAT_FIELD_COUNT, encode_stat};

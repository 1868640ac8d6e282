//! JSON-over-HTTP gateway to a ZooKeeper ensemble.
//!
//! The daemon holds one coordination session for its whole life and exposes
//! node operations (create, delete, exists, children, data and ACL access) as
//! JSON commands posted to a single endpoint. Paths are resolved against an
//! optional prefix; node metadata is returned alongside every result.
//!
//! Startup loads layered configuration from [`zkhttp_config`], installs
//! structured telemetry and connects the session. Failures at any stage stop
//! the process before traffic is served. Losing the session afterwards shuts
//! the server down with a non-zero exit instead of reconnecting, so a
//! supervisor can restart it with fresh ephemeral state.

mod bootstrap;
pub mod coordination;
pub mod dispatch;
mod health;
mod process;
mod session;
mod telemetry;
pub mod transport;
mod version;

pub use bootstrap::{BootstrapError, ConfigLoader, Daemon, SystemConfigLoader, bootstrap_with};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal, run_daemon,
};
pub use session::{SessionWatcher, WatchOutcome};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use version::{LONG_VERSION, requested_version, write_requested_version};

#[cfg(test)]
mod tests;

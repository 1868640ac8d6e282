//! Test harness utilities shared by the daemon suites.

mod config_loader;
mod lifecycle;
mod memory;
mod reporter;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use lifecycle::{ManualShutdown, MemoryConnector};
pub use memory::{MemoryCoordination, SESSION_ID};
pub use reporter::{HealthEvent, RecordingHealthReporter};

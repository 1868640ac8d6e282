//! Session connectors and shutdown signals for driving the launch sequence.

use std::io;
use std::sync::Arc;

use tokio::sync::Notify;

use zkhttp_config::Config;

use crate::coordination::{CoordinationError, SessionConnector};
use crate::process::{ShutdownError, ShutdownSignal};

use super::memory::MemoryCoordination;

/// Connector handing out a shared in-memory session.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    session: MemoryCoordination,
    reachable: bool,
}

impl MemoryConnector {
    /// Connector that always hands out `session`.
    #[must_use]
    pub fn new(session: MemoryCoordination) -> Self {
        Self {
            session,
            reachable: true,
        }
    }

    /// Connector whose ensemble cannot be reached.
    #[must_use]
    pub fn unreachable(session: MemoryCoordination) -> Self {
        Self {
            session,
            reachable: false,
        }
    }
}

impl SessionConnector for MemoryConnector {
    type Session = MemoryCoordination;

    fn connect(&self, config: &Config) -> Result<Self::Session, CoordinationError> {
        if self.reachable {
            Ok(self.session.clone())
        } else {
            Err(CoordinationError::NotEstablished {
                ensemble: config.ensemble.clone(),
                reason: "no response within 1ms".to_owned(),
            })
        }
    }
}

/// Shutdown signal released by the test.
#[derive(Debug, Clone, Default)]
pub struct ManualShutdown {
    released: Arc<Notify>,
    broken: bool,
}

impl ManualShutdown {
    /// Signal whose handlers cannot be installed.
    #[must_use]
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    /// Releases the waiting daemon.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

impl ShutdownSignal for ManualShutdown {
    async fn wait(&self) -> Result<(), ShutdownError> {
        if self.broken {
            return Err(ShutdownError::Install {
                source: io::Error::other("signal handlers unavailable"),
            });
        }
        self.released.notified().await;
        Ok(())
    }
}

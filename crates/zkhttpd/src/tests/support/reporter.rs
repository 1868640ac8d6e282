//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use zkhttp_config::Config;

use crate::bootstrap::BootstrapError;
use crate::coordination::SessionEvent;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    SessionConnected(String),
    Session(SessionEvent),
    SessionLost,
    Serving { address: SocketAddr, tls: bool },
    Shutdown { session_lost: bool },
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address reported once the server started listening.
    #[must_use]
    pub fn serving_address(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            HealthEvent::Serving { address, .. } => Some(address),
            _ => None,
        })
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn session_connected(&self, ensemble: &str) {
        self.record(HealthEvent::SessionConnected(ensemble.to_owned()));
    }

    fn session_event(&self, event: SessionEvent) {
        self.record(HealthEvent::Session(event));
    }

    fn session_lost(&self) {
        self.record(HealthEvent::SessionLost);
    }

    fn serving(&self, address: SocketAddr, tls: bool) {
        self.record(HealthEvent::Serving { address, tls });
    }

    fn shutdown(&self, session_lost: bool) {
        self.record(HealthEvent::Shutdown { session_lost });
    }
}

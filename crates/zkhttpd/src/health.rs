//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use zkhttp_config::Config;

use crate::bootstrap::BootstrapError;
use crate::coordination::SessionEvent;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the coordination session is open.
    fn session_connected(&self, ensemble: &str);

    /// Invoked for every session state transition.
    fn session_event(&self, event: SessionEvent);

    /// Invoked when the session is lost for good.
    fn session_lost(&self);

    /// Invoked once the HTTP listener is bound.
    fn serving(&self, address: SocketAddr, tls: bool);

    /// Invoked after the server has stopped.
    fn shutdown(&self, session_lost: bool);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn session_connected(&self, ensemble: &str) {
        (**self).session_connected(ensemble);
    }

    fn session_event(&self, event: SessionEvent) {
        (**self).session_event(event);
    }

    fn session_lost(&self) {
        (**self).session_lost();
    }

    fn serving(&self, address: SocketAddr, tls: bool) {
        (**self).serving(address, tls);
    }

    fn shutdown(&self, session_lost: bool) {
        (**self).shutdown(session_lost);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen,
            endpoint = %config.endpoint,
            ensemble = %config.ensemble,
            prefix = %config.prefix(),
            tls = config.tls_files().is_some(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn session_connected(&self, ensemble: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "session_connected",
            ensemble,
            "coordination session opened"
        );
    }

    fn session_event(&self, event: SessionEvent) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "session_event",
            state = %event,
            "coordination session state changed"
        );
    }

    fn session_lost(&self) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "session_lost",
            "coordination session lost; shutting down"
        );
    }

    fn serving(&self, address: SocketAddr, tls: bool) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "serving",
            %address,
            tls,
            "accepting HTTP requests"
        );
    }

    fn shutdown(&self, session_lost: bool) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown",
            session_lost,
            "daemon stopped"
        );
    }
}

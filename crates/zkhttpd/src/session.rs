//! Background watcher that turns session loss into process shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::coordination::{SessionEvent, SessionEvents};
use crate::health::HealthReporter;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// How the watcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The session closed or its event stream ended.
    SessionLost,
    /// Shutdown was requested before the session was lost.
    Cancelled,
}

/// Handle to the single task consuming a session's events.
///
/// The task never reconnects. When the session closes, or its event stream
/// ends, it reports the loss and invokes the shutdown callback once.
#[derive(Debug)]
pub struct SessionWatcher {
    task: JoinHandle<WatchOutcome>,
}

impl SessionWatcher {
    /// Spawns the watcher on the current tokio runtime.
    ///
    /// `on_lost` runs at most once, after the loss has been reported.
    /// Cancelling `shutdown` stops the watcher without calling it.
    #[must_use]
    pub fn spawn<F>(
        events: SessionEvents,
        shutdown: CancellationToken,
        reporter: Arc<dyn HealthReporter>,
        on_lost: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task: tokio::spawn(watch(events, shutdown, reporter, on_lost)),
        }
    }

    /// Waits for the watcher to stop.
    pub async fn join(self) -> WatchOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(
                    target: SESSION_TARGET,
                    error = %join_error,
                    "session watcher task failed"
                );
                WatchOutcome::Cancelled
            }
        }
    }
}

async fn watch<F>(
    mut events: SessionEvents,
    shutdown: CancellationToken,
    reporter: Arc<dyn HealthReporter>,
    on_lost: F,
) -> WatchOutcome
where
    F: FnOnce(),
{
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!(target: SESSION_TARGET, "session watcher stopping");
                return WatchOutcome::Cancelled;
            }
            event = events.recv() => {
                match event {
                    Some(SessionEvent::Closed) => {
                        reporter.session_event(SessionEvent::Closed);
                    }
                    Some(other) => {
                        reporter.session_event(other);
                        continue;
                    }
                    None => {
                        warn!(target: SESSION_TARGET, "session event stream ended");
                    }
                }
                reporter.session_lost();
                on_lost();
                return WatchOutcome::SessionLost;
            }
        }
    }
}

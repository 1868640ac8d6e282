//! Shutdown coordination: the process-wide trigger and OS signal listeners.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::PROCESS_TARGET;

/// Process-wide shutdown request shared by the server, the session watcher
/// and the signal listener.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger {
    token: CancellationToken,
    session_lost: Arc<AtomicBool>,
}

impl ShutdownTrigger {
    /// Creates an unfired trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    pub fn fire(&self) {
        self.token.cancel();
    }

    /// Records that the session was lost, then requests shutdown.
    pub fn fire_session_lost(&self) {
        self.session_lost.store(true, Ordering::SeqCst);
        self.fire();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether shutdown was caused by session loss.
    #[must_use]
    pub fn session_lost(&self) -> bool {
        self.session_lost.load(Ordering::SeqCst)
    }

    /// Cancellation token observing this trigger.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync + 'static {
    /// Resolves when shutdown should proceed.
    fn wait(&self) -> impl Future<Output = Result<(), ShutdownError>> + Send;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    async fn wait(&self) -> Result<(), ShutdownError> {
        let signal = wait_for_signal().await?;
        info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str, ShutdownError> {
    use tokio::signal::unix::{SignalKind, signal};

    let install = |kind| signal(kind).map_err(|source| ShutdownError::Install { source });
    let mut terminate = install(SignalKind::terminate())?;
    let mut interrupt = install(SignalKind::interrupt())?;
    let mut quit = install(SignalKind::quit())?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str, ShutdownError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| ShutdownError::Install { source })?;
    Ok("ctrl_c")
}

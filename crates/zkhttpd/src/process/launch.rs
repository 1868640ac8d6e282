//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use zkhttp_config::Config;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::coordination::{Coordination, ManagedSession, SessionConnector, ZkConnector};
use crate::dispatch::Dispatcher;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::session::SessionWatcher;
use crate::transport::{self, TransportError};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, C, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) connector: C,
    pub(crate) shutdown: S,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when startup fails, when serving fails, or when the
/// coordination session is lost.
pub async fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        connector: ZkConnector,
        shutdown: SystemShutdownSignal,
    };
    run_daemon_with(plan).await
}

/// Runs the daemon with injected collaborators.
pub(crate) async fn run_daemon_with<L, C, S>(plan: LaunchPlan<L, C, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    C: SessionConnector,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter: bootstrap_reporter,
        connector,
        shutdown,
    } = plan;

    let daemon = bootstrap_with(&loader, bootstrap_reporter)?;
    let config = daemon.config();
    let reporter = daemon.reporter();

    let session = Arc::new(connect(connector, config).await?);
    let Some(events) = session.take_events() else {
        close_session(session).await;
        return Err(LaunchError::EventsUnavailable);
    };
    reporter.session_connected(&config.ensemble);

    let trigger = ShutdownTrigger::new();
    let on_lost = trigger.clone();
    let watcher = SessionWatcher::spawn(events, trigger.token(), Arc::clone(&reporter), move || {
        on_lost.fire_session_lost();
    });

    let coordination: Arc<dyn Coordination> = session.clone();
    let dispatcher = Arc::new(Dispatcher::new(coordination, config.prefix()));
    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let (served, signalled) =
        serve_until_signal(config, dispatcher, &trigger, reporter.as_ref(), &shutdown).await;

    trigger.fire();
    let outcome = watcher.join().await;
    debug!(target: PROCESS_TARGET, ?outcome, "session watcher stopped");
    close_session(session).await;

    let session_lost = trigger.session_lost();
    reporter.shutdown(session_lost);
    info!(target: PROCESS_TARGET, "shutdown sequence completed");

    served?;
    signalled?;
    if session_lost {
        return Err(LaunchError::SessionLost);
    }
    Ok(())
}

/// Serves until the trigger fires, racing the server against `shutdown`.
///
/// When the signal resolves first, successfully or not, the trigger fires and
/// the server is drained before returning.
async fn serve_until_signal<S>(
    config: &Config,
    dispatcher: Arc<Dispatcher>,
    trigger: &ShutdownTrigger,
    reporter: &dyn HealthReporter,
    shutdown: &S,
) -> (Result<(), TransportError>, Result<(), ShutdownError>)
where
    S: ShutdownSignal,
{
    let server = transport::serve(config, dispatcher, trigger, reporter);
    tokio::pin!(server);
    tokio::select! {
        served = &mut server => (served, Ok(())),
        signalled = shutdown.wait() => {
            if let Err(error) = &signalled {
                error!(target: PROCESS_TARGET, %error, "shutdown signal listener failed");
            }
            trigger.fire();
            ((&mut server).await, signalled)
        }
    }
}

/// Opens the session on the blocking pool, since connecting waits for the
/// ensemble to grant it.
async fn connect<C>(connector: C, config: &Config) -> Result<C::Session, LaunchError>
where
    C: SessionConnector,
{
    let owned = config.clone();
    tokio::task::spawn_blocking(move || connector.connect(&owned))
        .await
        .map_err(|source| LaunchError::ConnectAborted { source })?
        .map_err(|source| LaunchError::Connect { source })
}

async fn close_session<T>(session: Arc<T>)
where
    T: ManagedSession + 'static,
{
    if let Err(join_error) = tokio::task::spawn_blocking(move || session.close()).await {
        warn!(target: PROCESS_TARGET, error = %join_error, "closing the session failed");
    }
}

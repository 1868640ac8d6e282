//! HTTP surface of the gateway.
//!
//! The command endpoint accepts a JSON envelope per request and hands it to
//! the [`Dispatcher`] on a blocking thread. The server runs on plain TCP, or
//! behind [`TlsListener`] when certificate and key files are configured, until
//! the shutdown trigger fires.

mod errors;
mod tls;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use zkhttp_config::Config;

use crate::dispatch::{DispatchError, DispatchResponse, Dispatcher, MAX_REQUEST_BYTES};
use crate::health::HealthReporter;
use crate::process::ShutdownTrigger;

pub use self::errors::{TlsError, TransportError};
pub use self::tls::{TlsListener, load_server_config};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Builds the HTTP router serving `endpoint` with `dispatcher`.
///
/// The liveness probe is mounted at [`HEALTH_PATH`] unless the command
/// endpoint already occupies it.
#[must_use]
pub fn router(dispatcher: Arc<Dispatcher>, endpoint: &str) -> Router {
    let mut router = Router::new().route(endpoint, post(handle_command));
    if endpoint != HEALTH_PATH {
        router = router.route(HEALTH_PATH, get(health));
    }
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

async fn handle_command(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let payload = match body {
        Ok(bytes) => bytes,
        Err(rejection) => {
            debug!(
                target: TRANSPORT_TARGET,
                status = %rejection.status(),
                "request body rejected"
            );
            let error = DispatchError::unreadable_body(rejection.body_text());
            return DispatchResponse::from_error(&error).into_response();
        }
    };

    match tokio::task::spawn_blocking(move || dispatcher.dispatch(&payload)).await {
        Ok(response) => response.into_response(),
        Err(join_error) => {
            error!(
                target: TRANSPORT_TARGET,
                error = %join_error,
                "dispatch task failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "request handling failed" })),
            )
                .into_response()
        }
    }
}

#[expect(clippy::unused_async, reason = "axum handlers are async functions")]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serves `dispatcher` on the configured listen address until `shutdown`
/// fires, then drains in-flight requests.
///
/// # Errors
///
/// Returns [`TransportError`] when TLS material cannot be loaded, the address
/// cannot be bound, or the server fails.
pub async fn serve(
    config: &Config,
    dispatcher: Arc<Dispatcher>,
    shutdown: &ShutdownTrigger,
    reporter: &dyn HealthReporter,
) -> Result<(), TransportError> {
    let address = config
        .listen_address()
        .map_err(|source| TransportError::Address { source })?;
    let tls_config = config
        .tls_files()
        .map(|(cert, key)| load_server_config(cert, key))
        .transpose()?;

    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| TransportError::Bind { address, source })?;
    let local = listener
        .local_addr()
        .map_err(|source| TransportError::Bind { address, source })?;
    let app = router(dispatcher, &config.endpoint);
    let stopped = shutdown.token().cancelled_owned();

    let served = match tls_config {
        Some(server_config) => {
            let tls_listener = TlsListener::new(listener, server_config)
                .map_err(|source| TransportError::Bind { address, source })?;
            reporter.serving(local, true);
            axum::serve(tls_listener, app)
                .with_graceful_shutdown(stopped)
                .await
        }
        None => {
            reporter.serving(local, false);
            axum::serve(listener, app)
                .with_graceful_shutdown(stopped)
                .await
        }
    };
    served.map_err(|source| TransportError::Serve { source })
}

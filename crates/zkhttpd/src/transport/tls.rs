//! TLS termination for the HTTP listener.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, warn};

use super::TRANSPORT_TARGET;
use super::errors::TlsError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
const HANDSHAKE_BACKLOG: usize = 64;
const MAX_PENDING_HANDSHAKES: usize = 128;

/// Builds a server configuration from PEM-encoded certificate and key files.
///
/// # Errors
///
/// Returns [`TlsError`] when either file cannot be read or parsed, or when
/// the key does not match the certificate.
pub fn load_server_config(cert: &Utf8Path, key: &Utf8Path) -> Result<Arc<ServerConfig>, TlsError> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!(target: TRANSPORT_TARGET, "crypto provider already installed");
    }

    let cert_pem = std::fs::read(cert).map_err(|source| TlsError::read(cert, source))?;
    let chain = CertificateDer::pem_slice_iter(&cert_pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| TlsError::certificate(cert, error.to_string()))?;
    if chain.is_empty() {
        return Err(TlsError::certificate(cert, "no certificates found"));
    }

    let key_pem = std::fs::read(key).map_err(|source| TlsError::read(key, source))?;
    let private_key = PrivateKeyDer::from_pem_slice(&key_pem)
        .map_err(|error| TlsError::private_key(key, error.to_string()))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, private_key)
        .map_err(|source| TlsError::Config { source })?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// Listener yielding connections that have completed a TLS handshake.
///
/// Handshakes run on their own tasks so a slow client cannot hold up the
/// accept loop. At most 128 handshakes are in flight; further connections
/// wait in the kernel backlog until one finishes.
pub struct TlsListener {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    accept_task: JoinHandle<()>,
}

impl TlsListener {
    /// Starts accepting on `listener` with `config`.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised when the listener's address is unavailable.
    pub fn new(listener: TcpListener, config: Arc<ServerConfig>) -> io::Result<Self> {
        Self::with_handshake_limit(listener, config, MAX_PENDING_HANDSHAKES)
    }

    fn with_handshake_limit(
        listener: TcpListener,
        config: Arc<ServerConfig>,
        limit: usize,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (sender, incoming) = mpsc::channel(HANDSHAKE_BACKLOG);
        let handshakes = Arc::new(Semaphore::new(limit));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            TlsAcceptor::from(config),
            handshakes,
            sender,
        ));
        Ok(Self {
            local_addr,
            incoming,
            accept_task,
        })
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    fn accept(&mut self) -> impl Future<Output = (Self::Io, Self::Addr)> + Send {
        let incoming = &mut self.incoming;
        async move {
            match incoming.recv().await {
                Some(connection) => connection,
                None => std::future::pending().await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    handshakes: Arc<Semaphore>,
    sender: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    while !sender.is_closed() {
        let Ok(permit) = Arc::clone(&handshakes).acquire_owned().await else {
            return;
        };
        let (stream, peer) = match listener.accept().await {
            Ok(connection) => connection,
            Err(error) => {
                warn!(target: TRANSPORT_TARGET, %error, "failed to accept connection");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        let handshake = acceptor.accept(stream);
        let ready = sender.clone();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await;
            drop(permit);
            match outcome {
                Ok(Ok(tls)) => {
                    if ready.send((tls, peer)).await.is_err() {
                        debug!(target: TRANSPORT_TARGET, %peer, "listener closed before connection was served");
                    }
                }
                Ok(Err(error)) => {
                    debug!(target: TRANSPORT_TARGET, %peer, %error, "TLS handshake failed");
                }
                Err(_elapsed) => {
                    debug!(target: TRANSPORT_TARGET, %peer, "TLS handshake timed out");
                }
            }
        });
    }
}

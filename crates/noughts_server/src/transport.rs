//! TCP transport: accepts connections and pumps frames in and out of the
//! registry.

use crate::codec::{self, CodecError};
use crate::config::ServerConfig;
use crate::outbox::Outbox;
use crate::protocol::ConnectionId;
use crate::registry::Registry;
use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

/// How long a closing connection may spend flushing queued responses.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The match server bound to its registry and configuration.
#[derive(Debug, Clone)]
pub struct GameServer {
    registry: Registry,
    config: ServerConfig,
}

impl GameServer {
    /// Creates a server with a fresh registry.
    #[instrument(skip(config))]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Registry::new())
    }

    /// Creates a server around an existing registry.
    pub fn with_registry(config: ServerConfig, registry: Registry) -> Self {
        Self { registry, config }
    }

    /// Shared registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!(addr = %listener.local_addr()?, "Server listening");

        self.serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
        })
        .await
    }

    /// Accepts connections on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Fails if the listener stops accepting.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let next_id = AtomicU64::new(1);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.context("Failed to accept connection")?;
                    let id = ConnectionId::new(next_id.fetch_add(1, Ordering::Relaxed));
                    let registry = self.registry.clone();
                    let max_frame_len = *self.config.max_frame_len();
                    tokio::spawn(handle_connection(stream, peer, id, registry, max_frame_len));
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }
}

/// Services one connection until it closes, then tells the registry.
#[instrument(skip(stream, registry, max_frame_len), fields(connection = %id))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    registry: Registry,
    max_frame_len: usize,
) {
    info!("Connection accepted");
    if let Err(err) = stream.set_nodelay(true) {
        debug!(error = %err, "Could not disable Nagle");
    }
    let (read_half, mut write_half) = stream.into_split();
    let (outbox, mut outgoing) = Outbox::channel(id);
    registry.connect(outbox);

    let mut writer = tokio::spawn(async move {
        while let Some(response) = outgoing.recv().await {
            if let Err(err) = codec::write_frame(&mut write_half, &response).await {
                warn!(error = %err, "Write failed, dropping connection output");
                break;
            }
        }
    });

    let mut reader = BufReader::new(read_half);
    loop {
        match codec::read_frame(&mut reader, max_frame_len).await {
            Ok(Some(body)) => match codec::decode_request(&body) {
                Ok(request) => registry.handle(id, request),
                Err(err) => registry.reject(id, &err),
            },
            Ok(None) => {
                debug!("Peer closed connection");
                break;
            }
            Err(CodecError::FrameTooLarge { len, max }) => {
                warn!(len, max, "Oversized frame, closing connection");
                break;
            }
            Err(err) => {
                warn!(error = %err, "Read failed, closing connection");
                break;
            }
        }
    }

    // Dropping the session releases the last outbox sender, so the writer
    // stops once the queue is empty.
    registry.disconnect(id);
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await {
        Ok(Ok(())) => debug!("Queued responses flushed"),
        Ok(Err(err)) => warn!(error = %err, "Writer task failed"),
        Err(_) => {
            warn!("Timed out flushing queued responses");
            writer.abort();
        }
    }
    info!("Connection closed");
}

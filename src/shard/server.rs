//! Shard Server Runtime
//!
//! Binds the listener, registers with the directory, then serves one task per
//! accepted connection. A separate task sweeps expired leases.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::handlers::dispatch;
use super::store::ShardStore;
use super::types::ClientId;
use crate::config::ShardConfig;
use crate::error::DfsError;
use crate::protocol::{Command, Connection};

pub struct ShardServer {
    listener: TcpListener,
    store: Arc<ShardStore>,
    config: ShardConfig,
}

impl ShardServer {
    pub async fn bind(config: ShardConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind)
            .await
            .with_context(|| format!("binding shard listener on {}", config.bind))?;
        let store = Arc::new(ShardStore::new(config.lock_timeout()));

        Ok(Self {
            listener,
            store,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> Arc<ShardStore> {
        self.store.clone()
    }

    /// Announces this shard to the directory and waits for `OK`.
    pub async fn register(&self) -> Result<()> {
        let addr = self.local_addr()?;
        let host = self
            .config
            .advertise_host
            .clone()
            .unwrap_or_else(|| addr.ip().to_string());

        let mut conn =
            Connection::connect_with_retry(&self.config.directory, self.config.register_attempts)
                .await
                .with_context(|| format!("connecting to directory {}", self.config.directory))?;

        conn.call(&Command::Register {
            host: host.clone(),
            port: addr.port(),
            base_prefix: self.config.base_prefix.clone(),
        })
        .await
        .with_context(|| format!("registering with directory {}", self.config.directory))?;

        tracing::info!(
            "Registered {}:{} (base {}) with directory {}",
            host,
            addr.port(),
            self.config.base_prefix,
            self.config.directory
        );
        Ok(())
    }

    /// Starts the lease sweep and serves clients until the listener fails.
    pub async fn run(self) -> Result<()> {
        // Stops the sweep when the accept loop fails or this future is dropped.
        let _reaper = AbortOnDrop(spawn_lease_reaper(
            self.store.clone(),
            self.config.sweep_interval(),
        ));

        tracing::info!(
            "Shard listening on {} (lock timeout {:?})",
            self.local_addr()?,
            self.store.lock_timeout()
        );

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let store = self.store.clone();
            tokio::spawn(async move {
                serve_connection(store, stream, peer).await;
            });
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Periodically force-clears locks whose lease has run out.
pub fn spawn_lease_reaper(store: Arc<ShardStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            for path in store.reclaim_expired(Instant::now()) {
                tracing::warn!("Lease expired on {}, lock reclaimed", path);
            }
        }
    })
}

async fn serve_connection(store: Arc<ShardStore>, stream: TcpStream, peer: SocketAddr) {
    let client = ClientId::new();
    tracing::info!("Client {} connected from {}", client, peer);

    let mut conn = match Connection::new(stream) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Failed to set up connection from {}: {}", peer, e);
            return;
        }
    };

    if let Err(e) = handle_requests(&store, &client, &mut conn).await {
        tracing::warn!("Connection to {} ({}) lost: {}", client, peer, e);
    }

    let released = store.release_all(&client);
    if !released.is_empty() {
        tracing::info!("Released {} lock(s) held by {}: {:?}", released.len(), client, released);
    }
    tracing::info!("Client {} disconnected", client);
}

async fn handle_requests(
    store: &ShardStore,
    client: &ClientId,
    conn: &mut Connection,
) -> crate::Result<()> {
    loop {
        let (header, body) = match conn.read_request().await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(DfsError::LineTooLong) => {
                tracing::warn!("[Shard] Discarded oversized line from {}", client);
                conn.send_lines([DfsError::LineTooLong.reply_line()]).await?;
                continue;
            }
            Err(e) => return Err(e),
        };
        tracing::debug!("[Shard] {} -> {}", client, header);

        let reply = match Command::parse(&header, body.as_deref()) {
            Ok(command) => dispatch(store, client, command),
            Err(e) => vec![e.reply_line()],
        };
        conn.send_lines(reply).await?;
    }
}

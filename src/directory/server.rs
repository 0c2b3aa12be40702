use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use super::handlers::dispatch;
use super::registry::ShardRegistry;
use crate::config::DirectoryConfig;
use crate::error::DfsError;
use crate::protocol::{Command, Connection};

pub struct DirectoryServer {
    listener: TcpListener,
    registry: Arc<ShardRegistry>,
}

impl DirectoryServer {
    pub async fn bind(config: DirectoryConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind)
            .await
            .with_context(|| format!("binding directory listener on {}", config.bind))?;

        Ok(Self {
            listener,
            registry: Arc::new(ShardRegistry::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<ShardRegistry> {
        self.registry.clone()
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("Directory listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let registry = self.registry.clone();
            tokio::spawn(async move {
                serve_connection(registry, stream, peer).await;
            });
        }
    }
}

async fn serve_connection(registry: Arc<ShardRegistry>, stream: TcpStream, peer: SocketAddr) {
    let mut conn = match Connection::new(stream) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Failed to set up connection from {}: {}", peer, e);
            return;
        }
    };

    if let Err(e) = handle_requests(&registry, &mut conn).await {
        tracing::warn!("[Directory] IO error with {}: {}", peer, e);
    }
    tracing::debug!("[Directory] {} disconnected", peer);
}

async fn handle_requests(registry: &ShardRegistry, conn: &mut Connection) -> crate::Result<()> {
    loop {
        let (header, body) = match conn.read_request().await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(DfsError::LineTooLong) => {
                tracing::warn!("[Directory] Discarded oversized line from {}", conn.peer());
                conn.send_lines([DfsError::LineTooLong.reply_line()]).await?;
                continue;
            }
            Err(e) => return Err(e),
        };
        tracing::debug!("[Directory] Received from {}: {}", conn.peer(), header);

        let reply = match Command::parse(&header, body.as_deref()) {
            Ok(command) => dispatch(registry, command).await,
            Err(e) => vec![e.reply_line()],
        };
        conn.send_lines(reply).await?;
    }
}

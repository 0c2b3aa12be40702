//! Lease Renewal
//!
//! Keeps the shard-side lock of an open file alive by sending KEEP_ALIVE on a
//! fixed period. Cancellation is only observed between requests, so a renewal
//! never leaves a half-read reply on the shared connection.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::protocol::{Command, Connection};

pub struct LeaseRenewal {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LeaseRenewal {
    pub fn spawn(shard: Arc<Mutex<Connection>>, path: String, every: Duration) -> Self {
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(every) => {}
                }

                let result = {
                    let mut conn = shard.lock().await;
                    conn.call(&Command::KeepAlive { path: path.clone() }).await
                };

                match result {
                    Ok(_) => tracing::trace!("Renewed lease for {}", path),
                    Err(e) => {
                        tracing::warn!("Lease renewal for {} stopped: {}", path, e);
                        break;
                    }
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Stops renewing and waits for an in-flight KEEP_ALIVE to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for LeaseRenewal {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

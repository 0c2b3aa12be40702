//! File System Client
//!
//! Opens files through the directory, keeps their content in a bounded LRU
//! cache and writes changes back to the owning shard on close.
//!
//! ## Lifecycle of an open file
//! 1. **Open**: the directory resolves the shard, the shard grants a lock and
//!    returns `(version, content)`, which replaces the cache entry.
//! 2. **Read / Write**: served from the cache; writes mark the entry dirty.
//! 3. **Close**: a dirty entry is sent as `UPDATE` at its cached version, then
//!    `CLOSE` always releases the lock.
//!
//! Only one file is open at a time. Connections to shards are kept per port
//! and shared with the lease renewal task.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::cache::LruCache;
use super::renewal::LeaseRenewal;
use super::types::{CacheEntry, CloseOutcome};
use crate::config::ClientConfig;
use crate::error::{DfsError, Result};
use crate::protocol::{
    AccessMode, Command, Connection, MAX_LINE_LENGTH, escape_content, unescape_content,
};

type SharedConnection = Arc<Mutex<Connection>>;

struct OpenFile {
    path: String,
    mode: AccessMode,
    port: u16,
    shard: SharedConnection,
    renewal: Option<LeaseRenewal>,
}

pub struct DfsClient {
    directory_addr: String,
    /// Dropped on connection errors and re-dialled on next use.
    directory: Option<Connection>,
    /// Shards are reached on the directory's host.
    shard_host: IpAddr,
    shards: HashMap<u16, SharedConnection>,
    cache: LruCache<String, CacheEntry>,
    current: Option<OpenFile>,
    keep_alive_interval: Option<Duration>,
}

impl DfsClient {
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let directory = Connection::connect(config.directory.as_str()).await?;
        let shard_host = directory.peer().ip();
        tracing::info!("Connected to directory {}", directory.peer());

        Ok(Self {
            directory_addr: config.directory.clone(),
            directory: Some(directory),
            shard_host,
            shards: HashMap::new(),
            cache: LruCache::new(config.cache_capacity),
            current: None,
            keep_alive_interval: config.keep_alive_interval(),
        })
    }

    /// Opens `path` and caches its content.
    ///
    /// `mode` is a user token (`r`, `write`, `READ_ONLY`, …). On failure the
    /// cache is left as it was.
    pub async fn open(&mut self, path: &str, mode: &str) -> Result<CacheEntry> {
        if let Some(open) = &self.current {
            return Err(DfsError::protocol(format!(
                "{} is already open, close it first",
                open.path
            )));
        }
        let mode = AccessMode::from_token(mode);
        let request = Command::Open {
            path: path.to_string(),
            mode,
        };

        let routed = self.directory().await?.call(&request).await;
        let routed = match routed {
            Ok(routed) => routed,
            Err(e) => {
                self.forget_directory_on(&e);
                return Err(e);
            }
        };
        let port: u16 = routed
            .parse()
            .map_err(|_| DfsError::protocol(format!("malformed routing reply: {}", routed)))?;

        let shard = self.shard_connection(port).await?;
        let fetched = {
            let mut conn = shard.lock().await;
            fetch(&mut conn, &request).await
        };
        let (version, content) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.forget_shard_on(&e, port);
                return Err(e);
            }
        };

        let entry = CacheEntry::clean(content, version);
        if let Some((evicted, old)) = self.cache.put(path.to_string(), entry.clone()) {
            if old.dirty {
                tracing::warn!("Evicted {} with unsaved changes (v{})", evicted, old.version);
            } else {
                tracing::debug!("Evicted {} from cache", evicted);
            }
        }

        let renewal = self
            .keep_alive_interval
            .map(|every| LeaseRenewal::spawn(shard.clone(), path.to_string(), every));

        tracing::info!("Opened {} [{}] at v{}", path, mode, version);
        self.current = Some(OpenFile {
            path: path.to_string(),
            mode,
            port,
            shard,
            renewal,
        });

        Ok(entry)
    }

    /// Cached content of the open file.
    pub fn read(&mut self) -> Result<String> {
        let open = self.current.as_ref().ok_or(DfsError::NoOpenFile)?;
        if !open.mode.can_read() {
            return Err(DfsError::WriteOnly {
                path: open.path.clone(),
            });
        }
        self.cache
            .get(&open.path)
            .map(|entry| entry.content.clone())
            .ok_or_else(|| missing_entry(&open.path))
    }

    /// Replaces the cached content of the open file and marks it dirty.
    pub fn write(&mut self, content: &str) -> Result<()> {
        let open = self.current.as_ref().ok_or(DfsError::NoOpenFile)?;
        if !open.mode.can_write() {
            return Err(DfsError::ReadOnly {
                path: open.path.clone(),
            });
        }
        // The UPDATE body must fit on one protocol line once escaped.
        let escaped_len = escape_content(content).len();
        if escaped_len > MAX_LINE_LENGTH {
            return Err(DfsError::protocol(format!(
                "content too large: {} bytes on the wire, limit is {}",
                escaped_len, MAX_LINE_LENGTH
            )));
        }
        let entry = self
            .cache
            .get_mut(&open.path)
            .ok_or_else(|| missing_entry(&open.path))?;
        entry.content = content.to_string();
        entry.dirty = true;
        Ok(())
    }

    /// Writes back local changes and releases the lock.
    ///
    /// A stale version surfaces as `VersionConflict` and the entry stays
    /// dirty. The lock is released and the file closed either way.
    pub async fn close(&mut self) -> Result<CloseOutcome> {
        let open = self.current.take().ok_or(DfsError::NoOpenFile)?;
        if let Some(renewal) = open.renewal {
            renewal.stop().await;
        }

        let pending = self
            .cache
            .peek(&open.path)
            .filter(|entry| entry.dirty)
            .map(|entry| (entry.version, entry.content.clone()));

        let mut conn = open.shard.lock().await;

        let outcome = match pending {
            Some((version, content)) => {
                let update = Command::Update {
                    path: open.path.clone(),
                    version,
                    content,
                };
                match conn.call(&update).await.and_then(|reply| parse_version(&reply)) {
                    Ok(new_version) => {
                        if let Some(entry) = self.cache.peek_mut(&open.path) {
                            entry.version = new_version;
                            entry.dirty = false;
                        }
                        tracing::info!("Saved {} as v{}", open.path, new_version);
                        Ok(CloseOutcome::Committed {
                            version: new_version,
                        })
                    }
                    Err(e) => {
                        tracing::warn!("Write-back of {} failed: {}", open.path, e);
                        Err(e)
                    }
                }
            }
            None => Ok(CloseOutcome::Clean),
        };

        let released = conn
            .call(&Command::Close {
                path: open.path.clone(),
            })
            .await;
        drop(conn);

        if let Err(e) = &released {
            tracing::warn!("CLOSE of {} failed: {}", open.path, e);
            self.forget_shard_on(e, open.port);
        }
        if let Err(e) = &outcome {
            self.forget_shard_on(e, open.port);
        }

        let outcome = outcome?;
        released?;
        tracing::info!("Closed {}", open.path);
        Ok(outcome)
    }

    /// Renews the lease on the open file.
    pub async fn keep_alive(&mut self) -> Result<()> {
        let open = self.current.as_ref().ok_or(DfsError::NoOpenFile)?;
        let mut conn = open.shard.lock().await;
        conn.call(&Command::KeepAlive {
            path: open.path.clone(),
        })
        .await?;
        Ok(())
    }

    /// Cluster-wide listing as assembled by the directory.
    pub async fn list(&mut self) -> Result<Vec<String>> {
        let listing = self.directory().await?.fetch_listing().await;
        if let Err(e) = &listing {
            self.forget_directory_on(e);
        }
        listing
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current.as_ref().map(|open| open.path.as_str())
    }

    /// Cached entry for `path`, without touching recency.
    pub fn cached(&self, path: &str) -> Option<&CacheEntry> {
        self.cache.peek(path)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    async fn shard_connection(&mut self, port: u16) -> Result<SharedConnection> {
        if let Some(conn) = self.shards.get(&port) {
            return Ok(conn.clone());
        }
        let conn = Connection::connect((self.shard_host, port)).await?;
        tracing::debug!("Connected to shard {}", conn.peer());
        let conn = Arc::new(Mutex::new(conn));
        self.shards.insert(port, conn.clone());
        Ok(conn)
    }

    async fn directory(&mut self) -> Result<&mut Connection> {
        if self.directory.is_none() {
            let conn = Connection::connect(self.directory_addr.as_str()).await?;
            tracing::info!("Reconnected to directory {}", conn.peer());
            self.directory = Some(conn);
        }
        let addr = &self.directory_addr;
        self.directory
            .as_mut()
            .ok_or_else(|| DfsError::Connection(format!("no directory at {}", addr)))
    }

    fn forget_directory_on(&mut self, error: &DfsError) {
        if error.is_connection() {
            self.directory = None;
        }
    }

    fn forget_shard_on(&mut self, error: &DfsError, port: u16) {
        if error.is_connection() {
            self.shards.remove(&port);
        }
    }
}

async fn fetch(conn: &mut Connection, request: &Command) -> Result<(u64, String)> {
    let status = conn.call(request).await?;
    let version = parse_version(&status)?;
    let content = unescape_content(&conn.expect_line().await?);
    Ok((version, content))
}

fn parse_version(reply: &str) -> Result<u64> {
    reply
        .parse()
        .map_err(|_| DfsError::protocol(format!("malformed version in reply: {}", reply)))
}

fn missing_entry(path: &str) -> DfsError {
    DfsError::protocol(format!("no cached copy of {}", path))
}

//! Runtime configuration for the three roles.
//!
//! Each struct deserializes from JSON with every field optional; missing
//! fields take the defaults below. The binary loads an optional file first and
//! then applies command-line overrides.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DIRECTORY_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_CACHE_CAPACITY: usize = 3;
pub const DEFAULT_REGISTER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub bind: SocketAddr,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Listening address; port 0 picks a free port.
    pub bind: SocketAddr,
    /// Host name announced to the directory. Defaults to the bind IP.
    pub advertise_host: Option<String>,
    pub directory: String,
    pub base_prefix: String,
    pub lock_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub register_attempts: usize,
}

impl ShardConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            advertise_host: None,
            directory: DEFAULT_DIRECTORY_ADDR.to_string(),
            base_prefix: "./".to_string(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            register_attempts: DEFAULT_REGISTER_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub directory: String,
    pub cache_capacity: usize,
    /// Background KEEP_ALIVE period while a file is open. `None` disables it.
    pub keep_alive_interval_ms: Option<u64>,
}

impl ClientConfig {
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        self.keep_alive_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory: DEFAULT_DIRECTORY_ADDR.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            keep_alive_interval_ms: Some(DEFAULT_LOCK_TIMEOUT_MS / 3),
        }
    }
}

/// Loads a JSON config file, or the defaults when no path is given.
pub fn load<T>(path: Option<&Path>) -> anyhow::Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

//! Shard State
//!
//! Holds every file of one shard together with its lock. Each file lives in a
//! single `DashMap` entry, so a request handler and the lease sweep always see
//! the record and the lock of a file change together. Different files sit in
//! different entries and proceed in parallel.
//!
//! ## Lock rules
//! - READ is granted unless a writer exists.
//! - WRITE and RW are granted only when there is no holder at all.
//! - Acquisition never waits; a refused caller retries on its own.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::types::*;
use crate::error::{DfsError, Result};
use crate::protocol::AccessMode;

/// A file and the lock guarding it.
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    pub record: FileRecord,
    pub lock: LockState,
}

pub struct ShardStore {
    files: DashMap<String, FileEntry>,
    lock_timeout: Duration,
}

impl ShardStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            files: DashMap::new(),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Takes a lock on `path` (creating the file if unknown) and returns the
    /// current `(version, content)`.
    pub fn open(&self, path: &str, mode: AccessMode, client: &ClientId) -> Result<(u64, String)> {
        let mut entry = self.files.entry(path.to_string()).or_default();
        let FileEntry { record, lock } = &mut *entry;

        match mode {
            AccessMode::Read => {
                if lock.writer.is_some() {
                    return Err(DfsError::LockConflict);
                }
                lock.readers.insert(client.clone());
            }
            AccessMode::Write | AccessMode::ReadWrite => {
                if lock.is_held() {
                    return Err(DfsError::LockConflict);
                }
                lock.writer = Some(client.clone());
            }
        }

        lock.touch();
        record.last_accessed = now_ms();
        tracing::debug!("{} opened {} as {} (v{})", client, path, mode, record.version);

        Ok((record.version, record.content.clone()))
    }

    /// Optimistic write: accepted only when `client_version` matches.
    pub fn update(&self, path: &str, client_version: u64, content: String) -> Result<u64> {
        let mut entry = self.files.entry(path.to_string()).or_default();
        let FileEntry { record, lock } = &mut *entry;
        lock.touch();

        if client_version != record.version {
            tracing::info!(
                "Rejected UPDATE of {} at v{} (current v{})",
                path,
                client_version,
                record.version
            );
            return Err(DfsError::VersionConflict {
                current: record.version,
            });
        }

        let now = now_ms();
        record.content = content;
        record.version += 1;
        record.last_saved = Some(now);
        record.last_accessed = now;
        tracing::info!("Updated {} to v{}", path, record.version);

        Ok(record.version)
    }

    /// Releases whatever `client` holds on `path`. Always succeeds.
    pub fn close(&self, path: &str, client: &ClientId) {
        if let Some(mut entry) = self.files.get_mut(path) {
            let lock = &mut entry.lock;
            lock.readers.remove(client);
            if lock.writer.as_ref() == Some(client) {
                lock.writer = None;
            }
            lock.touch();
        }
    }

    /// Renews the lease on `path` if anyone currently holds its lock.
    pub fn keep_alive(&self, path: &str, client: &ClientId) -> Result<()> {
        match self.files.get_mut(path) {
            Some(mut entry) if entry.lock.is_held() => {
                entry.lock.touch();
                Ok(())
            }
            _ => Err(DfsError::protocol(format!(
                "No lock found for KEEP_ALIVE from {}",
                client
            ))),
        }
    }

    /// Every known file, sorted by name.
    pub fn list(&self) -> Vec<FileListing> {
        let mut listing: Vec<FileListing> = self
            .files
            .iter()
            .map(|entry| FileListing {
                name: entry.key().clone(),
                last_saved: entry.record.last_saved,
                last_accessed: entry.record.last_accessed,
                status: entry.lock.status(),
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        listing
    }

    /// Drops every reader membership and writer ownership of `client`.
    /// Returns the paths that were touched.
    pub fn release_all(&self, client: &ClientId) -> Vec<String> {
        let mut released = Vec::new();
        for mut entry in self.files.iter_mut() {
            let lock = &mut entry.value_mut().lock;
            let was_reader = lock.readers.remove(client);
            let was_writer = lock.writer.as_ref() == Some(client);
            if was_writer {
                lock.writer = None;
            }
            if was_reader || was_writer {
                released.push(entry.key().clone());
            }
        }
        released
    }

    /// Force-clears every held lock idle for longer than the timeout.
    /// Returns the reclaimed paths.
    pub fn reclaim_expired(&self, now: Instant) -> Vec<String> {
        let mut reclaimed = Vec::new();
        for mut entry in self.files.iter_mut() {
            let lock = &mut entry.value_mut().lock;
            if !lock.is_held() {
                continue;
            }
            if now.saturating_duration_since(lock.last_active) > self.lock_timeout {
                lock.clear();
                reclaimed.push(entry.key().clone());
            }
        }
        reclaimed
    }

    pub fn get(&self, path: &str) -> Option<FileEntry> {
        self.files.get(path).map(|entry| entry.value().clone())
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

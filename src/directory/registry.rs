//! Shard Registry
//!
//! Maps path prefixes to shard servers.
//!
//! Prefixes are handed out as `base + "A"`, `base + "B"`, … `base + "Z"`,
//! then `base + "AA"`, `base + "AB"`, … Each candidate is claimed through the
//! map's entry API, so two shards registering at once never get the same one.
//!
//! Routing picks the longest registered prefix of the requested path.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::types::ShardRegistration;
use crate::error::{DfsError, Result};

#[derive(Default)]
pub struct ShardRegistry {
    shards: DashMap<String, ShardRegistration>,
}

impl ShardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the first free prefix under `base_prefix` and records the shard.
    pub fn register(&self, host: &str, port: u16, base_prefix: &str) -> ShardRegistration {
        let mut index = 0usize;
        loop {
            let candidate = format!("{}{}", base_prefix, prefix_suffix(index));
            if let Entry::Vacant(slot) = self.shards.entry(candidate.clone()) {
                let registration = ShardRegistration {
                    host: host.to_string(),
                    port,
                    assigned_prefix: candidate,
                };
                slot.insert(registration.clone());
                tracing::info!("[Directory] REGISTER {}", registration);
                return registration;
            }
            index += 1;
        }
    }

    /// Shard responsible for `path`: the longest registered prefix of it.
    pub fn route(&self, path: &str) -> Result<ShardRegistration> {
        self.shards
            .iter()
            .filter(|entry| path.starts_with(entry.key().as_str()))
            .max_by_key(|entry| entry.key().len())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DfsError::Routing {
                path: path.to_string(),
            })
    }

    /// All registrations ordered by prefix.
    pub fn registrations(&self) -> Vec<ShardRegistration> {
        let mut all: Vec<ShardRegistration> = self
            .shards
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.assigned_prefix.cmp(&b.assigned_prefix));
        all
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// Bijective base-26 label: 0 -> "A", 25 -> "Z", 26 -> "AA", 27 -> "AB".
pub fn prefix_suffix(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

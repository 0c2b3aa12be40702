//! Client Module
//!
//! Client side of the file system: a bounded LRU cache of opened files with
//! dirty tracking and write-back on close.
//!
//! ## Submodules
//! - **`cache`**: O(1) LRU map with synchronous eviction hand-back.
//! - **`client`**: `DfsClient`, the Open/Read/Write/Close coordinator.
//! - **`renewal`**: Background KEEP_ALIVE while a file stays open.
//! - **`types`**: Cache entries and close outcomes.

pub mod cache;
pub mod client;
pub mod renewal;
pub mod types;

pub use client::DfsClient;

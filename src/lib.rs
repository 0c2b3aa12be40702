//! Sharded File Store Library
//!
//! A small distributed file system: a directory routes paths to shard servers
//! by prefix, shard servers hold file content under readers/writer locks with
//! optimistic versioning, and clients cache opened files and write back on
//! close.
//!
//! ## Architecture Modules
//! - **`directory`**: Shard registration, prefix assignment, routing and LIST fan-out.
//! - **`shard`**: File storage, lock lifecycle, lease reclamation, disconnect cleanup.
//! - **`client`**: Bounded LRU cache with dirty tracking and write-back.
//! - **`protocol`**: Line-oriented wire format and framed connections.
//! - **`config`**: Serde-backed settings for each role.
//! - **`error`**: `DfsError`, shared by all of the above.

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod protocol;
pub mod shard;

pub use error::{DfsError, Result};

//! Shard Server Module
//!
//! Owns the files of one shard (one path prefix handed out by the directory).
//!
//! ## Core Concepts
//! - **Locking**: Each file carries a readers/writer lock. Many readers or one writer.
//! - **Versioning**: UPDATE is optimistic. A write against a stale version is
//!   refused with `CONFLICT <current>` and changes nothing.
//! - **Leases**: Locks idle longer than the timeout are force-cleared by a
//!   background sweep, whether or not the holder is still connected.
//! - **Disconnects**: A closed connection releases every lock it held.

pub mod handlers;
pub mod server;
pub mod store;
pub mod types;

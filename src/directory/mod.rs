//! Directory Service Module
//!
//! Single rendezvous point of the cluster. Shard servers REGISTER here and are
//! handed a path prefix; clients ask here which shard owns a path; LIST is
//! fanned out to every shard.

pub mod handlers;
pub mod registry;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;

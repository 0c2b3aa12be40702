use std::fmt;

/// A shard server known to the directory.
///
/// Created on REGISTER and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRegistration {
    pub host: String,
    pub port: u16,
    /// Path prefix owned by this shard, e.g. `./A`.
    pub assigned_prefix: String,
}

impl ShardRegistration {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ShardRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}:{}", self.assigned_prefix, self.host, self.port)
    }
}

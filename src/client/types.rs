/// Locally cached copy of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content: String,
    /// Version the content was fetched at (or last written back as).
    pub version: u64,
    /// Set by a local write, cleared by a successful write-back.
    pub dirty: bool,
}

impl CacheEntry {
    pub fn clean(content: String, version: u64) -> Self {
        Self {
            content,
            version,
            dirty: false,
        }
    }
}

/// Result of a successful close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing to write back.
    Clean,
    /// Local changes were accepted by the shard at `version`.
    Committed { version: u64 },
}

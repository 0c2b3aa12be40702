use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

/// Identity of one client connection on a shard server.
///
/// A fresh id is minted per accepted connection, so locks are owned by the
/// connection that took them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored content of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub content: String,
    /// Bumped by exactly one on every accepted UPDATE.
    pub version: u64,
    /// Timestamp (ms) of the last accepted UPDATE.
    pub last_saved: Option<u64>,
    /// Timestamp (ms) of the last OPEN or UPDATE.
    pub last_accessed: u64,
}

impl FileRecord {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            version: 0,
            last_saved: None,
            last_accessed: now_ms(),
        }
    }
}

impl Default for FileRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Readers/writer lock of one file.
///
/// Holds either a set of readers or a single writer, never both.
#[derive(Debug, Clone)]
pub struct LockState {
    pub readers: HashSet<ClientId>,
    pub writer: Option<ClientId>,
    pub last_active: Instant,
}

impl LockState {
    pub fn new() -> Self {
        Self {
            readers: HashSet::new(),
            writer: None,
            last_active: Instant::now(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.writer.is_some() || !self.readers.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Drops every holder. Returns whether anything was held.
    pub fn clear(&mut self) -> bool {
        let held = self.is_held();
        self.readers.clear();
        self.writer = None;
        held
    }

    pub fn status(&self) -> LockStatus {
        match (self.writer.is_some(), !self.readers.is_empty()) {
            (false, false) => LockStatus::Unlocked,
            (false, true) => LockStatus::Read,
            (true, false) => LockStatus::Write,
            (true, true) => LockStatus::ReadWrite,
        }
    }
}

impl Default for LockState {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock status as reported by LIST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    Read,
    Write,
    /// Cannot occur while the lock invariant holds; still reported if it does.
    ReadWrite,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Unlocked => f.write_str("UNLOCKED"),
            LockStatus::Read => f.write_str("LOCKED(READ)"),
            LockStatus::Write => f.write_str("LOCKED(WRITE)"),
            LockStatus::ReadWrite => f.write_str("LOCKED(READ/WRITE)"),
        }
    }
}

/// One row of a shard listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileListing {
    pub name: String,
    pub last_saved: Option<u64>,
    pub last_accessed: u64,
    pub status: LockStatus,
}

impl FileListing {
    /// `<name>\t<last_saved|never>\t<last_accessed>\t<status>`
    pub fn to_line(&self) -> String {
        let saved = match self.last_saved {
            Some(ms) => ms.to_string(),
            None => "never".to_string(),
        };
        format!(
            "{}\t{}\t{}\t{}",
            self.name, saved, self.last_accessed, self.status
        )
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

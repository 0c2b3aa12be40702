//! Error taxonomy shared by the directory, the shard servers and the client.
//!
//! Every variant maps to exactly one reply line on the wire (`reply_line`) and
//! the client decodes reply lines back into the same variants (`from_reply`),
//! so a conflict raised inside a shard surfaces as the same value to the
//! caller of `DfsClient`.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::protocol::{CONFLICT, ERROR_PREFIX};

pub type Result<T> = std::result::Result<T, DfsError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DfsError {
    /// Malformed or unknown command, or an operation without the lock context it needs.
    #[error("{0}")]
    Protocol(String),

    /// Requested mode is incompatible with the current holders.
    #[error("Locked")]
    LockConflict,

    /// UPDATE submitted against a stale version.
    #[error("version conflict, current version is {current}")]
    VersionConflict { current: u64 },

    /// No registered shard prefix matches the path.
    #[error("No matching server for {path}")]
    Routing { path: String },

    /// A protocol line went over `MAX_LINE_LENGTH` and was discarded.
    #[error("line exceeds maximum length")]
    LineTooLong,

    /// Peer socket closed or I/O failure.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("no file is currently open")]
    NoOpenFile,

    #[error("{path} is opened read-only")]
    ReadOnly { path: String },

    #[error("{path} is opened write-only")]
    WriteOnly { path: String },
}

impl DfsError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// The status line a server sends back for this error.
    pub fn reply_line(&self) -> String {
        match self {
            DfsError::VersionConflict { current } => format!("{} {}", CONFLICT, current),
            other => format!("{} {}", ERROR_PREFIX, other),
        }
    }

    /// Decodes a non-`OK` status line.
    pub fn from_reply(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix(CONFLICT) {
            return match rest.trim().parse() {
                Ok(current) => DfsError::VersionConflict { current },
                Err(_) => DfsError::protocol(format!("malformed conflict reply: {}", line)),
            };
        }

        let Some(message) = line.strip_prefix(ERROR_PREFIX) else {
            return DfsError::protocol(format!("unexpected reply: {}", line));
        };
        let message = message.trim();

        if message == "Locked" {
            DfsError::LockConflict
        } else if message == "line exceeds maximum length" {
            DfsError::LineTooLong
        } else if let Some(path) = message.strip_prefix("No matching server for ") {
            DfsError::Routing {
                path: path.to_string(),
            }
        } else {
            DfsError::Protocol(message.to_string())
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, DfsError::Connection(_))
    }
}

impl From<std::io::Error> for DfsError {
    fn from(e: std::io::Error) -> Self {
        DfsError::Connection(e.to_string())
    }
}

impl From<LinesCodecError> for DfsError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => DfsError::LineTooLong,
            LinesCodecError::Io(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_lines_decode_to_same_variant() {
        let errors = vec![
            DfsError::LockConflict,
            DfsError::VersionConflict { current: 7 },
            DfsError::Routing {
                path: "./Q/notes.txt".to_string(),
            },
            DfsError::protocol("No lock found for KEEP_ALIVE from abc"),
            DfsError::LineTooLong,
        ];

        for err in errors {
            let line = err.reply_line();
            assert_eq!(DfsError::from_reply(&line), err, "line was {:?}", line);
        }
    }

    #[test]
    fn test_wire_format_matches_protocol_table() {
        assert_eq!(DfsError::LockConflict.reply_line(), "[ERROR] Locked");
        assert_eq!(
            DfsError::VersionConflict { current: 1 }.reply_line(),
            "CONFLICT 1"
        );
        assert_eq!(
            DfsError::Routing {
                path: "x.txt".to_string()
            }
            .reply_line(),
            "[ERROR] No matching server for x.txt"
        );
    }

    #[test]
    fn test_garbage_reply_is_protocol_error() {
        assert!(matches!(
            DfsError::from_reply("WHAT"),
            DfsError::Protocol(_)
        ));
        assert!(matches!(
            DfsError::from_reply("CONFLICT abc"),
            DfsError::Protocol(_)
        ));
    }
}

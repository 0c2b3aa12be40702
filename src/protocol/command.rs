use std::fmt;

use super::escape_content;
use crate::error::{DfsError, Result};

/// Access mode requested when opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    /// Normalizes a user supplied mode token.
    ///
    /// Matching is case-insensitive: `R`, `READ`, `READ_ONLY` and `READ-ONLY`
    /// mean read, `W`, `WRITE`, `WRITE_ONLY` and `WRITE-ONLY` mean write, and
    /// anything else falls back to read/write.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "R" | "READ" | "READ_ONLY" | "READ-ONLY" => AccessMode::Read,
            "W" | "WRITE" | "WRITE_ONLY" | "WRITE-ONLY" => AccessMode::Write,
            _ => AccessMode::ReadWrite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "READ",
            AccessMode::Write => "WRITE",
            AccessMode::ReadWrite => "RW",
        }
    }

    pub fn can_read(&self) -> bool {
        !matches!(self, AccessMode::Write)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, AccessMode::Read)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        host: String,
        port: u16,
        base_prefix: String,
    },
    Open {
        path: String,
        mode: AccessMode,
    },
    Update {
        path: String,
        version: u64,
        content: String,
    },
    Close {
        path: String,
    },
    KeepAlive {
        path: String,
    },
    List,
}

impl Command {
    /// Whether a request starting with `header` carries a content line.
    pub fn has_body(header: &str) -> bool {
        header.split_whitespace().next() == Some("UPDATE")
    }

    /// Parses a header line and, for `UPDATE`, its already unescaped body.
    pub fn parse(header: &str, body: Option<&str>) -> Result<Self> {
        let parts: Vec<&str> = header.split_whitespace().collect();
        let Some(&name) = parts.first() else {
            return Err(DfsError::protocol("empty command"));
        };

        match name {
            "REGISTER" => {
                if parts.len() < 4 {
                    return Err(usage("REGISTER host port path"));
                }
                let port = match parts[2].parse::<u16>() {
                    Ok(port) if port != 0 => port,
                    _ => return Err(DfsError::protocol("invalid port")),
                };
                Ok(Command::Register {
                    host: parts[1].to_string(),
                    port,
                    base_prefix: parts[3].to_string(),
                })
            }
            "OPEN" => {
                if parts.len() < 3 {
                    return Err(usage("OPEN filename mode"));
                }
                Ok(Command::Open {
                    path: parts[1].to_string(),
                    mode: AccessMode::from_token(parts[2]),
                })
            }
            "UPDATE" => {
                if parts.len() < 3 {
                    return Err(usage("UPDATE filename version"));
                }
                let version = parts[2]
                    .parse()
                    .map_err(|_| DfsError::protocol(format!("invalid version {}", parts[2])))?;
                let content = body.ok_or_else(|| usage("UPDATE filename version <content line>"))?;
                Ok(Command::Update {
                    path: parts[1].to_string(),
                    version,
                    content: content.to_string(),
                })
            }
            "CLOSE" => match parts.get(1) {
                Some(path) => Ok(Command::Close {
                    path: path.to_string(),
                }),
                None => Err(usage("CLOSE filename")),
            },
            "KEEP_ALIVE" => match parts.get(1) {
                Some(path) => Ok(Command::KeepAlive {
                    path: path.to_string(),
                }),
                None => Err(usage("KEEP_ALIVE filename")),
            },
            "LIST" => Ok(Command::List),
            other => Err(DfsError::protocol(format!("Unknown command {}", other))),
        }
    }

    /// Encodes the command into the lines sent on the wire.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Command::Register {
                host,
                port,
                base_prefix,
            } => vec![format!("REGISTER {} {} {}", host, port, base_prefix)],
            Command::Open { path, mode } => vec![format!("OPEN {} {}", path, mode)],
            Command::Update {
                path,
                version,
                content,
            } => vec![
                format!("UPDATE {} {}", path, version),
                escape_content(content),
            ],
            Command::Close { path } => vec![format!("CLOSE {}", path)],
            Command::KeepAlive { path } => vec![format!("KEEP_ALIVE {}", path)],
            Command::List => vec!["LIST".to_string()],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "REGISTER",
            Command::Open { .. } => "OPEN",
            Command::Update { .. } => "UPDATE",
            Command::Close { .. } => "CLOSE",
            Command::KeepAlive { .. } => "KEEP_ALIVE",
            Command::List => "LIST",
        }
    }
}

fn usage(grammar: &str) -> DfsError {
    DfsError::protocol(format!("usage: {}", grammar))
}

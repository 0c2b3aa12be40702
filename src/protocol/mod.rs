//! Wire Protocol
//!
//! Line-oriented text protocol spoken between clients, the directory and the
//! shard servers. One request is a command line (plus one content line for
//! `UPDATE`); one reply is a status line optionally followed by a body.
//!
//! ## Reply grammar
//! - `OK [value]` on success.
//! - `CONFLICT <current>` for a stale `UPDATE`.
//! - `[ERROR] <reason>` for everything else.
//! - `FILES_LIST_START` … `FILES_LIST_END` framing a listing.
//!
//! File content always travels as a single escaped line (see `escape_content`).

pub mod codec;
pub mod command;
pub mod connection;

pub use command::{AccessMode, Command};
pub use connection::Connection;

#[cfg(test)]
mod tests;

pub const OK: &str = "OK";
pub const CONFLICT: &str = "CONFLICT";
pub const ERROR_PREFIX: &str = "[ERROR]";
pub const LIST_START: &str = "FILES_LIST_START";
pub const LIST_END: &str = "FILES_LIST_END";

/// Upper bound for a single protocol line, content included.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits a status line into its `OK` payload or the error it encodes.
pub fn parse_status(line: &str) -> crate::Result<&str> {
    if line == OK {
        return Ok("");
    }
    match line.strip_prefix("OK ") {
        Some(rest) => Ok(rest.trim()),
        None => Err(crate::DfsError::from_reply(line)),
    }
}

/// Escapes content so it fits on one line.
pub fn escape_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape_content(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // Unknown escapes are kept verbatim.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

use super::store::ShardStore;
use super::types::ClientId;
use crate::error::DfsError;
use crate::protocol::{Command, LIST_END, LIST_START, OK, escape_content};

/// Applies one command to the shard state and returns the reply lines.
pub fn dispatch(store: &ShardStore, client: &ClientId, command: Command) -> Vec<String> {
    match command {
        Command::Open { path, mode } => match store.open(&path, mode, client) {
            Ok((version, content)) => {
                vec![format!("{} {}", OK, version), escape_content(&content)]
            }
            Err(e) => vec![e.reply_line()],
        },

        Command::Update {
            path,
            version,
            content,
        } => match store.update(&path, version, content) {
            Ok(new_version) => vec![format!("{} {}", OK, new_version)],
            Err(e) => vec![e.reply_line()],
        },

        Command::Close { path } => {
            store.close(&path, client);
            vec![OK.to_string()]
        }

        Command::KeepAlive { path } => match store.keep_alive(&path, client) {
            Ok(()) => vec![OK.to_string()],
            Err(e) => vec![e.reply_line()],
        },

        Command::List => {
            let mut lines = vec![LIST_START.to_string()];
            lines.extend(store.list().iter().map(|entry| entry.to_line()));
            lines.push(LIST_END.to_string());
            lines
        }

        Command::Register { .. } => vec![
            DfsError::protocol("REGISTER is only accepted by the directory").reply_line(),
        ],
    }
}

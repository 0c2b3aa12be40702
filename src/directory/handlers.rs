use futures::future::join_all;

use super::registry::ShardRegistry;
use super::types::ShardRegistration;
use crate::error::{DfsError, Result};
use crate::protocol::{Command, Connection, ERROR_PREFIX, LIST_END, LIST_START, OK};

/// Applies one command to the registry and returns the reply lines.
pub async fn dispatch(registry: &ShardRegistry, command: Command) -> Vec<String> {
    match command {
        Command::Register {
            host,
            port,
            base_prefix,
        } => {
            registry.register(&host, port, &base_prefix);
            vec![OK.to_string()]
        }

        Command::Open { path, .. } => match registry.route(&path) {
            Ok(shard) => {
                tracing::debug!("[Directory] routed {} to {}", path, shard);
                vec![format!("{} {}", OK, shard.port)]
            }
            Err(e) => vec![e.reply_line()],
        },

        // Nothing to release on the directory side.
        Command::Close { .. } => vec![OK.to_string()],

        Command::List => fan_out_list(registry).await,

        other => vec![
            DfsError::protocol(format!("{} is not handled by the directory", other.name()))
                .reply_line(),
        ],
    }
}

/// Collects the listing of every registered shard, one fresh connection each.
///
/// A shard that cannot be reached contributes an inline error line; the
/// other shards are still listed.
pub async fn fan_out_list(registry: &ShardRegistry) -> Vec<String> {
    let shards = registry.registrations();
    let results = join_all(shards.iter().map(fetch_shard_listing)).await;

    let mut lines = vec![LIST_START.to_string()];
    for (shard, result) in shards.iter().zip(results) {
        match result {
            Ok(entries) => {
                lines.push(format!("# shard {}", shard));
                lines.extend(entries);
            }
            Err(e) => {
                tracing::warn!("[Directory] listing from {} failed: {}", shard, e);
                lines.push(format!("{} listing from {}: {}", ERROR_PREFIX, shard, e));
            }
        }
    }
    lines.push(LIST_END.to_string());
    lines
}

async fn fetch_shard_listing(shard: &ShardRegistration) -> Result<Vec<String>> {
    let mut conn = Connection::connect((shard.host.as_str(), shard.port)).await?;
    conn.fetch_listing().await
}

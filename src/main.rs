use clap::{Parser, Subcommand};
use shardfs::client::DfsClient;
use shardfs::config::{self, ClientConfig, DirectoryConfig, ShardConfig};
use shardfs::directory::server::DirectoryServer;
use shardfs::shard::server::ShardServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardfs", about = "Prefix-sharded distributed file store")]
struct Cli {
    /// JSON config file for the selected role.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Run the directory service.
    Directory {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run a shard server and register it with the directory.
    Shard {
        #[arg(long)]
        bind: Option<SocketAddr>,
        #[arg(long)]
        directory: Option<String>,
        /// Base path prefix; the directory appends A, B, C, ...
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        advertise_host: Option<String>,
        #[arg(long)]
        lock_timeout_ms: Option<u64>,
    },
    /// Interactive client reading commands from stdin.
    Client {
        #[arg(long)]
        directory: Option<String>,
        #[arg(long)]
        cache_capacity: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.role {
        Role::Directory { bind } => {
            let mut config: DirectoryConfig = config::load(config_path)?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            DirectoryServer::bind(config).await?.run().await
        }

        Role::Shard {
            bind,
            directory,
            base,
            advertise_host,
            lock_timeout_ms,
        } => {
            let mut config: ShardConfig = config::load(config_path)?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(directory) = directory {
                config.directory = directory;
            }
            if let Some(base) = base {
                config.base_prefix = base;
            }
            if advertise_host.is_some() {
                config.advertise_host = advertise_host;
            }
            if let Some(ms) = lock_timeout_ms {
                config.lock_timeout_ms = ms;
            }

            let server = ShardServer::bind(config).await?;
            server.register().await?;
            server.run().await
        }

        Role::Client {
            directory,
            cache_capacity,
        } => {
            let mut config: ClientConfig = config::load(config_path)?;
            if let Some(directory) = directory {
                config.directory = directory;
            }
            if let Some(capacity) = cache_capacity {
                config.cache_capacity = capacity;
            }
            run_client(config).await
        }
    }
}

async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let mut client = DfsClient::connect(&config).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Commands: open <path> [mode] | read | write <text> | close | keepalive | list | quit");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));

        match cmd.to_ascii_lowercase().as_str() {
            "" => continue,
            "open" => {
                let mut args = rest.split_whitespace();
                let Some(path) = args.next() else {
                    println!("usage: open <path> [mode]");
                    continue;
                };
                match client.open(path, args.next().unwrap_or("RW")).await {
                    Ok(entry) => println!("opened {} (v{})", path, entry.version),
                    Err(e) => println!("error: {}", e),
                }
            }
            "read" => match client.read() {
                Ok(content) => println!("{}", content),
                Err(e) => println!("error: {}", e),
            },
            "write" => match client.write(rest) {
                Ok(()) => println!("ok"),
                Err(e) => println!("error: {}", e),
            },
            "close" => match client.close().await {
                Ok(outcome) => println!("closed: {:?}", outcome),
                Err(e) => println!("error: {}", e),
            },
            "keepalive" => match client.keep_alive().await {
                Ok(()) => println!("ok"),
                Err(e) => println!("error: {}", e),
            },
            "list" => match client.list().await {
                Ok(listing) => listing.iter().for_each(|line| println!("{}", line)),
                Err(e) => println!("error: {}", e),
            },
            "quit" | "exit" => break,
            other => println!("unknown command: {}", other),
        }
    }

    if client.current_path().is_some() {
        if let Err(e) = client.close().await {
            tracing::warn!("Closing on exit failed: {}", e);
        }
    }
    Ok(())
}

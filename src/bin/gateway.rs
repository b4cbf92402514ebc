//! Storage Gateway CLI
//!
//! Runs gateway operations against a directory-backed primary store

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use storage_gateway::{
    EntryKind, FileShardStore, GatewayConfig, LocalStore, MemoryShardStore, ShardStore,
    StorageGateway,
};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "storage-gateway")]
#[command(about = "Object store facade with existence cache, retention copies and mirroring")]
struct Args {
    /// Directory used as the primary store
    #[arg(short = 'r', long)]
    root: PathBuf,

    /// Gateway configuration (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Persist the existence cache in this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file
    Put { path: String, file: PathBuf },
    /// Print or save a file
    Get {
        path: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete a file
    Rm { path: String },
    /// Rename a file
    Mv { from: String, to: String },
    /// Copy a file
    Cp { from: String, to: String },
    /// Check whether a file exists
    Exists { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        dir: String,
        #[arg(short = 'R', long)]
        recursive: bool,
    },
    /// Show file metadata as JSON
    Stat { path: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("loading config {:?}", path))?,
        None => GatewayConfig::default(),
    };
    debug!("Config: {:?}", config);

    let primary = LocalStore::new(&args.root)
        .with_context(|| format!("opening primary store {:?}", args.root))?;
    let shard_store: Arc<dyn ShardStore> = match &args.cache_dir {
        Some(dir) => Arc::new(FileShardStore::new(dir)?),
        None => Arc::new(MemoryShardStore::new()),
    };

    let gateway = StorageGateway::from_config(&config, Arc::new(primary), shard_store)?;
    info!("Primary store: {:?}", args.root);

    run(&gateway, args.command)
}

fn run(gateway: &StorageGateway, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Put { path, file } => {
            let data = fs::read(&file).with_context(|| format!("reading {:?}", file))?;
            let meta = gateway.write(&path, &data)?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Command::Get { path, out } => {
            let Some(file) = gateway.read(&path)? else {
                bail!("{} not found", path);
            };
            match out {
                Some(out) => fs::write(&out, &file.contents)?,
                None => std::io::stdout().write_all(&file.contents)?,
            }
        }
        Command::Rm { path } => {
            if !gateway.delete(&path)? {
                bail!("{} not found", path);
            }
        }
        Command::Mv { from, to } => {
            if !gateway.rename(&from, &to)? {
                bail!("{} not found", from);
            }
        }
        Command::Cp { from, to } => {
            if !gateway.copy(&from, &to)? {
                bail!("{} not found", from);
            }
        }
        Command::Exists { path } => {
            let exists = gateway.has(&path)?;
            println!("{}", exists);
            if !exists {
                std::process::exit(1);
            }
        }
        Command::Ls { dir, recursive } => {
            for entry in gateway.list_contents(&dir, recursive)? {
                match entry.kind {
                    EntryKind::Dir => println!("{}/", entry.path),
                    EntryKind::File => {
                        println!("{:>12}  {}", entry.size.unwrap_or(0), entry.path)
                    }
                }
            }
        }
        Command::Stat { path } => {
            let Some(meta) = gateway.get_metadata(&path)? else {
                bail!("{} not found", path);
            };
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }
    Ok(())
}

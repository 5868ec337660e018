//! Wenchang CLI - query the showcase dataset from the command line.
//!
//! Every subcommand prints JSON on stdout; logs and progress go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wenchang_core::batch::BatchEvent;
use wenchang_core::{Config, DataService, DirectoryQuery, QueryOptions};

#[derive(Parser, Debug)]
#[command(name = "wenchang")]
#[command(about = "Query the wenchang cultural-creative case and policy dataset")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config dir>/wenchang/config.json)
    #[arg(long, value_name = "FILE", env = "WENCHANG_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with the local static data files
    #[arg(long, value_name = "DIR", env = "WENCHANG_LOCAL_DATA")]
    local_data: Option<PathBuf>,

    /// Keep directory listings on disk between runs
    #[arg(long)]
    persist_listings: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cases
    Cases(QueryArgs),
    /// List policies
    Policies(QueryArgs),
    /// Dataset summary
    Stats(FlagArgs),
    /// Cases and policies together
    All(QueryArgs),
    /// Walk a remote directory and download every JSON file, reporting progress
    Download(DownloadArgs),
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct FlagArgs {
    /// Bypass the cache
    #[arg(long)]
    refresh: bool,

    /// Fail instead of serving the embedded sample data
    #[arg(long)]
    no_fallback: bool,
}

#[derive(Args, Debug, Clone)]
struct QueryArgs {
    #[arg(long)]
    category: Option<String>,

    #[arg(long, alias = "region")]
    province: Option<String>,

    #[arg(long)]
    level: Option<String>,

    /// Maximum number of records (0 = unlimited)
    #[arg(long)]
    limit: Option<usize>,

    /// 1-based page, requires --page-size
    #[arg(long, requires = "page_size")]
    page: Option<usize>,

    #[arg(long)]
    page_size: Option<usize>,

    #[command(flatten)]
    flags: FlagArgs,
}

#[derive(Args, Debug, Clone)]
struct DownloadArgs {
    /// Directory inside the dataset repo, e.g. `cases`
    path: String,

    /// Only files whose name starts with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,
}

impl From<&FlagArgs> for QueryOptions {
    fn from(flags: &FlagArgs) -> Self {
        QueryOptions {
            force_refresh: flags.refresh,
            use_fallback: !flags.no_fallback,
            ..QueryOptions::default()
        }
    }
}

impl From<&QueryArgs> for QueryOptions {
    fn from(args: &QueryArgs) -> Self {
        QueryOptions {
            category: args.category.clone(),
            province: args.province.clone(),
            level: args.level.clone(),
            limit: args.limit,
            page: args.page,
            page_size: args.page_size,
            ..QueryOptions::from(&args.flags)
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The returned guard
/// flushes buffered log lines on drop.
fn init_tracing() -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &cli.local_data {
        config.local_data_path = dir.clone();
    }
    if cli.persist_listings {
        config.persist_listings = true;
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing();

    let config = load_config(&cli)?;
    info!(owner = %config.repo.owner, repo = %config.repo.repo, "wenchang starting");

    match &cli.command {
        Command::Config { save } => {
            if *save {
                let path = config.save().context("Failed to save config")?;
                eprintln!("Saved config to {}", path.display());
            }
            print_json(&config)
        }
        Command::Cases(args) => {
            let service = DataService::new(&config)?;
            print_json(&service.fetch_all_cases(&args.into()).await?)
        }
        Command::Policies(args) => {
            let service = DataService::new(&config)?;
            print_json(&service.fetch_all_policies(&args.into()).await?)
        }
        Command::All(args) => {
            let service = DataService::new(&config)?;
            print_json(&service.load_all(&args.into()).await?)
        }
        Command::Stats(flags) => {
            let service = DataService::new(&config)?;
            print_json(&service.fetch_stats(&flags.into()).await?)
        }
        Command::Download(args) => download(&config, args).await,
    }
}

/// Run a directory download, streaming progress events to stderr and the
/// downloaded documents to stdout.
async fn download(config: &Config, args: &DownloadArgs) -> Result<()> {
    let service = DataService::new(config)?;
    let mut query = DirectoryQuery::new(&args.path);
    if let Some(prefix) = &args.prefix {
        query = query.with_prefix(prefix);
    }
    if args.recursive {
        query = query.recursive();
    }

    let events = service.context().paginator().fetch_directory(query);
    futures::pin_mut!(events);

    let mut documents: Vec<Value> = Vec::new();
    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Progress(progress) => {
                eprintln!("{}", serde_json::to_string(&progress)?);
            }
            BatchEvent::Listed(items) => {
                eprintln!("Listed {} files under {}", items.len(), args.path);
            }
            BatchEvent::Downloaded(outcome) => {
                for failure in &outcome.failures {
                    eprintln!("Failed {}: {}", failure.name, failure.error);
                }
                eprintln!(
                    "Downloaded {} files in {} batches ({} failed)",
                    outcome.records.len(),
                    outcome.batches,
                    outcome.failure_count()
                );
                documents = outcome.records;
            }
            BatchEvent::Failed(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", args.path));
            }
        }
    }

    print_json(&documents)
}

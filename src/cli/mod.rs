//! Command-line interface for git-indexer
//!
//! One invocation enumerates repositories from a source, then mirrors them,
//! indexes their commits, or indexes their merge/pull requests.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{load_settings, Settings};
use crate::db::Store;
use crate::enumerate::{enumerate, Source};
use crate::mirror::Tokens;
use crate::platform::Clients;

pub mod pipeline;
pub mod utils;

pub use pipeline::{process, LivePipeline, Mode, Pipeline, RunSummary};

/// Mirror git repositories and index their history into a searchable database
#[derive(Parser, Debug)]
#[command(name = "git-indexer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Index commits or merge/pull requests, or just mirror repos without indexing
    #[arg(long, value_enum)]
    pub mode: Mode,

    /// The source to get repos from
    #[arg(long, value_enum)]
    pub source: Source,

    /// Search query for GitHub or GitLab; for list, the path to the list file
    #[arg(long, default_value = "")]
    pub query: String,

    /// Only process repositories whose URL matches one of these globs (comma-separated)
    #[arg(long, default_value = "*", value_name = "GLOBS")]
    pub filter: String,

    /// Index all commits, not just the ones since the last indexed commit
    #[arg(long)]
    pub all: bool,

    /// Local path to store mirrors of remote repos (required unless mode is requests)
    #[arg(
        long = "mirror_path",
        value_name = "PATH",
        required_if_eq_any([("mode", "commits"), ("mode", "mirror")])
    )]
    pub mirror_path: Option<PathBuf>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings()?;
    init_logging(cli.verbose, &settings)?;

    info!("Started command with: {:?}", cli);

    let filter = utils::repo_filter(&cli.filter)?;
    let db_path = settings.sqlite_path();
    let store = Store::open(&db_path)?;
    info!("Opened database {}", db_path.display());

    let clients = Clients::from_settings(&settings).context("Failed to build platform API clients")?;
    let repos = enumerate(cli.source, &cli.query, &clients)?;

    let mut pipeline = LivePipeline {
        store,
        clients: &clients,
        tokens: Tokens::from_settings(&settings),
        mirror_root: cli.mirror_path.clone(),
        timeout: settings.index_timeout(),
    };

    let summary = process(cli.mode, &filter, repos, cli.all, &mut pipeline);
    info!("{}", summary);
    println!("{}", summary);
    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured `log_level`; `--verbose` adds DEBUG
/// on top of either. With `log_file` set, output is appended there instead
/// of stderr.
pub fn init_logging(verbose: bool, settings: &Settings) -> Result<()> {
    let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let filter = if verbose { filter.add_directive(Level::DEBUG.into()) } else { filter };

    let (file_layer, stderr_layer) = match &settings.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(filter)
        .try_init();
    Ok(())
}

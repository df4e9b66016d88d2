//! lfs-fetchd binary
//!
//! ```text
//! lfs-fetchd ~/notes                 # serve on 127.0.0.1:3322
//! lfs-fetchd ~/notes --dry-run -v    # log what would be pulled
//! lfs-fetchd --config fetchd.json    # everything from a file
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lfs_fetchd::{Config, DispatchMode, LfsFetcher, run_with_shutdown};
use tracing_subscriber::EnvFilter;

/// Pull Git LFS attachments on demand for note-taking clients
#[derive(Debug, Parser)]
#[command(name = "lfs-fetchd")]
#[command(version, about)]
struct Args {
    /// Git working tree holding the notes (default: current directory)
    working_dir: Option<PathBuf>,

    /// Address to listen on [default: 127.0.0.1]
    #[arg(long)]
    bind_address: Option<IpAddr>,

    /// Port to listen on [default: 3322]
    #[arg(short, long)]
    port: Option<u16>,

    /// Echo pull commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Legacy mode: queue resources for a background worker and answer at once
    #[arg(long)]
    queued: bool,

    /// JSON configuration file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(working_dir) = self.working_dir {
            config.working_dir = working_dir;
        }
        if let Some(bind_address) = self.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.queued {
            config.mode = DispatchMode::Queued;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "lfs_fetchd={default_level},tower_http={default_level}"
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.into_config()?;
    config.validate().context("invalid configuration")?;

    let fetcher = Arc::new(LfsFetcher::new(config));
    let program = fetcher
        .executor()
        .resolve_program()
        .context("pull tool is not available")?;
    tracing::info!(
        program = %program.display(),
        dry_run = fetcher.config().dry_run,
        "using pull tool"
    );

    run_with_shutdown(fetcher).await?;
    Ok(())
}

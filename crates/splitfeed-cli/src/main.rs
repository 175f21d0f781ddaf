//! 🚀 splitfeed-cli: the front door, the bouncer, the maitre d' of splitfeed.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Loads config, sets up logging, starts the pipeline, turns Ctrl-C into a graceful
//! stop, and prints the final tally. The real work happens in the library. Like a manager. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use splitfeed::app_config::load_config;
use splitfeed::supervisors::Supervisor;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "splitfeed.toml";

/// 🪣✂️ List a bucket, split its objects into records, deliver the records.
#[derive(Debug, Parser)]
#[command(name = "splitfeed", version, about)]
struct Cli {
    /// TOML config file. Defaults to ./splitfeed.toml when it exists; env vars (SPLITFEED_*) otherwise.
    config: Option<PathBuf>,

    /// Override runtime.worker_count.
    #[arg(long)]
    workers: Option<usize>,

    /// Override source.prefix.
    #[arg(long)]
    prefix: Option<String>,
}

/// 🔒 An explicit config path must exist. The default one is optional.
fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!(
                    "💀 couldn't check whether the config file exists. Was checking here: '{}'",
                    path.display()
                )
            })?;
            if !exists {
                anyhow::bail!(
                    "💀 config file '{}' does not exist. If it's a relative path, check your cwd.",
                    path.display()
                );
            }
            Ok(Some(path))
        }
        None => {
            let the_default = Path::new(DEFAULT_CONFIG_FILE);
            Ok(the_default.is_file().then(|| the_default.to_path_buf()))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let the_config_path = resolve_config_path(cli.config)?;
    let mut app_config = load_config(the_config_path.as_deref())
        .context("💀 couldn't load the config. Make sure you didn't forget something obvious.")?;
    if let Some(workers) = cli.workers {
        app_config.runtime.worker_count = workers;
    }
    if let Some(prefix) = cli.prefix {
        app_config.source.prefix = prefix;
    }

    let the_handle = Supervisor::start(app_config)
        .await
        .context("💀 the pipeline refused to start")?;

    // -- 🛑 first Ctrl-C: graceful stop. The in-flight fetches finish, the queue drains.
    let the_stopper = the_handle.shutdown_controller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received; stopping after the in-flight fetches finish");
            if !the_stopper.stop() {
                warn!("⚠️ already stopping");
            }
        }
    });

    let the_snapshot = the_handle.wait().await?;
    println!("{}", the_snapshot.render_table());
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run(Cli::parse()).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }
        std::process::exit(1);
    }
}

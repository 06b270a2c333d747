//! shellcache - drive the offline shell cache from the command line.
//!
//! Runs the reconciler's lifecycle handlers against a persistent on-disk
//! cache and the live origin, so a deployment's install/activate/fetch
//! behaviour can be exercised and inspected outside a browser.

mod settings;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shellcache_core::cache::disk::age_display;
use shellcache_core::{
    ActivationOutcome, CacheStorage, DiskCacheStorage, FetchDecision, Fetcher, HttpFetcher, LoggingHost,
    MessageOutcome, Method, Reconciler, Request, Response,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "shellcache", version, about = "Offline application shell cache")]
struct Cli {
    /// Build descriptor with origin, resources and core files
    #[arg(long, env = "SHELLCACHE_CONFIG")]
    config: PathBuf,

    /// Directory holding the cache namespaces
    #[arg(long, env = "SHELLCACHE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, env = "SHELLCACHE_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage the core shell files
    Install,
    /// Migrate the content cache to the current manifest
    Activate,
    /// Resolve a request the way the worker would
    Fetch {
        /// Absolute URL or path relative to the origin
        target: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Write the body here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Deliver a control message (skipWaiting, downloadOffline)
    Message { data: String },
    /// Fetch every manifest resource missing from the cache
    DownloadOffline,
    /// Show cache namespaces
    Status {
        #[arg(long)]
        json: bool,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_ref())?;

    let settings = Settings::load(&cli.config, cli.cache_dir.clone())?;
    info!(origin = %settings.worker.origin, cache_dir = %settings.cache_dir.display(), "shellcache starting");

    let storage = Arc::new(
        DiskCacheStorage::new(settings.cache_dir.clone())
            .with_context(|| format!("Failed to open cache directory: {}", settings.cache_dir.display()))?,
    );
    let fetcher = Arc::new(HttpFetcher::new()?);
    let reconciler = Reconciler::new(
        settings.worker,
        storage.clone(),
        fetcher.clone(),
        Arc::new(LoggingHost),
    );

    match cli.command {
        Command::Install => {
            let staged = reconciler.install().await.context("Install failed")?;
            eprintln!("Staged {} shell files", staged);
        }
        Command::Activate => match reconciler.activate().await {
            ActivationOutcome::FirstRun { staged } => {
                eprintln!("First activation: {} shell files cached", staged);
            }
            ActivationOutcome::Upgraded {
                evicted,
                retained,
                staged,
            } => {
                eprintln!(
                    "Upgraded: {} evicted, {} retained, {} shell files cached",
                    evicted, retained, staged
                );
            }
            ActivationOutcome::Reset { reason } => {
                anyhow::bail!("Activation failed, caches were reset: {}", reason);
            }
        },
        Command::Fetch {
            target,
            method,
            output,
        } => {
            let url = if target.starts_with("http://") || target.starts_with("https://") {
                target
            } else {
                reconciler
                    .config()
                    .resolve(&target)
                    .with_context(|| format!("Invalid path: {}", target))?
            };
            let request = Request::new(Method::parse(&method), url);

            let response = match reconciler.fetch(&request).await? {
                FetchDecision::Intercept(response) => {
                    eprintln!("{:?} -> intercepted", reconciler.route(&request));
                    response
                }
                FetchDecision::PassThrough => {
                    // Default network handling, as the browser would do
                    eprintln!("pass-through");
                    fetcher.fetch(&request).await?
                }
            };
            write_response(&response, output.as_ref())?;
        }
        Command::Message { data } => report_message(reconciler.handle_message(&data).await?),
        Command::DownloadOffline => {
            let fetched = reconciler
                .download_offline()
                .await
                .context("Offline download failed")?;
            eprintln!("Downloaded {} resources", fetched);
        }
        Command::Status { json } => print_status(&storage, &reconciler, json).await?,
    }

    Ok(())
}

fn report_message(outcome: MessageOutcome) {
    match outcome {
        MessageOutcome::Ignored => eprintln!("Message ignored"),
        MessageOutcome::SkippedWaiting => {
            eprintln!("Waiting skipped; reload open pages to pick up the new version")
        }
        MessageOutcome::Downloaded(count) => eprintln!("Downloaded {} resources", count),
    }
}

fn write_response(response: &Response, output: Option<&PathBuf>) -> Result<()> {
    eprintln!("HTTP {} ({} bytes)", response.status, response.body.len());
    match output {
        Some(path) => std::fs::write(path, &response.body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => io::stdout().write_all(&response.body)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct NamespaceStatus {
    name: String,
    role: &'static str,
    entries: usize,
    updated: Option<String>,
}

async fn print_status(storage: &DiskCacheStorage, reconciler: &Reconciler, json: bool) -> Result<()> {
    let names = &reconciler.config().cache_names;
    let mut rows = Vec::new();
    for name in storage.names().await? {
        let summary = storage.summary(&name).await?;
        let role = if name == names.content {
            "content"
        } else if name == names.staging {
            "staging"
        } else if name == names.snapshot {
            "snapshot"
        } else {
            "other"
        };
        rows.push(NamespaceStatus {
            updated: summary
                .newest
                .map(|newest| age_display((Utc::now() - newest).num_minutes())),
            name,
            role,
            entries: summary.entries,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Cache directory: {}", storage.dir().display());
    println!("Manifest: {} resources, {} core", reconciler.config().manifest.len(), reconciler.config().core.len());
    if rows.is_empty() {
        println!("No cache namespaces");
    }
    for row in rows {
        println!(
            "{:<24} {:<9} {:>5} entries  {}",
            row.name,
            row.role,
            row.entries,
            row.updated.as_deref().unwrap_or("never")
        );
    }
    Ok(())
}

//! dlqueue - resumable bulk downloads from the command line

use anyhow::{Context, Result};
use clap::Parser;
use dlqueue::downloader::Progress;
use dlqueue::{
    BulkItem, BulkOptions, DownloadManager, HeadlessWindow, ManagerSettings,
    RegisterOptions, WindowId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dlqueue", version, about)]
struct Args {
    /// URLs to download
    #[arg(required = true)]
    urls: Vec<String>,

    /// Destination folder (defaults to the configured download folder)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum downloads in flight
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut settings = match &args.config {
        Some(path) => ManagerSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ManagerSettings::default(),
    };
    if args.concurrency.is_some() {
        settings.bulk_concurrency = args.concurrency;
    }

    let manager = DownloadManager::builder(settings)
        .spawn_http()
        .context("Failed to start download manager")?;
    manager.register(RegisterOptions {
        download_folder: args.dir,
    });
    manager.window_created(Arc::new(HeadlessWindow::new(WindowId(1))));

    let downloads = args
        .urls
        .into_iter()
        .map(|url| {
            BulkItem::new(url)
                .on_progress(|tick, item| {
                    if let Progress::Percent(pct) = tick.progress {
                        tracing::debug!("{}: {:.1}%", item.filename(), pct);
                    }
                })
                .callback(|error, result| match error {
                    None => println!("done    {} ({} bytes)", result.path.display(), result.size),
                    Some(e) => println!("failed  {} [{}]: {}", result.filename, result.state, e),
                })
        })
        .collect();

    let outcome = manager
        .bulk_download_async(BulkOptions::new(downloads))
        .await;
    manager.shutdown();

    println!(
        "{} finished, {} failed",
        outcome.finished.len(),
        outcome.errors.len()
    );
    if let Some(error) = outcome.error {
        anyhow::bail!(error);
    }
    Ok(())
}

//! photoframe-rs — sync an iCloud shared album into a local cache and serve
//! a deterministically rotating photo-frame image from it.

use std::io::Write as _;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use photoframe_rs::cli::{Cli, Command};
use photoframe_rs::shutdown;
use photoframe_rs::sync::SyncOutcome;
use photoframe_rs::{FrameConfig, PhotoFrame};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = FrameConfig::from_cli(&cli)?;
    let frame = PhotoFrame::open(&config).await?;

    match cli.command {
        Command::Sync {
            watch_with_interval,
        } => run_sync(&frame, watch_with_interval).await,
        Command::Show { output, skip } => run_show(&frame, &output, skip).await,
        Command::Status => run_status(&config, &frame).await,
    }
}

fn log_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed(stats) => {
            println!(
                "Synced: {} photos in stream, {} downloaded, {} deleted, {} failed",
                stats.discovered, stats.downloaded, stats.deleted, stats.failed_downloads
            );
        }
        SyncOutcome::EmptyAlbum => {
            println!("Stream returned no photos; existing cache preserved");
        }
        SyncOutcome::AlreadySyncing => {
            println!("A sync is already running; nothing to do");
        }
    }
}

async fn run_sync(frame: &PhotoFrame, watch_with_interval: Option<u64>) -> anyhow::Result<()> {
    let Some(interval) = watch_with_interval else {
        let outcome = frame.sync().await?;
        log_outcome(&outcome);
        return Ok(());
    };

    let shutdown_token = shutdown::install_signal_handler();
    loop {
        // Sync failures are logged and the loop keeps going — the cache
        // keeps serving whatever it already holds.
        match frame.sync().await {
            Ok(outcome) => log_outcome(&outcome),
            Err(e) => tracing::warn!(error = %e, "sync failed, will retry next interval"),
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {}
            _ = shutdown_token.cancelled() => {
                tracing::info!("shutting down watch loop");
                return Ok(());
            }
        }
    }
}

async fn run_show(frame: &PhotoFrame, output: &str, skip: bool) -> anyhow::Result<()> {
    // First run against an empty cache: populate it before selecting.
    let never_synced = frame.last_sync_at().is_none();
    let cache_empty = frame.cached_ids().await?.is_empty();
    if never_synced && cache_empty {
        match frame.sync().await {
            Ok(outcome) => log_outcome(&outcome),
            Err(e) => tracing::warn!(error = %e, "initial sync failed"),
        }
    }

    if skip {
        frame.skip();
    }

    let bytes = frame
        .select_image(Utc::now())
        .await
        .context("no cached image available")?;

    if output == "-" {
        std::io::stdout().write_all(&bytes)?;
    } else {
        tokio::fs::write(output, &bytes).await?;
        println!("Wrote {} bytes to {}", bytes.len(), output);
    }
    Ok(())
}

async fn run_status(config: &FrameConfig, frame: &PhotoFrame) -> anyhow::Result<()> {
    let ids = frame.cached_ids().await?;
    println!("Album:     {}", config.album_name);
    println!("Cache dir: {}", frame.cache_dir().display());
    println!("Cached:    {} images", ids.len());
    match frame.last_sync_at() {
        Some(at) => println!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync: never (sync state is per-process)"),
    }
    Ok(())
}

//! Curator Node
//!
//! Loads the bot config, connects one ledger client per configured platform
//! and runs the curation cycle on a fixed interval until Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use curator_core::sqlite::DB_FILE_NAME;
use curator_core::{
    resolve_rpc_url, BotConfig, BotContext, BoostTracker, JsonFileBoostStore, PlatformHandle,
    Scheduler, SqliteRecordStore,
};
use graphene_client::GrapheneClient;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

// ==================== CLI ====================

#[derive(Parser, Debug)]
#[command(name = "curator-node")]
#[command(about = "Hive/Steem/Blurt curation bot")]
struct Args {
    /// Bot config file (JSON)
    #[arg(short, long, env = "CURATOR_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Data directory for the record database and boost file
    #[arg(short, long, env = "CURATOR_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Seconds between curation cycles
    #[arg(long, env = "CURATOR_INTERVAL_SECS", default_value = "30")]
    interval_secs: u64,

    /// Also poll incoming transfers for donations
    #[arg(long)]
    watch_donations: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

// ==================== Main ====================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,curator_node=debug,curator_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    info!(config = %args.config.display(), "Starting curator");

    let config = BotConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    info!(hashtag = %config.hashtag, post_limit = config.post_limit, "Config loaded");

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;

    // Storage
    let records = Arc::new(
        SqliteRecordStore::open(&args.data_dir.join(DB_FILE_NAME))
            .context("opening record database")?,
    );
    let boosts = Arc::new(
        BoostTracker::load(Box::new(JsonFileBoostStore::in_dir(&args.data_dir)))
            .context("loading boost file")?,
    );
    info!(active_boosts = boosts.len(), "Storage ready");

    // Ledger clients
    let handles = connect_platforms(&config);
    if handles.is_empty() {
        anyhow::bail!("no platform could be started; check usernames and credentials");
    }

    let ctx = Arc::new(BotContext::new(&config, records, boosts, handles));

    if args.once {
        let reports = ctx.run_cycle().await;
        for report in &reports {
            info!(
                platform = %report.platform,
                fetched = report.fetched,
                voted = report.voted,
                failed = report.failed,
                "Cycle report"
            );
        }
        if args.watch_donations {
            // The first poll only sets each cursor at the head block.
            ctx.poll_donations().await;
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
        }
        let _ = shutdown_tx.send(true);
    });

    let period = Duration::from_secs(args.interval_secs.max(1));
    let curation = Scheduler::new("curation", period);
    let curation_ctx = ctx.clone();
    let curation_run = curation.run(
        move || {
            let ctx = curation_ctx.clone();
            async move {
                ctx.run_cycle().await;
            }
        },
        shutdown_signal(shutdown_rx.clone()),
    );

    info!(interval_secs = period.as_secs(), "Curator running. Ctrl+C to stop.");

    if args.watch_donations {
        let donations = Scheduler::new("donations", period);
        let donation_ctx = ctx.clone();
        let donation_run = donations.run(
            move || {
                let ctx = donation_ctx.clone();
                async move {
                    ctx.poll_donations().await;
                }
            },
            shutdown_signal(shutdown_rx),
        );
        tokio::join!(curation_run, donation_run);
    } else {
        curation_run.await;
    }

    info!("Stopped.");
    Ok(())
}

/// One handle per configured platform; a platform that fails to start is skipped
fn connect_platforms(config: &BotConfig) -> Vec<PlatformHandle> {
    let mut handles = Vec::new();
    for platform in config.enabled_platforms() {
        let Some(section) = config.platform(platform) else {
            continue;
        };
        let rpc_url = resolve_rpc_url(platform, Some(section));
        match GrapheneClient::connect(platform, section, &rpc_url) {
            Ok(client) => handles.push(PlatformHandle::new(section, Arc::new(client))),
            Err(e) => warn!(platform = %platform, error = %e, "Platform disabled"),
        }
    }
    handles
}

fn shutdown_signal(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> {
    async move {
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

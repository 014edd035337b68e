//! relay-broker: runs the broker in-process against simulated relays.
//!
//! Startup seeds one configuration push per relay, then every relay polls for
//! pending work and reports a result while ad-hoc fetch requests keep arriving.
//! The per-relay counts are printed as JSON at the end.

mod simulate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_broker_core::observability::{LoggerConfig, logger_init};
use relay_broker_core::ports::SystemClock;
use relay_broker_core::{BrokerConfig, ReaperLoop, TasksRepository};

#[derive(Debug, Parser)]
#[command(name = "relay-broker", about = "Relay task broker simulation")]
struct Args {
    /// TOML configuration file (defaults apply when it does not exist).
    #[arg(long, default_value = "relay-broker.toml")]
    config: PathBuf,

    /// Number of simulated relays.
    #[arg(long, default_value_t = 3)]
    relays: usize,

    /// Ad-hoc fetch requests submitted per relay.
    #[arg(long, default_value_t = 5)]
    fetches: usize,

    /// Serial of the configuration pushed at startup.
    #[arg(long, default_value = "1")]
    serial: String,

    /// Overrides the configured log format (text|json).
    #[arg(long)]
    log_format: Option<String>,

    /// Overrides the configured log level (EnvFilter directive).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = BrokerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(format) = args.log_format.clone() {
        cfg.logging.format = format;
    }
    if let Some(level) = args.log_level.clone() {
        cfg.logging.level = level;
    }

    let logger = LoggerConfig::try_from(&cfg.logging)?;
    logger_init(&logger)?;

    let repository = Arc::new(TasksRepository::from_config(&cfg, Arc::new(SystemClock))?);
    tracing::info!(
        ttl_seconds = cfg.ttl_seconds,
        max_tasks_per_relay = cfg.max_tasks_per_relay,
        "broker ready"
    );

    let reaper = cfg
        .reaper_interval_seconds
        .map(|secs| ReaperLoop::new(Arc::clone(&repository), Duration::from_secs(secs)).spawn());

    let plan = simulate::Plan {
        relays: args.relays,
        fetches_per_relay: args.fetches,
        serial: args.serial,
    };
    let summary = simulate::run(Arc::clone(&repository), plan).await?;

    if let Some(reaper) = reaper {
        reaper.shutdown_and_join().await;
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

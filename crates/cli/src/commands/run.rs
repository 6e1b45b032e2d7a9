//! Run command: drives the engine from the live market feed.
//!
//! Quotes for the YES and NO tokens stream in over one WebSocket; every
//! merged snapshot rebuilds the ladder around the live mid and the poll
//! interval reconciles the active order set. Orders go to the paper gateway.
//!
//! # Usage
//!
//! ```bash
//! arb-ladder run --yes-token <id> --no-token <id> --duration 1h
//! ```

use anyhow::Result;
use arb_ladder_core::ConnectionStatus;
use arb_ladder_engine::{
    EngineControls, LadderBuilder, LadderEngine, PaperGateway, PaperGatewayConfig,
    SnapshotLadderSource,
};
use arb_ladder_feed::{FeedConfig, FeedEvent, MarketDataFeed};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::shared::{load_config, log_summary, parse_duration, EngineOverrides, RunStats};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// YES token ID (required).
    #[arg(long)]
    pub yes_token: String,

    /// NO token ID (required).
    #[arg(long)]
    pub no_token: String,

    /// Config file path.
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: PathBuf,

    /// Duration to run (e.g., "30m", "4h", "1d").
    #[arg(short, long, default_value = "1h")]
    pub duration: String,

    /// Total stake in dollars (overrides config).
    #[arg(long)]
    pub stake: Option<Decimal>,

    /// Minimum net edge in percent (overrides config).
    #[arg(long)]
    pub min_edge: Option<Decimal>,

    /// Taker fee per leg in percent (overrides config).
    #[arg(long)]
    pub fee: Option<Decimal>,

    /// Stats update interval in seconds.
    #[arg(long, default_value = "60")]
    pub stats_interval_secs: u64,

    /// Start with auto mode off.
    #[arg(long)]
    pub manual: bool,
}

impl RunArgs {
    /// Validates the arguments.
    ///
    /// # Errors
    /// Returns an error if any argument is out of range.
    pub fn validate(&self) -> Result<()> {
        parse_duration(&self.duration)?;

        if self.yes_token.trim().is_empty() || self.no_token.trim().is_empty() {
            anyhow::bail!("--yes-token and --no-token must not be empty");
        }

        if self.yes_token == self.no_token {
            anyhow::bail!("--yes-token and --no-token must differ");
        }

        if self.stats_interval_secs == 0 {
            anyhow::bail!("--stats-interval-secs must be positive");
        }

        Ok(())
    }

    fn overrides(&self) -> EngineOverrides {
        EngineOverrides {
            stake: self.stake,
            min_edge: self.min_edge,
            fee: self.fee,
            paused: false,
            manual: self.manual,
        }
    }
}

/// Runs the run command.
///
/// # Errors
/// Returns an error if the arguments or the config are invalid, or the feed
/// cannot be started.
pub async fn run(args: RunArgs) -> Result<()> {
    args.validate()?;
    let duration = parse_duration(&args.duration)?;
    let config = load_config(&args.config, &args.overrides())?;

    let gateway = Arc::new(PaperGateway::new(PaperGatewayConfig::from(&config.gateway)));
    let mut engine = LadderEngine::new(
        LadderBuilder::from(&config.ladder),
        Box::new(SnapshotLadderSource::new(config.ladder.default_depth)),
        gateway.clone(),
        EngineControls::from_settings(&config.engine, &config.ladder),
    );

    let (mut feed, mut events) = MarketDataFeed::new(FeedConfig::from(&config.feed));
    feed.connect(&[args.yes_token.clone(), args.no_token.clone()])?;

    info!("");
    info!("Ladder engine started (paper gateway)");
    info!(
        stake = %config.engine.total_stake,
        min_net_edge_pct = %config.engine.min_net_edge_pct,
        taker_fee_pct = %config.engine.taker_fee_pct,
        duration = ?duration,
        "   Press Ctrl+C to stop early"
    );
    info!("");

    let poll_interval = Duration::from_millis(config.ladder.poll_interval_ms.max(1));
    let stats_interval = Duration::from_secs(args.stats_interval_secs);
    let deadline = tokio::time::Instant::now() + duration;
    let mut ticker = tokio::time::interval(poll_interval);
    let mut last_stats = tokio::time::Instant::now();
    let mut stats = RunStats::default();
    let mut updates = 0u64;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(FeedEvent::Snapshot(snapshot)) => {
                        engine.on_market_update(&snapshot);
                        updates += 1;
                    }
                    Some(FeedEvent::Status(ConnectionStatus::Error)) => {
                        error!("Market feed gave up reconnecting");
                        break;
                    }
                    Some(FeedEvent::Status(status)) => {
                        info!(%status, "Market feed status");
                    }
                    Some(FeedEvent::ReconnectScheduled { attempt, delay }) => {
                        warn!(attempt, delay_ms = delay.as_millis() as u64, "Market feed reconnect scheduled");
                    }
                    None => {
                        warn!("Market feed channel closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                let outcome = engine.on_tick().await;
                debug!(%outcome, "Tick");
                stats.record(&outcome);

                if last_stats.elapsed() >= stats_interval {
                    info!(updates, status = %feed.status(), "Market feed");
                    log_summary(&engine, &stats);
                    last_stats = tokio::time::Instant::now();
                }
            }
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, stopping...");
                break;
            }
            _ = tokio::time::sleep_until(deadline) => {
                info!("Duration elapsed");
                break;
            }
        }
    }

    feed.disconnect().await;

    log_summary(&engine, &stats);
    if let Err(e) = engine.cancel_all().await {
        warn!(error = %e, "Cancel-all failed on shutdown");
    }

    info!("");
    info!("=== Run Summary ===");
    info!(
        updates,
        ticks = stats.ticks,
        redeploys = stats.redeploys,
        orders_sent = stats.orders_sent,
        deploys_submitted = gateway.deploys_submitted(),
        deploys_rejected = gateway.deploys_rejected(),
        gateway_failures = stats.gateway_failures,
        "Activity"
    );

    Ok(())
}

//! Simulate command: runs the engine against a synthetic order book.
//!
//! The book walks one tick at a time around the reference price, the paper
//! gateway accepts deploys after a simulated round trip and resting orders
//! pick up random partial fills. At the end the cycle is settled and the
//! locked-in profit of the hedged pairs is logged.
//!
//! # Usage
//!
//! ```bash
//! # Five minutes with the config defaults
//! arb-ladder simulate
//!
//! # Reproducible run with a larger stake and a stricter edge filter
//! arb-ladder simulate --seed 42 --stake 1000 --min-edge 1.0 --duration 10m
//! ```

use anyhow::Result;
use arb_ladder_engine::{
    ActiveLadderOrder, EngineControls, LadderBuilder, LadderEngine, PaperGateway,
    PaperGatewayConfig, SyntheticLadderSource,
};
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::shared::{load_config, log_summary, parse_duration, EngineOverrides, RunStats};

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Config file path.
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: PathBuf,

    /// Duration to run (e.g., "30s", "5m", "1h").
    #[arg(short, long, default_value = "5m")]
    pub duration: String,

    /// Random seed for the book, the gateway and the fills.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Total stake in dollars (overrides config).
    #[arg(long)]
    pub stake: Option<Decimal>,

    /// Minimum net edge in percent (overrides config).
    #[arg(long)]
    pub min_edge: Option<Decimal>,

    /// Taker fee per leg in percent (overrides config).
    #[arg(long)]
    pub fee: Option<Decimal>,

    /// Starting reference price of the synthetic book.
    #[arg(long, default_value = "0.50")]
    pub reference: Decimal,

    /// Probability (0.0 to 1.0) that a resting order fills partially per tick.
    #[arg(long, default_value = "0.05")]
    pub fill_rate: f64,

    /// Stats update interval in seconds.
    #[arg(long, default_value = "30")]
    pub stats_interval_secs: u64,

    /// Start with auto mode off.
    #[arg(long)]
    pub manual: bool,

    /// Start paused.
    #[arg(long)]
    pub paused: bool,
}

impl SimulateArgs {
    /// Validates the arguments.
    ///
    /// # Errors
    /// Returns an error if any argument is out of range.
    pub fn validate(&self) -> Result<()> {
        parse_duration(&self.duration)?;

        if self.reference <= Decimal::ZERO || self.reference >= Decimal::ONE {
            anyhow::bail!("--reference must be between 0 and 1 exclusive");
        }

        if !(0.0..=1.0).contains(&self.fill_rate) {
            anyhow::bail!("--fill-rate must be between 0.0 and 1.0");
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
            paused: self.paused,
            manual: self.manual,
        }
    }
}

/// Runs the simulate command.
///
/// # Errors
/// Returns an error if the arguments or the config are invalid.
pub async fn run(args: SimulateArgs) -> Result<()> {
    args.validate()?;
    let duration = parse_duration(&args.duration)?;
    let config = load_config(&args.config, &args.overrides())?;

    let source = SyntheticLadderSource::new(args.reference, config.ladder.default_depth, args.seed)
        .with_tick_size(config.ladder.tick_size);

    let mut gateway_config = PaperGatewayConfig::from(&config.gateway);
    if let Some(seed) = args.seed {
        gateway_config = gateway_config.seed(seed);
    }
    let gateway = Arc::new(PaperGateway::new(gateway_config));

    let mut engine = LadderEngine::new(
        LadderBuilder::from(&config.ladder),
        Box::new(source),
        gateway.clone(),
        EngineControls::from_settings(&config.engine, &config.ladder),
    );

    let mut fill_rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    info!("");
    info!("Simulation started");
    info!(
        reference = %args.reference,
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
    let mut fills = 0u64;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.refresh();
                let outcome = engine.on_tick().await;
                debug!(%outcome, "Tick");
                stats.record(&outcome);

                fills += simulate_fills(&mut engine, &mut fill_rng, args.fill_rate);

                if last_stats.elapsed() >= stats_interval {
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

    log_summary(&engine, &stats);
    let settlement = engine.settle_cycle();

    if let Err(e) = engine.cancel_all().await {
        warn!(error = %e, "Cancel-all failed on shutdown");
    }

    info!("");
    info!("=== Simulation Summary ===");
    info!(
        ticks = stats.ticks,
        redeploys = stats.redeploys,
        orders_sent = stats.orders_sent,
        deploys_submitted = gateway.deploys_submitted(),
        deploys_rejected = gateway.deploys_rejected(),
        fills,
        "Activity"
    );
    info!(
        orders_removed = settlement.orders_removed,
        hedged_pairs = %settlement.hedged_pairs,
        locked_in = %settlement.locked_in,
        "Settlement"
    );

    Ok(())
}

/// Applies random partial fills to resting orders. Returns the number of
/// fills applied.
fn simulate_fills(engine: &mut LadderEngine, rng: &mut StdRng, fill_rate: f64) -> u64 {
    if fill_rate <= 0.0 {
        return 0;
    }

    let candidates: Vec<ActiveLadderOrder> = engine
        .active_orders()
        .iter()
        .filter(|o| !o.status.is_terminal())
        .cloned()
        .collect();

    let mut applied = 0;
    for order in candidates {
        if rng.gen::<f64>() >= fill_rate {
            continue;
        }
        let quantity = fill_quantity(order.remaining_shares(), rng.gen_range(1..=100));
        if quantity.is_zero() {
            continue;
        }
        if let Some(status) = engine.record_fill(order.id, quantity) {
            debug!(
                side = %order.side,
                level = %order.level_price,
                quantity = %quantity,
                %status,
                "Simulated fill"
            );
            applied += 1;
        }
    }
    applied
}

/// Whole shares for a fill of `percent` of the remaining size, at least one.
fn fill_quantity(remaining: Decimal, percent: u32) -> Decimal {
    if remaining <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let quantity = (remaining * Decimal::from(percent) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::ToZero);
    quantity.max(Decimal::ONE).min(remaining)
}

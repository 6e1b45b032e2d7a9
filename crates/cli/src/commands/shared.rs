//! Helpers shared by the `simulate` and `run` commands.

use anyhow::{anyhow, Result};
use arb_ladder_core::{AppConfig, ConfigLoader};
use arb_ladder_engine::{LadderEngine, ReconcileOutcome};
use rust_decimal::Decimal;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Parses a duration string like "30s", "5m", "2h", "1d" or "500ms".
///
/// # Errors
/// Returns an error if the format is invalid.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let (num_str, unit) = match s.strip_suffix("ms") {
        Some(num_str) => (num_str, "ms"),
        None => {
            let split_idx = s
                .chars()
                .position(|c| !c.is_ascii_digit())
                .ok_or_else(|| anyhow!("Duration must have a unit (ms, s, m, h, d)"))?;
            (&s[..split_idx], &s[split_idx..])
        }
    };

    if num_str.is_empty() {
        return Err(anyhow!("Duration must start with a number"));
    }

    let value: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    if value == 0 {
        return Err(anyhow!("Duration cannot be zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        "d" => Ok(Duration::from_secs(value * 86400)),
        _ => Err(anyhow!("Unknown duration unit: {}. Use ms, s, m, h, or d", unit)),
    }
}

/// Engine overrides accepted on the command line.
#[derive(Debug, Clone, Default)]
pub struct EngineOverrides {
    pub stake: Option<Decimal>,
    pub min_edge: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub paused: bool,
    pub manual: bool,
}

/// Loads the config file (plus `ARB_` env vars) and applies CLI overrides.
///
/// # Errors
/// Returns an error if the config cannot be parsed or an override is out of
/// range.
pub fn load_config(path: &Path, overrides: &EngineOverrides) -> Result<AppConfig> {
    let mut config = ConfigLoader::load_from(path)?;

    if let Some(stake) = overrides.stake {
        if stake <= Decimal::ZERO {
            anyhow::bail!("--stake must be positive");
        }
        config.engine.total_stake = stake;
    }
    if let Some(min_edge) = overrides.min_edge {
        config.engine.min_net_edge_pct = min_edge;
    }
    if let Some(fee) = overrides.fee {
        if fee < Decimal::ZERO || fee > Decimal::ONE_HUNDRED {
            anyhow::bail!("--fee must be between 0 and 100");
        }
        config.engine.taker_fee_pct = fee;
    }
    if overrides.paused {
        config.engine.paused = true;
    }
    if overrides.manual {
        config.engine.auto_enabled = false;
    }

    Ok(config)
}

/// Tick outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub redeploys: u64,
    pub orders_sent: u64,
    pub unchanged: u64,
    pub cleared: u64,
    pub skipped: u64,
    pub gateway_failures: u64,
}

impl RunStats {
    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        self.ticks += 1;
        match outcome {
            ReconcileOutcome::Redeployed { count, .. } => {
                self.redeploys += 1;
                self.orders_sent += *count as u64;
            }
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::Cleared { .. } => self.cleared += 1,
            ReconcileOutcome::Skipped(_) => self.skipped += 1,
            ReconcileOutcome::GatewayFailed { .. } => self.gateway_failures += 1,
        }
    }
}

/// Logs a one-line summary of the engine state.
pub fn log_summary(engine: &LadderEngine, stats: &RunStats) {
    let view = engine.view();
    let profitable = view.levels.iter().filter(|l| l.edge.is_profitable).count();
    let best = view
        .levels
        .iter()
        .map(|l| l.edge.net_edge_pct)
        .max()
        .unwrap_or_default();

    info!(
        reference = ?view.reference_price,
        levels = view.levels.len(),
        profitable,
        best_net_edge_pct = %best.round_dp(2),
        active_orders = view.active_orders.len(),
        committed = %view.committed().round_dp(2),
        expected_arb = %view.expected_arb().round_dp(2),
        out_of_range = view.out_of_range,
        ticks = stats.ticks,
        redeploys = stats.redeploys,
        unchanged = stats.unchanged,
        cleared = stats.cleared,
        gateway_failures = stats.gateway_failures,
        "Ladder summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_ladder_engine::SkipReason;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2H").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("5w").is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let overrides = EngineOverrides {
            stake: Some(dec!(500)),
            min_edge: Some(dec!(1.25)),
            fee: Some(dec!(0.2)),
            paused: true,
            manual: true,
        };
        let config = load_config(Path::new("does/not/exist.toml"), &overrides).unwrap();
        assert_eq!(config.engine.total_stake, dec!(500));
        assert_eq!(config.engine.min_net_edge_pct, dec!(1.25));
        assert_eq!(config.engine.taker_fee_pct, dec!(0.2));
        assert!(config.engine.paused);
        assert!(!config.engine.auto_enabled);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let overrides = EngineOverrides {
            stake: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(load_config(Path::new("does/not/exist.toml"), &overrides).is_err());

        let overrides = EngineOverrides {
            fee: Some(dec!(150)),
            ..Default::default()
        };
        assert!(load_config(Path::new("does/not/exist.toml"), &overrides).is_err());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = RunStats::default();
        stats.record(&ReconcileOutcome::Redeployed { count: 14, levels: 7 });
        stats.record(&ReconcileOutcome::Unchanged);
        stats.record(&ReconcileOutcome::Skipped(SkipReason::Paused));
        stats.record(&ReconcileOutcome::GatewayFailed {
            reason: "down".into(),
        });

        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.redeploys, 1);
        assert_eq!(stats.orders_sent, 14);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.gateway_failures, 1);
    }
}

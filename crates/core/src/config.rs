use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default Polymarket CLOB market channel.
pub const DEFAULT_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedSettings,
    pub ladder: LadderSettings,
    pub engine: EngineSettings,
    pub gateway: GatewaySettings,
}

/// Market-data connection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub url: String,
    pub ping_interval_ms: u64,
    /// Base of the exponential reconnect backoff.
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub channel_buffer_size: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            ping_interval_ms: 10_000,
            reconnect_base_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            channel_buffer_size: 1_000,
        }
    }
}

/// Ladder geometry and refresh cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderSettings {
    /// Levels generated above and below the reference price.
    pub ticks_each_side: u32,
    pub tick_size: Decimal,
    /// Size assumed at each level when the source has no depth data.
    pub default_depth: Decimal,
    pub poll_interval_ms: u64,
    /// Drift (in percent) of the feed's executable price from the ladder
    /// reference beyond which the ladder is flagged out of range.
    pub range_tolerance_pct: Decimal,
}

impl Default for LadderSettings {
    fn default() -> Self {
        Self {
            ticks_each_side: 20,
            tick_size: dec!(0.01),
            default_depth: dec!(500),
            poll_interval_ms: 500,
            range_tolerance_pct: dec!(15),
        }
    }
}

/// Operator inputs consumed by the reconciler and sizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Total stake in USD spread across deployed tiers.
    pub total_stake: Decimal,
    pub min_net_edge_pct: Decimal,
    /// Taker fee charged on each leg, in percent.
    pub taker_fee_pct: Decimal,
    pub auto_enabled: bool,
    pub paused: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            total_stake: dec!(250),
            min_net_edge_pct: dec!(0.5),
            taker_fee_pct: dec!(0.4),
            auto_enabled: true,
            paused: false,
        }
    }
}

/// Paper gateway simulation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Simulated exchange round trip per call.
    pub latency_ms: u64,
    /// Probability (0.0 to 1.0) that a deploy is rejected.
    pub reject_rate: f64,
    pub seed: Option<u64>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            latency_ms: 150,
            reject_rate: 0.0,
            seed: None,
        }
    }
}

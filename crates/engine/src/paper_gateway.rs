//! Paper-trading gateway.
//!
//! Accepts or rejects deploys at random, sleeps for a configurable round
//! trip and keeps the resting order set in memory. Nothing leaves the
//! process.
//!
//! # Example
//!
//! ```
//! use arb_ladder_engine::gateway::OrderGateway;
//! use arb_ladder_engine::paper_gateway::{PaperGateway, PaperGatewayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = PaperGateway::new(PaperGatewayConfig::instant());
//!     let cancelled = gateway.cancel_all().await.unwrap();
//!     assert_eq!(cancelled, 0);
//! }
//! ```

use crate::gateway::{DeployAck, DeployMode, GatewayError, OrderGateway};
use crate::types::ActiveLadderOrder;
use arb_ladder_core::GatewaySettings;
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Simulation knobs for [`PaperGateway`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperGatewayConfig {
    /// Simulated exchange round trip per call, in milliseconds.
    pub latency_ms: u64,

    /// Probability (0.0 to 1.0) that a deploy is rejected.
    pub reject_rate: f64,

    /// Optional random seed for reproducible runs.
    pub random_seed: Option<u64>,
}

impl Default for PaperGatewayConfig {
    fn default() -> Self {
        Self {
            latency_ms: 150,
            reject_rate: 0.0,
            random_seed: None,
        }
    }
}

impl From<&GatewaySettings> for PaperGatewayConfig {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            latency_ms: settings.latency_ms,
            reject_rate: settings.reject_rate.clamp(0.0, 1.0),
            random_seed: settings.seed,
        }
    }
}

impl PaperGatewayConfig {
    /// No latency, never rejects.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            latency_ms: 0,
            ..Default::default()
        }
    }

    /// Rejects every deploy.
    #[must_use]
    pub fn always_reject() -> Self {
        Self {
            latency_ms: 0,
            reject_rate: 1.0,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn reject_rate(mut self, rate: f64) -> Self {
        self.reject_rate = rate.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
}

// =============================================================================
// Internal State
// =============================================================================

#[derive(Debug, Default)]
struct PaperState {
    resting: Vec<ActiveLadderOrder>,
    deploys_submitted: u32,
    deploys_rejected: u32,
    cancel_calls: u32,
}

// =============================================================================
// Paper Gateway
// =============================================================================

/// In-memory [`OrderGateway`] for simulation and tests.
///
/// Thread-safe; state sits behind a read-write lock.
pub struct PaperGateway {
    config: PaperGatewayConfig,
    state: Arc<RwLock<PaperState>>,
    rng: Arc<RwLock<StdRng>>,
}

impl std::fmt::Debug for PaperGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperGateway")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PaperGateway {
    #[must_use]
    pub fn new(config: PaperGatewayConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            state: Arc::new(RwLock::new(PaperState::default())),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PaperGatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn deploys_submitted(&self) -> u32 {
        self.state.read().deploys_submitted
    }

    #[must_use]
    pub fn deploys_rejected(&self) -> u32 {
        self.state.read().deploys_rejected
    }

    #[must_use]
    pub fn cancel_calls(&self) -> u32 {
        self.state.read().cancel_calls
    }

    /// Copy of the orders currently resting.
    #[must_use]
    pub fn resting_orders(&self) -> Vec<ActiveLadderOrder> {
        self.state.read().resting.clone()
    }

    fn should_reject(&self) -> bool {
        self.rng.write().gen::<f64>() < self.config.reject_rate
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn deploy(&self, orders: &[ActiveLadderOrder], mode: DeployMode) -> Result<DeployAck, GatewayError> {
        self.simulate_latency().await;

        let reject = self.should_reject();
        let mut state = self.state.write();
        state.deploys_submitted += 1;

        if reject {
            state.deploys_rejected += 1;
            debug!(orders = orders.len(), %mode, "Paper deploy rejected");
            return Ok(DeployAck::rejected("Simulated venue rejection"));
        }

        if mode == DeployMode::Replace {
            state.resting.clear();
        }
        state.resting.extend(orders.iter().cloned());
        info!(
            orders = orders.len(),
            resting = state.resting.len(),
            %mode,
            "Paper deploy accepted"
        );
        Ok(DeployAck::Accepted)
    }

    async fn cancel_all(&self) -> Result<u32, GatewayError> {
        self.simulate_latency().await;

        let mut state = self.state.write();
        state.cancel_calls += 1;
        let cancelled = u32::try_from(state.resting.len()).unwrap_or(u32::MAX);
        state.resting.clear();
        info!(cancelled, "Paper cancel-all");
        Ok(cancelled)
    }
}

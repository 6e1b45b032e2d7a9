//! Single-owner driver tying the ladder pipeline together.
//!
//! # Architecture
//!
//! ```text
//!  MarketSnapshot ──► on_market_update ─┐
//!                                       ├─► LadderBuilder ─► EdgeCalculator ─► AnnotatedLadder
//!  poll interval  ──► refresh ──────────┘                                           │
//!                                                                                   ▼
//!                     on_tick ──► LadderReconciler::plan ──► OrderGateway ──► commit
//!                     deploy_level / quick_deploy / confirm_pair (manual paths)
//! ```
//!
//! Every method runs on the caller's task. Ladder building, edge evaluation
//! and planning are synchronous; only gateway calls suspend. A tick always
//! plans from the ladder produced by the latest update or refresh.
//!
//! # Example
//!
//! ```no_run
//! use arb_ladder_engine::engine::{EngineControls, LadderEngine};
//! use arb_ladder_engine::ladder::{LadderBuilder, SyntheticLadderSource};
//! use arb_ladder_engine::paper_gateway::{PaperGateway, PaperGatewayConfig};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut engine = LadderEngine::new(
//!         LadderBuilder::default(),
//!         Box::new(SyntheticLadderSource::new(dec!(0.50), dec!(500), Some(1))),
//!         Arc::new(PaperGateway::new(PaperGatewayConfig::default())),
//!         EngineControls::default(),
//!     );
//!
//!     engine.refresh();
//!     let outcome = engine.on_tick().await;
//!     println!("{outcome}");
//! }
//! ```

use crate::edge::{AnnotatedLadder, AnnotatedLevel, EdgeCalculator};
use crate::gateway::{DeployAck, DeployMode, GatewayError, OrderGateway};
use crate::ladder::{check_range, Ladder, LadderBuilder, LevelQuoteSource, RangeCheck};
use crate::reconciler::{DeployPlan, DeployRejection, LadderReconciler, ReconcilePlan, Settlement, SkipReason};
use crate::selection::{PairedArbSelection, PairedSelectionFlow, SelectionRejection};
use crate::types::{ActiveLadderOrder, LadderOrderStatus};
use arb_ladder_core::{EngineSettings, LadderSettings, MarketSnapshot, TokenSide};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Operator inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineControls {
    pub total_stake: Decimal,
    pub min_net_edge_pct: Decimal,
    pub taker_fee_pct: Decimal,
    pub auto_enabled: bool,
    pub paused: bool,
    pub range_tolerance_pct: Decimal,
}

impl Default for EngineControls {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default(), &LadderSettings::default())
    }
}

impl EngineControls {
    #[must_use]
    pub fn from_settings(engine: &EngineSettings, ladder: &LadderSettings) -> Self {
        Self {
            total_stake: engine.total_stake,
            min_net_edge_pct: engine.min_net_edge_pct,
            taker_fee_pct: engine.taker_fee_pct,
            auto_enabled: engine.auto_enabled,
            paused: engine.paused,
            range_tolerance_pct: ladder.range_tolerance_pct,
        }
    }
}

/// What an auto-mode tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Skipped(SkipReason),
    /// No profitable levels; `removed` orders were dropped.
    Cleared { removed: usize },
    Unchanged,
    Redeployed { count: usize, levels: usize },
    /// The gateway refused or failed. Nothing changed; the next tick retries.
    GatewayFailed { reason: String },
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            ReconcileOutcome::Cleared { removed } => write!(f, "cleared {removed} orders"),
            ReconcileOutcome::Unchanged => write!(f, "unchanged"),
            ReconcileOutcome::Redeployed { count, levels } => {
                write!(f, "redeployed {count} orders over {levels} levels")
            }
            ReconcileOutcome::GatewayFailed { reason } => write!(f, "gateway failed: {reason}"),
        }
    }
}

/// Errors from manual deploy paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error(transparent)]
    Rejected(#[from] DeployRejection),

    #[error(transparent)]
    Selection(#[from] SelectionRejection),

    #[error("Gateway rejected deploy: {0}")]
    GatewayRejected(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Everything a presentation layer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct EngineView {
    pub reference_price: Option<Decimal>,
    pub levels: Vec<AnnotatedLevel>,
    pub active_orders: Vec<ActiveLadderOrder>,
    pub selection: Option<PairedArbSelection>,
    pub range: RangeCheck,
    pub out_of_range: bool,
    pub busy: bool,
    pub auto_enabled: bool,
    pub paused: bool,
}

impl EngineView {
    /// Sum of expected arb profit over active orders, counting each pair once.
    #[must_use]
    pub fn expected_arb(&self) -> Decimal {
        self.active_orders
            .iter()
            .filter(|o| o.side == TokenSide::Yes)
            .map(|o| o.arb_amount)
            .sum()
    }

    /// Dollars committed across active orders.
    #[must_use]
    pub fn committed(&self) -> Decimal {
        self.active_orders.iter().map(ActiveLadderOrder::notional).sum()
    }
}

/// Drives ladder construction, reconciliation and the manual deploy paths.
pub struct LadderEngine {
    builder: LadderBuilder,
    source: Box<dyn LevelQuoteSource>,
    gateway: Arc<dyn OrderGateway>,
    controls: EngineControls,
    reconciler: LadderReconciler,
    selection: PairedSelectionFlow,
    ladder: Ladder,
    annotated: AnnotatedLadder,
    snapshot: Option<MarketSnapshot>,
    range: RangeCheck,
    busy: Arc<AtomicBool>,
}

/// Holds the busy flag up until dropped, including when the owning future
/// is cancelled mid-call.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for LadderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LadderEngine")
            .field("builder", &self.builder)
            .field("controls", &self.controls)
            .field("levels", &self.annotated.len())
            .field("active_orders", &self.reconciler.active_orders().len())
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

impl LadderEngine {
    #[must_use]
    pub fn new(
        builder: LadderBuilder,
        source: Box<dyn LevelQuoteSource>,
        gateway: Arc<dyn OrderGateway>,
        controls: EngineControls,
    ) -> Self {
        Self {
            builder,
            source,
            gateway,
            reconciler: LadderReconciler::new(controls.auto_enabled),
            controls,
            selection: PairedSelectionFlow::new(),
            ladder: Ladder::empty(),
            annotated: AnnotatedLadder::default(),
            snapshot: None,
            range: RangeCheck::Unknown,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    // ==================== Inputs ====================

    /// Feeds a merged top-of-book update and rebuilds the ladder.
    pub fn on_market_update(&mut self, snapshot: &MarketSnapshot) -> AnnotatedLadder {
        self.source.on_snapshot(snapshot);
        self.snapshot = Some(snapshot.clone());
        self.rebuild()
    }

    /// Rebuilds the ladder on the poll interval without new market data.
    pub fn refresh(&mut self) -> AnnotatedLadder {
        self.source.poll();
        self.rebuild()
    }

    fn rebuild(&mut self) -> AnnotatedLadder {
        if let Some(ladder) = self.builder.build(self.source.as_mut()) {
            self.ladder = ladder;
        }
        self.reannotate();
        self.annotated.clone()
    }

    fn reannotate(&mut self) {
        self.annotated = self.edge_calculator().annotate(&self.ladder);
        let was_out = self.range.is_out_of_range();
        self.range = match &self.snapshot {
            Some(snapshot) if !self.ladder.is_empty() => {
                check_range(self.ladder.reference_price(), snapshot, self.controls.range_tolerance_pct)
            }
            _ => RangeCheck::Unknown,
        };
        if self.range.is_out_of_range() && !was_out {
            warn!(
                reference = %self.ladder.reference_price(),
                drift_pct = ?self.range.drift_pct(),
                "Ladder out of range of live market"
            );
        }
    }

    // ==================== Auto mode ====================

    /// Reconciles the active set against the current ladder.
    ///
    /// When nothing is profitable any more, resting orders are cancelled at
    /// the gateway before the active set is dropped.
    ///
    /// Gateway failures are reported in the outcome, never as errors; the
    /// active set and fingerprint stay as they were so the next tick retries.
    pub async fn on_tick(&mut self) -> ReconcileOutcome {
        let plan = self
            .reconciler
            .plan(&self.annotated, self.controls.total_stake, self.controls.paused);

        match plan {
            ReconcilePlan::Skip(reason) => ReconcileOutcome::Skipped(reason),
            ReconcilePlan::Unchanged => ReconcileOutcome::Unchanged,
            ReconcilePlan::Clear => {
                if self.reconciler.active_orders().is_empty() {
                    self.reconciler.clear();
                    return ReconcileOutcome::Cleared { removed: 0 };
                }
                match self.cancel_at_gateway().await {
                    Ok(_) => {
                        let removed = self.reconciler.take_cancelled().len();
                        info!(removed, "No profitable levels, cancelled active orders");
                        ReconcileOutcome::Cleared { removed }
                    }
                    Err(err) => {
                        warn!(error = %err, "Auto clear failed, will retry next tick");
                        ReconcileOutcome::GatewayFailed {
                            reason: err.to_string(),
                        }
                    }
                }
            }
            ReconcilePlan::Deploy(plan) => match self.submit(plan, DeployMode::Replace).await {
                Ok((count, levels)) => ReconcileOutcome::Redeployed { count, levels },
                Err(err) => {
                    warn!(error = %err, "Auto deploy failed, will retry next tick");
                    ReconcileOutcome::GatewayFailed {
                        reason: err.to_string(),
                    }
                }
            },
        }
    }

    /// Sends a plan through the gateway and commits it on acceptance.
    async fn submit(&mut self, plan: DeployPlan, mode: DeployMode) -> Result<(usize, usize), DeployError> {
        let count = plan.orders.len();
        let levels = plan.levels;

        match self.gateway.deploy(&plan.orders, mode).await? {
            DeployAck::Accepted => {
                info!(
                    orders = count,
                    levels,
                    fingerprint = %plan.fingerprint,
                    "Deployed ladder"
                );
                self.reconciler.commit(plan);
                Ok((count, levels))
            }
            DeployAck::Rejected { reason } => Err(DeployError::GatewayRejected(reason)),
        }
    }

    // ==================== Manual paths ====================

    /// Deploys the top levels with the clicked level forced in, replacing
    /// the active set.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Rejected`] with the observed prices if the
    /// level is unknown or unprofitable, or a gateway error. The active set
    /// is unchanged on any error.
    pub async fn deploy_level(&mut self, level_price: Decimal) -> Result<usize, DeployError> {
        let plan = self
            .reconciler
            .plan_for_level(&self.annotated, level_price, self.controls.total_stake)
            .map_err(|rejection| {
                info!(%rejection, "Level deploy rejected");
                rejection
            })?;
        self.submit(plan, DeployMode::Replace).await.map(|(count, _)| count)
    }

    /// Deploys the current top levels once, even if unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Rejected`] when nothing is profitable, or a
    /// gateway error.
    pub async fn quick_deploy(&mut self) -> Result<usize, DeployError> {
        let plan = self
            .reconciler
            .plan_once(&self.annotated, self.controls.total_stake)?;
        self.submit(plan, DeployMode::Replace).await.map(|(count, _)| count)
    }

    /// Stages a paired selection at a level.
    ///
    /// # Errors
    ///
    /// Returns a [`SelectionRejection`] if the level is unknown or
    /// unprofitable.
    pub fn select_pair(&mut self, level_price: Decimal) -> Result<PairedArbSelection, SelectionRejection> {
        self.selection
            .select(&self.annotated, level_price, self.controls.total_stake)
            .cloned()
    }

    /// Submits the staged pair and appends it to the active set.
    ///
    /// The selection is only cleared once the gateway accepts.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Selection`] when nothing is staged, or a
    /// gateway error.
    pub async fn confirm_pair(&mut self) -> Result<Vec<ActiveLadderOrder>, DeployError> {
        let orders = self.selection.preview_orders()?;

        match self.gateway.deploy(&orders, DeployMode::Append).await? {
            DeployAck::Accepted => {
                self.selection.clear();
                info!(
                    level = %orders[0].level_price,
                    yes_shares = %orders[0].shares,
                    no_shares = %orders[1].shares,
                    "Paired arb deployed"
                );
                self.reconciler.append(orders.iter().cloned());
                Ok(orders.to_vec())
            }
            DeployAck::Rejected { reason } => Err(DeployError::GatewayRejected(reason)),
        }
    }

    /// Discards the staged pair.
    pub fn cancel_pair(&mut self) -> Option<PairedArbSelection> {
        self.selection.cancel()
    }

    /// Clears local state, then cancels everything at the gateway.
    ///
    /// The busy flag is raised for the duration of the gateway call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway call fails. Local state is
    /// cleared regardless.
    pub async fn cancel_all(&mut self) -> Result<u32, GatewayError> {
        let orders = self.reconciler.take_cancelled();
        let cancelled = orders
            .iter()
            .filter(|o| o.status == LadderOrderStatus::Cancelled)
            .count();
        self.selection.clear();
        info!(removed = orders.len(), cancelled, "Cancel-all requested");

        let result = self.cancel_at_gateway().await;
        if let Err(err) = &result {
            warn!(error = %err, "Gateway cancel-all failed");
        }
        result
    }

    /// Calls the gateway's cancel-all with the busy flag raised.
    async fn cancel_at_gateway(&mut self) -> Result<u32, GatewayError> {
        let _busy = BusyGuard::raise(&self.busy);
        self.gateway.cancel_all().await
    }

    // ==================== Fills ====================

    /// Records a fill reported for an active order.
    pub fn record_fill(&mut self, order_id: Uuid, shares: Decimal) -> Option<LadderOrderStatus> {
        self.reconciler.record_fill(order_id, shares)
    }

    /// Removes every order and reports the locked-in profit of hedged pairs.
    pub fn settle_cycle(&mut self) -> Settlement {
        let settlement = self.reconciler.settle_cycle();
        info!(
            orders = settlement.orders_removed,
            hedged_pairs = %settlement.hedged_pairs,
            locked_in = %settlement.locked_in,
            "Cycle settled"
        );
        settlement
    }

    // ==================== Controls ====================

    pub fn set_auto_enabled(&mut self, enabled: bool) {
        self.controls.auto_enabled = enabled;
        self.reconciler.set_enabled(enabled);
        debug!(enabled, "Auto mode toggled");
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.controls.paused = paused;
        debug!(paused, "Pause toggled");
    }

    /// Sets the stake. Negative values are treated as zero.
    pub fn set_total_stake(&mut self, stake: Decimal) {
        self.controls.total_stake = stake.max(Decimal::ZERO);
    }

    /// Sets the profitability threshold and re-evaluates the current ladder.
    pub fn set_min_net_edge_pct(&mut self, pct: Decimal) {
        self.controls.min_net_edge_pct = pct;
        self.reannotate();
    }

    /// Sets the per-leg taker fee and re-evaluates the current ladder.
    pub fn set_taker_fee_pct(&mut self, pct: Decimal) {
        self.controls.taker_fee_pct = pct.clamp(Decimal::ZERO, dec!(100));
        self.reannotate();
    }

    // ==================== Outputs ====================

    #[must_use]
    pub fn controls(&self) -> &EngineControls {
        &self.controls
    }

    #[must_use]
    pub fn edge_calculator(&self) -> EdgeCalculator {
        EdgeCalculator::new(self.controls.taker_fee_pct, self.controls.min_net_edge_pct)
    }

    #[must_use]
    pub fn ladder(&self) -> &AnnotatedLadder {
        &self.annotated
    }

    #[must_use]
    pub fn active_orders(&self) -> Arc<Vec<ActiveLadderOrder>> {
        self.reconciler.active_orders()
    }

    #[must_use]
    pub fn selection(&self) -> Option<&PairedArbSelection> {
        self.selection.pending()
    }

    #[must_use]
    pub fn range(&self) -> RangeCheck {
        self.range
    }

    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        self.range.is_out_of_range()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Shared handle to the busy flag, for observers on other tasks.
    #[must_use]
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    #[must_use]
    pub fn view(&self) -> EngineView {
        EngineView {
            reference_price: (!self.annotated.is_empty()).then(|| self.annotated.reference_price()),
            levels: self.annotated.levels().to_vec(),
            active_orders: self.reconciler.active_orders().as_ref().clone(),
            selection: self.selection.pending().cloned(),
            range: self.range,
            out_of_range: self.range.is_out_of_range(),
            busy: self.is_busy(),
            auto_enabled: self.controls.auto_enabled,
            paused: self.controls.paused,
        }
    }
}

//! Auto-mode reconciliation of the active order set against each tick's
//! ladder.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   plan()    ┌──────────────┐  gateway ok   ┌──────────┐
//! │ AnnotatedLadder│ ──────────► │ ReconcilePlan│ ────────────► │ commit() │
//! └────────────────┘             └──────────────┘               └──────────┘
//!                                 Skip | Clear | Unchanged | Deploy
//! ```
//!
//! Planning is pure; nothing changes until the caller commits, so a failed
//! gateway call leaves both the active set and the fingerprint untouched.
//!
//! The fingerprint is the ordered `(level_price, yes_ask, no_ask)` list of
//! the selected levels. A tick whose fingerprint equals the last deployed
//! one is a no-op, which keeps an unchanged market from churning orders.

use crate::edge::{rank_order, AnnotatedLadder, AnnotatedLevel};
use crate::sizing::{TieredSizer, MAX_TIERS};
use crate::types::{ActiveLadderOrder, LadderOrderStatus};
use arb_ladder_core::TokenSide;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Identity of a selected level set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<(Decimal, Decimal, Decimal)>);

impl Fingerprint {
    #[must_use]
    pub fn from_levels(levels: &[&AnnotatedLevel]) -> Self {
        Self(
            levels
                .iter()
                .map(|l| (l.level.reference_price, l.level.yes_ask_price, l.level.no_ask_price))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[(Decimal, Decimal, Decimal)] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (level, yes, no)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{level}:{yes}/{no}")?;
        }
        Ok(())
    }
}

/// A sized replacement for the active set.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub fingerprint: Fingerprint,
    /// Two legs per level, tier 1 first.
    pub orders: Vec<ActiveLadderOrder>,
    pub levels: usize,
}

/// Why a tick was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Paused,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "auto mode disabled"),
            SkipReason::Paused => write!(f, "paused"),
        }
    }
}

/// What a tick should do to the active set.
#[derive(Debug, Clone)]
pub enum ReconcilePlan {
    Skip(SkipReason),
    /// No profitable levels: drop everything.
    Clear,
    /// Same levels at the same prices as the last deploy.
    Unchanged,
    Deploy(DeployPlan),
}

/// A manual deploy that was refused. No orders were created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployRejection {
    /// The clicked price is not a level of the current ladder.
    #[error("No ladder level at {0}")]
    UnknownLevel(Decimal),

    /// The clicked level does not clear the minimum net edge.
    #[error(
        "Level {level_price} not profitable: YES {yes_ask} + NO {no_ask} = {total_cost} (net edge {net_edge_pct}%)"
    )]
    NotProfitable {
        level_price: Decimal,
        yes_ask: Decimal,
        no_ask: Decimal,
        total_cost: Decimal,
        net_edge_pct: Decimal,
    },

    /// Nothing on the ladder is profitable.
    #[error("No profitable levels to deploy")]
    NoProfitableLevels,

    /// The stake is too small to buy a single pair at any selected level.
    #[error("Stake {0} too small to buy a single pair")]
    StakeTooSmall(Decimal),
}

/// Outcome of settling a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    pub orders_removed: usize,
    /// Pairs where both legs filled.
    pub hedged_pairs: Decimal,
    /// Profit locked in by the hedged pairs, before fees.
    pub locked_in: Decimal,
}

/// Top `MAX_TIERS` profitable levels, best first.
#[must_use]
pub fn select_levels(ladder: &AnnotatedLadder) -> Vec<&AnnotatedLevel> {
    let mut ranked = ladder.ranked_profitable();
    ranked.truncate(MAX_TIERS);
    ranked
}

/// Sizes ranked levels into YES/NO leg pairs.
///
/// Per level, `shares = floor(tier_dollars / total_cost)`; levels that
/// cannot afford a single pair are left out.
#[must_use]
pub fn build_orders(levels: &[&AnnotatedLevel], total_stake: Decimal) -> Vec<ActiveLadderOrder> {
    let allocations = TieredSizer::allocate(total_stake, levels.len());
    let mut orders = Vec::with_capacity(levels.len() * 2);

    for (level, allocation) in levels.iter().zip(allocations) {
        let total_cost = level.edge.total_cost;
        if total_cost <= Decimal::ZERO {
            continue;
        }
        let shares = (allocation.dollars / total_cost).floor();
        if shares.is_zero() {
            debug!(
                level = %level.reference_price(),
                dollars = %allocation.dollars,
                "Tier too small for one pair, skipping level"
            );
            continue;
        }
        let arb_amount = level.edge.gross_edge * shares;
        let reference = level.reference_price();

        orders.push(ActiveLadderOrder::new(
            allocation.tier,
            TokenSide::Yes,
            level.level.yes_ask_price,
            reference,
            shares,
            arb_amount,
        ));
        orders.push(ActiveLadderOrder::new(
            allocation.tier,
            TokenSide::No,
            level.level.no_ask_price,
            reference,
            shares,
            arb_amount,
        ));
    }
    orders
}

/// Owns the active order set and the last deployed fingerprint.
#[derive(Debug, Clone)]
pub struct LadderReconciler {
    enabled: bool,
    active_orders: Arc<Vec<ActiveLadderOrder>>,
    last_fingerprint: Option<Fingerprint>,
}

impl Default for LadderReconciler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LadderReconciler {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            active_orders: Arc::new(Vec::new()),
            last_fingerprint: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns auto mode on or off.
    ///
    /// Disabling forgets the fingerprint (so re-enabling redeploys) but
    /// keeps the active orders.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.last_fingerprint = None;
        }
        self.enabled = enabled;
    }

    /// Shared handle to the active set. Unchanged ticks return the same `Arc`.
    #[must_use]
    pub fn active_orders(&self) -> Arc<Vec<ActiveLadderOrder>> {
        Arc::clone(&self.active_orders)
    }

    #[must_use]
    pub fn last_fingerprint(&self) -> Option<&Fingerprint> {
        self.last_fingerprint.as_ref()
    }

    /// Decides what this tick should do without changing any state.
    #[must_use]
    pub fn plan(&self, ladder: &AnnotatedLadder, total_stake: Decimal, paused: bool) -> ReconcilePlan {
        if !self.enabled {
            return ReconcilePlan::Skip(SkipReason::Disabled);
        }
        if paused {
            return ReconcilePlan::Skip(SkipReason::Paused);
        }

        let levels = select_levels(ladder);
        if levels.is_empty() {
            return ReconcilePlan::Clear;
        }

        let fingerprint = Fingerprint::from_levels(&levels);
        if self.last_fingerprint.as_ref() == Some(&fingerprint) {
            return ReconcilePlan::Unchanged;
        }

        ReconcilePlan::Deploy(DeployPlan {
            orders: build_orders(&levels, total_stake),
            levels: levels.len(),
            fingerprint,
        })
    }

    /// Plans a one-shot deploy of the top levels, ignoring the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`DeployRejection::NoProfitableLevels`] if nothing qualifies
    /// and [`DeployRejection::StakeTooSmall`] if no level can be afforded.
    pub fn plan_once(&self, ladder: &AnnotatedLadder, total_stake: Decimal) -> Result<DeployPlan, DeployRejection> {
        let levels = select_levels(ladder);
        if levels.is_empty() {
            return Err(DeployRejection::NoProfitableLevels);
        }
        Self::sized_plan(&levels, total_stake)
    }

    /// Plans a deploy triggered by clicking one level.
    ///
    /// The clicked level is forced into the selected set, displacing the
    /// weakest of the top levels if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`DeployRejection`] carrying the observed prices if the
    /// level is unknown or unprofitable.
    pub fn plan_for_level(
        &self,
        ladder: &AnnotatedLadder,
        level_price: Decimal,
        total_stake: Decimal,
    ) -> Result<DeployPlan, DeployRejection> {
        let clicked = ladder
            .get(level_price)
            .ok_or(DeployRejection::UnknownLevel(level_price))?;

        if !clicked.is_profitable() {
            return Err(DeployRejection::NotProfitable {
                level_price,
                yes_ask: clicked.level.yes_ask_price,
                no_ask: clicked.level.no_ask_price,
                total_cost: clicked.edge.total_cost,
                net_edge_pct: clicked.edge.net_edge_pct,
            });
        }

        let mut levels = select_levels(ladder);
        if !levels.iter().any(|l| l.reference_price() == level_price) {
            if levels.len() >= MAX_TIERS {
                levels.pop();
            }
            levels.push(clicked);
            levels.sort_by(|a, b| rank_order(a, b));
        }
        Self::sized_plan(&levels, total_stake)
    }

    fn sized_plan(levels: &[&AnnotatedLevel], total_stake: Decimal) -> Result<DeployPlan, DeployRejection> {
        let orders = build_orders(levels, total_stake);
        if orders.is_empty() {
            return Err(DeployRejection::StakeTooSmall(total_stake));
        }
        Ok(DeployPlan {
            fingerprint: Fingerprint::from_levels(levels),
            levels: levels.len(),
            orders,
        })
    }

    /// Replaces the active set with a deployed plan.
    pub fn commit(&mut self, plan: DeployPlan) {
        self.active_orders = Arc::new(plan.orders);
        self.last_fingerprint = Some(plan.fingerprint);
    }

    /// Drops every active order and forgets the fingerprint.
    ///
    /// Returns the number of orders removed.
    pub fn clear(&mut self) -> usize {
        self.take_cancelled().len()
    }

    /// Drains the active set, marking every unfilled order cancelled, and
    /// forgets the fingerprint.
    pub fn take_cancelled(&mut self) -> Vec<ActiveLadderOrder> {
        self.last_fingerprint = None;
        if self.active_orders.is_empty() {
            return Vec::new();
        }
        let mut orders = std::mem::take(Arc::make_mut(&mut self.active_orders));
        for order in &mut orders {
            order.cancel();
        }
        orders
    }

    /// Applies a plan immediately, for callers without a gateway.
    pub fn reconcile(&mut self, ladder: &AnnotatedLadder, total_stake: Decimal, paused: bool) -> ReconcilePlan {
        let plan = self.plan(ladder, total_stake, paused);
        match &plan {
            ReconcilePlan::Clear => {
                self.clear();
            }
            ReconcilePlan::Deploy(deploy) => self.commit(deploy.clone()),
            ReconcilePlan::Skip(_) | ReconcilePlan::Unchanged => {}
        }
        plan
    }

    /// Adds orders to the active set without replacing it.
    pub fn append(&mut self, orders: impl IntoIterator<Item = ActiveLadderOrder>) {
        Arc::make_mut(&mut self.active_orders).extend(orders);
    }

    /// Records a fill against an active order.
    ///
    /// Returns the order's new status, or `None` if the id is unknown.
    pub fn record_fill(&mut self, order_id: Uuid, shares: Decimal) -> Option<LadderOrderStatus> {
        let index = self.active_orders.iter().position(|o| o.id == order_id)?;
        let orders = Arc::make_mut(&mut self.active_orders);
        Some(orders[index].apply_fill(shares))
    }

    /// Ends the cycle: removes every order and reports the profit locked in
    /// by pairs whose YES and NO legs both filled.
    pub fn settle_cycle(&mut self) -> Settlement {
        #[derive(Default)]
        struct Legs {
            yes_filled: Decimal,
            yes_cost: Decimal,
            no_filled: Decimal,
            no_cost: Decimal,
        }

        let mut by_level: BTreeMap<Decimal, Legs> = BTreeMap::new();
        for order in self.active_orders.iter() {
            let legs = by_level.entry(order.level_price).or_default();
            match order.side {
                TokenSide::Yes => {
                    legs.yes_filled += order.filled_shares;
                    legs.yes_cost += order.filled_shares * order.price;
                }
                TokenSide::No => {
                    legs.no_filled += order.filled_shares;
                    legs.no_cost += order.filled_shares * order.price;
                }
            }
        }

        let mut settlement = Settlement {
            orders_removed: self.clear(),
            ..Settlement::default()
        };
        for legs in by_level.values() {
            let hedged = legs.yes_filled.min(legs.no_filled);
            if hedged.is_zero() {
                continue;
            }
            let avg_yes = legs.yes_cost / legs.yes_filled;
            let avg_no = legs.no_cost / legs.no_filled;
            settlement.hedged_pairs += hedged;
            settlement.locked_in += (hedged * (Decimal::ONE - avg_yes - avg_no)).round_dp(2);
        }
        settlement
    }
}

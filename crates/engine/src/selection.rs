//! Two-step manual flow: stage one profitable level, then confirm to buy the
//! pair once.
//!
//! Confirmed orders are appended to the active set rather than replacing
//! it. At most one selection is staged at a time; staging another replaces
//! it.

use crate::edge::AnnotatedLadder;
use crate::types::ActiveLadderOrder;
use arb_ladder_core::TokenSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Tier index given to confirmed pair orders.
pub const PAIRED_TIER: u8 = 1;

/// A staged YES/NO purchase at one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedArbSelection {
    pub level_price: Decimal,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub total_cost: Decimal,
    /// Net edge after fees, in percent.
    pub edge_pct: Decimal,
    /// Whole dollars per leg.
    pub yes_allocation: Decimal,
    pub no_allocation: Decimal,
}

impl PairedArbSelection {
    /// Builds the YES and NO orders for this selection.
    ///
    /// Each leg buys `floor(allocation / leg_price)` shares.
    #[must_use]
    pub fn orders(&self) -> [ActiveLadderOrder; 2] {
        let gross_edge = Decimal::ONE - self.total_cost;
        let leg = |side: TokenSide, price: Decimal, allocation: Decimal| {
            let shares = if price > Decimal::ZERO {
                (allocation / price).floor()
            } else {
                Decimal::ZERO
            };
            ActiveLadderOrder::new(
                PAIRED_TIER,
                side,
                price,
                self.level_price,
                shares,
                gross_edge * shares,
            )
        };

        [
            leg(TokenSide::Yes, self.yes_price, self.yes_allocation),
            leg(TokenSide::No, self.no_price, self.no_allocation),
        ]
    }
}

/// Why a selection could not be staged or confirmed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionRejection {
    #[error("No ladder level at {0}")]
    UnknownLevel(Decimal),

    #[error("Level {level_price} not profitable: total cost {total_cost}, net edge {net_edge_pct}%")]
    NotProfitable {
        level_price: Decimal,
        total_cost: Decimal,
        net_edge_pct: Decimal,
    },

    /// The stake does not cover a whole dollar per leg.
    #[error("Stake {0} too small to split across two legs")]
    StakeTooSmall(Decimal),

    #[error("No selection staged")]
    NothingStaged,
}

/// Holds at most one staged selection.
#[derive(Debug, Clone, Default)]
pub struct PairedSelectionFlow {
    pending: Option<PairedArbSelection>,
}

impl PairedSelectionFlow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PairedArbSelection> {
        self.pending.as_ref()
    }

    /// Stages the level at `level_price`, splitting `total_stake` evenly
    /// (floored to whole dollars) across the two legs.
    ///
    /// # Errors
    ///
    /// Returns a [`SelectionRejection`] if the level is unknown or
    /// unprofitable; any existing selection is kept in that case.
    pub fn select(
        &mut self,
        ladder: &AnnotatedLadder,
        level_price: Decimal,
        total_stake: Decimal,
    ) -> Result<&PairedArbSelection, SelectionRejection> {
        let level = ladder
            .get(level_price)
            .ok_or(SelectionRejection::UnknownLevel(level_price))?;

        if !level.is_profitable() {
            return Err(SelectionRejection::NotProfitable {
                level_price,
                total_cost: level.edge.total_cost,
                net_edge_pct: level.edge.net_edge_pct,
            });
        }

        let per_leg = (total_stake / Decimal::TWO).floor();
        if per_leg <= Decimal::ZERO {
            return Err(SelectionRejection::StakeTooSmall(total_stake));
        }

        let selection = PairedArbSelection {
            level_price,
            yes_price: level.level.yes_ask_price,
            no_price: level.level.no_ask_price,
            total_cost: level.edge.total_cost,
            edge_pct: level.edge.net_edge_pct,
            yes_allocation: per_leg,
            no_allocation: per_leg,
        };
        if let Some(previous) = &self.pending {
            debug!(previous = %previous.level_price, next = %level_price, "Replacing staged selection");
        }
        Ok(self.pending.insert(selection))
    }

    /// Orders the staged selection would place, without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionRejection::NothingStaged`] if nothing is staged.
    pub fn preview_orders(&self) -> Result<[ActiveLadderOrder; 2], SelectionRejection> {
        self.pending
            .as_ref()
            .map(PairedArbSelection::orders)
            .ok_or(SelectionRejection::NothingStaged)
    }

    /// Consumes the staged selection and returns its two orders.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionRejection::NothingStaged`] if nothing is staged.
    pub fn confirm(&mut self) -> Result<[ActiveLadderOrder; 2], SelectionRejection> {
        let selection = self.pending.take().ok_or(SelectionRejection::NothingStaged)?;
        Ok(selection.orders())
    }

    /// Discards the staged selection, returning it.
    pub fn cancel(&mut self) -> Option<PairedArbSelection> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeCalculator;
    use crate::ladder::{Ladder, OrderBookLevel};
    use rust_decimal_macros::dec;

    fn ladder() -> AnnotatedLadder {
        let level = |reference: Decimal, yes: Decimal, no: Decimal| OrderBookLevel {
            reference_price: reference,
            yes_bid_size: dec!(100),
            yes_ask_size: dec!(100),
            yes_ask_price: yes,
            no_bid_size: dec!(100),
            no_ask_size: dec!(100),
            no_ask_price: no,
        };
        let ladder = Ladder::from_levels(
            dec!(0.50),
            vec![
                level(dec!(0.52), dec!(0.50), dec!(0.47)),
                level(dec!(0.51), dec!(0.53), dec!(0.48)),
                level(dec!(0.50), dec!(0.48), dec!(0.49)),
            ],
        );
        EdgeCalculator::new(dec!(0.4), dec!(0.5)).annotate(&ladder)
    }

    #[test]
    fn test_select_stages_even_split() {
        let mut flow = PairedSelectionFlow::new();
        let selection = flow.select(&ladder(), dec!(0.52), dec!(251)).unwrap().clone();

        assert_eq!(selection.yes_price, dec!(0.50));
        assert_eq!(selection.no_price, dec!(0.47));
        assert_eq!(selection.total_cost, dec!(0.97));
        assert_eq!(selection.edge_pct, dec!(2.2));
        assert_eq!(selection.yes_allocation, dec!(125));
        assert_eq!(selection.no_allocation, dec!(125));
        assert_eq!(flow.pending(), Some(&selection));
    }

    #[test]
    fn test_unprofitable_selection_rejected_and_previous_kept() {
        let ladder = ladder();
        let mut flow = PairedSelectionFlow::new();
        flow.select(&ladder, dec!(0.52), dec!(250)).unwrap();

        let err = flow.select(&ladder, dec!(0.51), dec!(250)).unwrap_err();
        assert!(matches!(err, SelectionRejection::NotProfitable { .. }));
        assert_eq!(flow.pending().map(|s| s.level_price), Some(dec!(0.52)));

        assert_eq!(
            flow.select(&ladder, dec!(0.90), dec!(250)).unwrap_err(),
            SelectionRejection::UnknownLevel(dec!(0.90))
        );
    }

    #[test]
    fn test_new_selection_replaces_old() {
        let ladder = ladder();
        let mut flow = PairedSelectionFlow::new();
        flow.select(&ladder, dec!(0.52), dec!(250)).unwrap();
        flow.select(&ladder, dec!(0.50), dec!(250)).unwrap();
        assert_eq!(flow.pending().map(|s| s.level_price), Some(dec!(0.50)));
    }

    #[test]
    fn test_confirm_builds_two_legs() {
        let mut flow = PairedSelectionFlow::new();
        flow.select(&ladder(), dec!(0.52), dec!(250)).unwrap();

        let preview = flow.preview_orders().unwrap();
        assert!(flow.pending().is_some());

        let [yes, no] = flow.confirm().unwrap();
        assert!(flow.pending().is_none());

        assert_eq!(yes.side, TokenSide::Yes);
        assert_eq!(yes.ladder_index, PAIRED_TIER);
        assert_eq!(yes.shares, dec!(250)); // 125 / 0.50
        assert_eq!(no.side, TokenSide::No);
        assert_eq!(no.shares, dec!(265)); // 125 / 0.47 = 265.9
        assert_eq!(yes.arb_amount, dec!(7.50));
        assert_eq!(yes.level_price, dec!(0.52));
        assert_eq!(preview[0].shares, yes.shares);
    }

    #[test]
    fn test_confirm_without_selection() {
        let mut flow = PairedSelectionFlow::new();
        assert_eq!(flow.confirm().unwrap_err(), SelectionRejection::NothingStaged);
        assert!(flow.preview_orders().is_err());
    }

    #[test]
    fn test_cancel_discards() {
        let mut flow = PairedSelectionFlow::new();
        flow.select(&ladder(), dec!(0.52), dec!(250)).unwrap();
        assert!(flow.cancel().is_some());
        assert!(flow.cancel().is_none());

        flow.select(&ladder(), dec!(0.52), dec!(250)).unwrap();
        flow.clear();
        assert!(flow.pending().is_none());
    }

    #[test]
    fn test_stake_below_two_dollars() {
        let mut flow = PairedSelectionFlow::new();
        assert_eq!(
            flow.select(&ladder(), dec!(0.52), dec!(1.5)).unwrap_err(),
            SelectionRejection::StakeTooSmall(dec!(1.5))
        );
    }
}

//! Fee-adjusted edge of buying a YES/NO pair.
//!
//! ```text
//! total_cost     = yes_ask + no_ask
//! gross_edge     = 1 - total_cost
//! net_edge       = gross_edge - 2 * taker_fee_pct / 100
//! is_profitable  = gross_edge > 0 && net_edge_pct >= min_net_edge_pct
//! ```
//!
//! The fee is charged once per leg, hence the factor of two. A pair costing
//! $1.00 or more is never profitable, whatever the fee or threshold.

use crate::ladder::{Ladder, OrderBookLevel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Edge figures for one level (or any YES/NO ask pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelEdgeInfo {
    pub reference_price: Decimal,
    pub total_cost: Decimal,
    /// Profit per pair before fees, in dollars.
    pub gross_edge: Decimal,
    pub gross_edge_pct: Decimal,
    pub net_edge_pct: Decimal,
    pub is_profitable: bool,
}

/// Evaluates pairs against a fee and a minimum net edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCalculator {
    /// Taker fee per leg, in percent.
    pub taker_fee_pct: Decimal,
    pub min_net_edge_pct: Decimal,
}

impl Default for EdgeCalculator {
    fn default() -> Self {
        Self {
            taker_fee_pct: dec!(0.4),
            min_net_edge_pct: dec!(0.5),
        }
    }
}

impl EdgeCalculator {
    #[must_use]
    pub fn new(taker_fee_pct: Decimal, min_net_edge_pct: Decimal) -> Self {
        Self {
            taker_fee_pct,
            min_net_edge_pct,
        }
    }

    /// Evaluates an ad hoc YES/NO ask pair. The result is keyed by the YES
    /// ask since there is no ladder level.
    ///
    /// Prices are not validated; callers pass prices within (0, 1).
    #[must_use]
    pub fn evaluate(&self, yes_ask: Decimal, no_ask: Decimal) -> LevelEdgeInfo {
        let total_cost = yes_ask + no_ask;
        let gross_edge = Decimal::ONE - total_cost;
        let net_edge = gross_edge - Decimal::TWO * self.taker_fee_pct / dec!(100);
        let net_edge_pct = net_edge * dec!(100);

        LevelEdgeInfo {
            reference_price: yes_ask,
            total_cost,
            gross_edge,
            gross_edge_pct: gross_edge * dec!(100),
            net_edge_pct,
            is_profitable: gross_edge > Decimal::ZERO && net_edge_pct >= self.min_net_edge_pct,
        }
    }

    #[must_use]
    pub fn evaluate_level(&self, level: &OrderBookLevel) -> LevelEdgeInfo {
        LevelEdgeInfo {
            reference_price: level.reference_price,
            ..self.evaluate(level.yes_ask_price, level.no_ask_price)
        }
    }

    /// Annotates every level of a ladder in one pass.
    #[must_use]
    pub fn annotate(&self, ladder: &Ladder) -> AnnotatedLadder {
        let levels: Vec<AnnotatedLevel> = ladder
            .levels()
            .iter()
            .map(|level| AnnotatedLevel {
                level: *level,
                edge: self.evaluate_level(level),
            })
            .collect();

        AnnotatedLadder {
            reference_price: ladder.reference_price(),
            levels: levels.into(),
            built_at: ladder.built_at(),
        }
    }
}

/// A ladder level together with its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedLevel {
    pub level: OrderBookLevel,
    pub edge: LevelEdgeInfo,
}

impl AnnotatedLevel {
    #[must_use]
    pub fn reference_price(&self) -> Decimal {
        self.level.reference_price
    }

    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.edge.is_profitable
    }
}

/// One tick's ladder with its edge data.
///
/// Levels and edges are produced together and never mixed across ticks.
#[derive(Debug, Clone)]
pub struct AnnotatedLadder {
    reference_price: Decimal,
    levels: Arc<[AnnotatedLevel]>,
    built_at: DateTime<Utc>,
}

impl Default for AnnotatedLadder {
    fn default() -> Self {
        Self {
            reference_price: Decimal::ZERO,
            levels: Arc::from(Vec::new()),
            built_at: Utc::now(),
        }
    }
}

impl AnnotatedLadder {
    #[must_use]
    pub fn reference_price(&self) -> Decimal {
        self.reference_price
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Levels, highest reference price first.
    #[must_use]
    pub fn levels(&self) -> &[AnnotatedLevel] {
        &self.levels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[must_use]
    pub fn get(&self, reference_price: Decimal) -> Option<&AnnotatedLevel> {
        self.levels
            .iter()
            .find(|level| level.level.reference_price == reference_price)
    }

    #[must_use]
    pub fn edge_for(&self, reference_price: Decimal) -> Option<&LevelEdgeInfo> {
        self.get(reference_price).map(|level| &level.edge)
    }

    pub fn profitable(&self) -> impl Iterator<Item = &AnnotatedLevel> {
        self.levels.iter().filter(|level| level.is_profitable())
    }

    /// Profitable levels by net edge, best first. Ties go to the higher
    /// reference price.
    #[must_use]
    pub fn ranked_profitable(&self) -> Vec<&AnnotatedLevel> {
        let mut ranked: Vec<&AnnotatedLevel> = self.profitable().collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }
}

/// Ordering used everywhere levels are ranked: net edge descending, then
/// reference price descending.
pub(crate) fn rank_order(a: &AnnotatedLevel, b: &AnnotatedLevel) -> Ordering {
    b.edge
        .net_edge_pct
        .cmp(&a.edge.net_edge_pct)
        .then_with(|| b.level.reference_price.cmp(&a.level.reference_price))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(reference: Decimal, yes: Decimal, no: Decimal) -> OrderBookLevel {
        OrderBookLevel {
            reference_price: reference,
            yes_bid_size: dec!(100),
            yes_ask_size: dec!(100),
            yes_ask_price: yes,
            no_bid_size: dec!(100),
            no_ask_size: dec!(100),
            no_ask_price: no,
        }
    }

    #[test]
    fn test_reference_scenario() {
        let calc = EdgeCalculator::new(dec!(0.4), dec!(0.5));
        let edge = calc.evaluate_level(&level(dec!(0.52), dec!(0.50), dec!(0.47)));

        assert_eq!(edge.reference_price, dec!(0.52));
        assert_eq!(edge.total_cost, dec!(0.97));
        assert_eq!(edge.gross_edge, dec!(0.03));
        assert_eq!(edge.gross_edge_pct, dec!(3.0));
        assert_eq!(edge.net_edge_pct, dec!(2.2));
        assert!(edge.is_profitable);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let calc = EdgeCalculator::new(dec!(0.4), dec!(2.2));
        assert!(calc.evaluate(dec!(0.50), dec!(0.47)).is_profitable);

        let calc = EdgeCalculator::new(dec!(0.4), dec!(2.21));
        assert!(!calc.evaluate(dec!(0.50), dec!(0.47)).is_profitable);
    }

    #[test]
    fn test_cost_at_or_above_one_never_profitable() {
        let calc = EdgeCalculator::new(Decimal::ZERO, Decimal::ZERO);
        assert!(!calc.evaluate(dec!(0.53), dec!(0.48)).is_profitable);
        assert!(!calc.evaluate(dec!(0.50), dec!(0.50)).is_profitable);

        let calc = EdgeCalculator::new(Decimal::ZERO, dec!(-5));
        let edge = calc.evaluate(dec!(0.51), dec!(0.50));
        assert!(edge.net_edge_pct >= calc.min_net_edge_pct);
        assert!(!edge.is_profitable);
    }

    #[test]
    fn test_profitability_matches_formula() {
        let calc = EdgeCalculator::new(dec!(0.4), dec!(0.5));
        for yes_cents in 30..70 {
            for no_cents in 30..70 {
                let yes = Decimal::new(yes_cents, 2);
                let no = Decimal::new(no_cents, 2);
                let edge = calc.evaluate(yes, no);
                let expected = (Decimal::ONE - yes - no - dec!(0.008)) * dec!(100) >= dec!(0.5);
                assert_eq!(edge.is_profitable, expected, "yes={yes} no={no}");
                assert_eq!(edge.is_profitable, edge.net_edge_pct >= calc.min_net_edge_pct);
            }
        }
    }

    #[test]
    fn test_annotate_keeps_levels_and_edges_together() {
        let ladder = Ladder::from_levels(
            dec!(0.50),
            vec![
                level(dec!(0.51), dec!(0.51), dec!(0.50)),
                level(dec!(0.50), dec!(0.49), dec!(0.48)),
                level(dec!(0.49), dec!(0.48), dec!(0.49)),
            ],
        );
        let annotated = EdgeCalculator::default().annotate(&ladder);

        assert_eq!(annotated.len(), 3);
        assert_eq!(annotated.reference_price(), dec!(0.50));
        for item in annotated.levels() {
            assert_eq!(item.edge.reference_price, item.level.reference_price);
        }
        assert!(!annotated.edge_for(dec!(0.51)).unwrap().is_profitable);
        assert!(annotated.edge_for(dec!(0.50)).unwrap().is_profitable);
        assert_eq!(annotated.profitable().count(), 2);
        assert!(annotated.get(dec!(0.42)).is_none());
    }

    #[test]
    fn test_ranking_ties_prefer_higher_price() {
        let ladder = Ladder::from_levels(
            dec!(0.50),
            vec![
                level(dec!(0.49), dec!(0.48), dec!(0.48)),
                level(dec!(0.50), dec!(0.49), dec!(0.47)),
                level(dec!(0.51), dec!(0.47), dec!(0.47)),
            ],
        );
        let annotated = EdgeCalculator::default().annotate(&ladder);
        let ranked: Vec<Decimal> = annotated
            .ranked_profitable()
            .iter()
            .map(|l| l.reference_price())
            .collect();

        assert_eq!(ranked, vec![dec!(0.51), dec!(0.50), dec!(0.49)]);
    }
}

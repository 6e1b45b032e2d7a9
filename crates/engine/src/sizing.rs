//! Front-loaded capital allocation across deployed ladder tiers.
//!
//! Tier 1 is the best-ranked level and receives the most capital. Callers
//! must pass levels already ranked by net edge, best first.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Maximum number of ladder levels deployed at once.
pub const MAX_TIERS: usize = 7;

/// Share of the stake per tier before renormalization. Sums to 1.
pub const TIER_WEIGHTS: [Decimal; MAX_TIERS] = [
    dec!(0.25),
    dec!(0.18),
    dec!(0.15),
    dec!(0.13),
    dec!(0.11),
    dec!(0.10),
    dec!(0.08),
];

/// Dollars assigned to one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAllocation {
    /// 1-based tier index.
    pub tier: u8,
    /// Renormalized weight.
    pub weight: Decimal,
    pub dollars: Decimal,
}

/// Order in which a schedule is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    /// Largest tier first.
    #[default]
    ScaleIn,
    /// Smallest tier first.
    ScaleOut,
}

fn floor_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
}

/// Stateless tiered sizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredSizer;

impl TieredSizer {
    /// First `level_count` weights rescaled to sum to 1.
    #[must_use]
    pub fn weights(level_count: usize) -> Vec<Decimal> {
        let count = level_count.min(MAX_TIERS);
        let schedule = &TIER_WEIGHTS[..count];
        let total: Decimal = schedule.iter().sum();
        if total.is_zero() {
            return Vec::new();
        }
        schedule.iter().map(|w| *w / total).collect()
    }

    /// Splits `total_stake` across `level_count` tiers (capped at 7).
    ///
    /// Each tier is floored to cents and the flooring remainder goes to
    /// tier 1, so the result sums exactly to the cent-floored stake and stays
    /// non-increasing by tier. A non-positive stake yields zero-dollar tiers.
    #[must_use]
    pub fn allocate(total_stake: Decimal, level_count: usize) -> Vec<TierAllocation> {
        let weights = Self::weights(level_count);
        let stake = floor_cents(total_stake.max(Decimal::ZERO));

        let mut allocations: Vec<TierAllocation> = weights
            .iter()
            .zip(1u8..)
            .map(|(weight, tier)| TierAllocation {
                tier,
                weight: *weight,
                dollars: floor_cents(stake * *weight),
            })
            .collect();

        let assigned: Decimal = allocations.iter().map(|a| a.dollars).sum();
        if let Some(first) = allocations.first_mut() {
            first.dollars += stake - assigned;
        }
        allocations
    }

    /// The same allocations as [`TieredSizer::allocate`], ordered for display.
    #[must_use]
    pub fn preview(total_stake: Decimal, level_count: usize, direction: ScaleDirection) -> Vec<TierAllocation> {
        let mut allocations = Self::allocate(total_stake, level_count);
        if direction == ScaleDirection::ScaleOut {
            allocations.reverse();
        }
        allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(allocations: &[TierAllocation]) -> Decimal {
        allocations.iter().map(|a| a.dollars).sum()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum: Decimal = TIER_WEIGHTS.iter().sum();
        assert_eq!(sum, Decimal::ONE);
    }

    #[test]
    fn test_250_over_5_levels() {
        let allocations = TieredSizer::allocate(dec!(250), 5);
        assert_eq!(allocations.len(), 5);
        assert!((total(&allocations) - dec!(250)).abs() <= dec!(0.01));
        assert_eq!(total(&allocations), dec!(250.00));

        // 0.25 / 0.82 of $250 = 76.219..., floored plus remainder
        assert!(allocations[0].dollars >= dec!(76.21));
        assert_eq!(allocations[1].dollars, dec!(54.87));
        assert_eq!(allocations[3].dollars, dec!(39.63));
        assert_eq!(allocations[4].dollars, dec!(33.53));
    }

    #[test]
    fn test_allocations_non_increasing() {
        for count in 1..=MAX_TIERS {
            for stake in [dec!(1), dec!(33.33), dec!(250), dec!(10000.07)] {
                let allocations = TieredSizer::allocate(stake, count);
                assert!(
                    allocations.windows(2).all(|w| w[0].dollars >= w[1].dollars),
                    "stake={stake} count={count}"
                );
                assert_eq!(total(&allocations), stake);
            }
        }
    }

    #[test]
    fn test_single_level_takes_everything() {
        let allocations = TieredSizer::allocate(dec!(250), 1);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].weight, Decimal::ONE);
        assert_eq!(allocations[0].dollars, dec!(250));
    }

    #[test]
    fn test_count_capped_at_max_tiers() {
        let allocations = TieredSizer::allocate(dec!(100), 12);
        assert_eq!(allocations.len(), MAX_TIERS);
        assert_eq!(allocations[6].tier, 7);
        assert_eq!(allocations[6].dollars, dec!(8));
    }

    #[test]
    fn test_zero_levels_is_empty() {
        assert!(TieredSizer::allocate(dec!(250), 0).is_empty());
    }

    #[test]
    fn test_non_positive_stake() {
        let allocations = TieredSizer::allocate(dec!(-10), 3);
        assert_eq!(allocations.len(), 3);
        assert!(allocations.iter().all(|a| a.dollars.is_zero()));
    }

    #[test]
    fn test_preview_directions() {
        let scale_in = TieredSizer::preview(dec!(250), 4, ScaleDirection::ScaleIn);
        let scale_out = TieredSizer::preview(dec!(250), 4, ScaleDirection::ScaleOut);

        assert_eq!(scale_in.first().map(|a| a.tier), Some(1));
        assert_eq!(scale_out.first().map(|a| a.tier), Some(4));
        assert_eq!(total(&scale_in), total(&scale_out));

        let mut mirrored = scale_out.clone();
        mirrored.reverse();
        assert_eq!(mirrored, scale_in);
    }
}

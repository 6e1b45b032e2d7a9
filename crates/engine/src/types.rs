//! Order records tracked by the reconciler.

use arb_ladder_core::TokenSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a deployed ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LadderOrderStatus {
    /// Submitted, nothing filled yet.
    Pending,
    /// Some shares filled.
    Partial,
    /// Every share filled.
    Filled,
    /// Withdrawn before completing.
    Cancelled,
}

impl LadderOrderStatus {
    /// Returns true if the order can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, LadderOrderStatus::Filled | LadderOrderStatus::Cancelled)
    }
}

impl fmt::Display for LadderOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LadderOrderStatus::Pending => write!(f, "pending"),
            LadderOrderStatus::Partial => write!(f, "partial"),
            LadderOrderStatus::Filled => write!(f, "filled"),
            LadderOrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One leg of a deployed YES/NO pair.
///
/// Every deployed ladder level produces two of these, a YES leg and a NO
/// leg, sharing the same `ladder_index` and `level_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLadderOrder {
    pub id: Uuid,
    /// Sizing tier, 1 (largest) through 7.
    pub ladder_index: u8,
    pub side: TokenSide,
    /// Limit price of this leg.
    pub price: Decimal,
    /// Reference price of the ladder level the pair was built from.
    pub level_price: Decimal,
    pub shares: Decimal,
    pub filled_shares: Decimal,
    pub status: LadderOrderStatus,
    /// Expected locked-in profit of this leg: gross edge per pair times shares.
    pub arb_amount: Decimal,
}

impl ActiveLadderOrder {
    /// Creates a pending order with a fresh id.
    #[must_use]
    pub fn new(
        ladder_index: u8,
        side: TokenSide,
        price: Decimal,
        level_price: Decimal,
        shares: Decimal,
        arb_amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ladder_index,
            side,
            price,
            level_price,
            shares,
            filled_shares: Decimal::ZERO,
            status: LadderOrderStatus::Pending,
            arb_amount,
        }
    }

    /// Dollar cost of the full order.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.shares
    }

    #[must_use]
    pub fn remaining_shares(&self) -> Decimal {
        (self.shares - self.filled_shares).max(Decimal::ZERO)
    }

    /// Records `quantity` newly filled shares, capped at the order size.
    ///
    /// Terminal orders are left untouched.
    pub fn apply_fill(&mut self, quantity: Decimal) -> LadderOrderStatus {
        if self.status.is_terminal() || quantity <= Decimal::ZERO {
            return self.status;
        }

        self.filled_shares = (self.filled_shares + quantity).min(self.shares);
        self.status = if self.filled_shares >= self.shares {
            LadderOrderStatus::Filled
        } else {
            LadderOrderStatus::Partial
        };
        self.status
    }

    /// Marks the order cancelled unless it already completed.
    pub fn cancel(&mut self) {
        if self.status != LadderOrderStatus::Filled {
            self.status = LadderOrderStatus::Cancelled;
        }
    }
}

//! Market-data types shared by the feed and the ladder engine.
//!
//! A binary market has two complementary outcome tokens. Their fair values
//! sum to $1.00 per pair, so buying one YES and one NO share for less than
//! $1.00 locks in the difference regardless of outcome.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest price a quote may carry after clamping.
pub const MIN_QUOTE_PRICE: Decimal = dec!(0.001);

/// Highest price a quote may carry after clamping.
pub const MAX_QUOTE_PRICE: Decimal = dec!(0.999);

/// Outcome token of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenSide {
    Yes,
    No,
}

impl TokenSide {
    /// Returns the complementary outcome.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            TokenSide::Yes => TokenSide::No,
            TokenSide::No => TokenSide::Yes,
        }
    }
}

impl fmt::Display for TokenSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSide::Yes => write!(f, "YES"),
            TokenSide::No => write!(f, "NO"),
        }
    }
}

/// Which side of the book a quote describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteKind {
    Bid,
    Ask,
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteKind::Bid => write!(f, "BID"),
            QuoteKind::Ask => write!(f, "ASK"),
        }
    }
}

/// A single best-price update for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub side: TokenSide,
    pub kind: QuoteKind,
    /// Always within `[MIN_QUOTE_PRICE, MAX_QUOTE_PRICE]`.
    pub price: Decimal,
}

impl PriceQuote {
    /// Creates a quote, clamping the price strictly inside (0, 1).
    #[must_use]
    pub fn new(side: TokenSide, kind: QuoteKind, price: Decimal) -> Self {
        Self {
            side,
            kind,
            price: clamp_price(price),
        }
    }
}

/// Clamps a raw streamed price into the open unit interval.
#[must_use]
pub fn clamp_price(price: Decimal) -> Decimal {
    price.clamp(MIN_QUOTE_PRICE, MAX_QUOTE_PRICE)
}

/// Merged top-of-book view of both tokens.
///
/// `None` fields have not been observed since the feed connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub yes_bid: Option<Decimal>,
    pub yes_ask: Option<Decimal>,
    pub no_bid: Option<Decimal>,
    pub no_ask: Option<Decimal>,
    /// Time of the most recent quote applied to this snapshot.
    pub observed_at: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Applies one quote, touching exactly one of the four price fields.
    pub fn apply(&mut self, quote: PriceQuote, at: DateTime<Utc>) {
        let slot = match (quote.side, quote.kind) {
            (TokenSide::Yes, QuoteKind::Bid) => &mut self.yes_bid,
            (TokenSide::Yes, QuoteKind::Ask) => &mut self.yes_ask,
            (TokenSide::No, QuoteKind::Bid) => &mut self.no_bid,
            (TokenSide::No, QuoteKind::Ask) => &mut self.no_ask,
        };
        *slot = Some(quote.price);
        self.observed_at = Some(at);
    }

    /// Returns the stored price for a token side and book side.
    #[must_use]
    pub fn price(&self, side: TokenSide, kind: QuoteKind) -> Option<Decimal> {
        match (side, kind) {
            (TokenSide::Yes, QuoteKind::Bid) => self.yes_bid,
            (TokenSide::Yes, QuoteKind::Ask) => self.yes_ask,
            (TokenSide::No, QuoteKind::Bid) => self.no_bid,
            (TokenSide::No, QuoteKind::Ask) => self.no_ask,
        }
    }

    /// True once all four fields have been observed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.yes_bid.is_some() && self.yes_ask.is_some() && self.no_bid.is_some() && self.no_ask.is_some()
    }

    /// Cost of buying one YES and one NO share at the current asks.
    #[must_use]
    pub fn pair_ask_cost(&self) -> Option<Decimal> {
        Some(self.yes_ask? + self.no_ask?)
    }

    /// Mid price of the YES token.
    ///
    /// Falls back to the complement of the NO mid when the YES book is
    /// one-sided or empty.
    #[must_use]
    pub fn yes_mid(&self) -> Option<Decimal> {
        match (self.yes_bid, self.yes_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => match (self.no_bid, self.no_ask) {
                (Some(bid), Some(ask)) => Some(Decimal::ONE - (bid + ask) / Decimal::TWO),
                _ => self.yes_ask.or(self.yes_bid),
            },
        }
    }
}

/// Lifecycle state of the market-data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    /// Reconnect attempts exhausted; no further retries.
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

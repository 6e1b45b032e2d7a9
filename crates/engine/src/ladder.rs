//! Price-ladder construction.
//!
//! A ladder is a strictly descending set of reference prices around the
//! current market, each carrying the YES and NO ask prices and sizes at
//! which a pair could be bought there.
//!
//! ```text
//!   LevelQuoteSource ──► LadderBuilder ──► Ladder (Arc, immutable)
//!   (synthetic / feed)    (geometry only)    rebuilt wholesale per tick
//! ```
//!
//! The builder only enforces structure. Whether a level is worth trading is
//! decided later by [`crate::edge::EdgeCalculator`].

use arb_ladder_core::{LadderSettings, MarketSnapshot};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Lowest reference or ask price a ladder level may carry.
pub const MIN_LEVEL_PRICE: Decimal = dec!(0.01);

/// Highest reference or ask price a ladder level may carry.
pub const MAX_LEVEL_PRICE: Decimal = dec!(0.99);

fn clamp_level_price(price: Decimal) -> Decimal {
    price.clamp(MIN_LEVEL_PRICE, MAX_LEVEL_PRICE)
}

/// One rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub reference_price: Decimal,
    pub yes_bid_size: Decimal,
    pub yes_ask_size: Decimal,
    /// Independent of `reference_price`.
    pub yes_ask_price: Decimal,
    pub no_bid_size: Decimal,
    pub no_ask_size: Decimal,
    /// Independent of `1 - reference_price`.
    pub no_ask_price: Decimal,
}

impl OrderBookLevel {
    fn from_quote(reference_price: Decimal, quote: LevelQuote) -> Self {
        Self {
            reference_price,
            yes_bid_size: quote.yes_bid_size,
            yes_ask_size: quote.yes_ask_size,
            yes_ask_price: clamp_level_price(quote.yes_ask_price),
            no_bid_size: quote.no_bid_size,
            no_ask_size: quote.no_ask_size,
            no_ask_price: clamp_level_price(quote.no_ask_price),
        }
    }

    /// Cost of one YES plus one NO share at this level.
    #[must_use]
    pub fn pair_cost(&self) -> Decimal {
        self.yes_ask_price + self.no_ask_price
    }
}

/// What a source reports for a single ladder level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelQuote {
    pub yes_bid_size: Decimal,
    pub yes_ask_size: Decimal,
    pub yes_ask_price: Decimal,
    pub no_bid_size: Decimal,
    pub no_ask_size: Decimal,
    pub no_ask_price: Decimal,
}

/// Supplies the reference price and per-level quotes a ladder is built from.
pub trait LevelQuoteSource: Send {
    /// Price the next ladder is centred on, or `None` while the source has
    /// nothing to offer yet.
    fn reference_price(&self) -> Option<Decimal>;

    /// Quotes for the level at `level_price` of a ladder centred on
    /// `reference_price`.
    fn quote_level(&mut self, level_price: Decimal, reference_price: Decimal) -> LevelQuote;

    /// Called with every merged top-of-book update from the feed.
    fn on_snapshot(&mut self, _snapshot: &MarketSnapshot) {}

    /// Called once per poll interval before a ladder is built.
    fn poll(&mut self) {}
}

/// An immutable ladder for one tick.
///
/// Cloning is cheap: levels live behind an `Arc` and are never mutated.
#[derive(Debug, Clone)]
pub struct Ladder {
    reference_price: Decimal,
    levels: Arc<[OrderBookLevel]>,
    built_at: DateTime<Utc>,
}

impl Ladder {
    /// A ladder with no levels.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            reference_price: Decimal::ZERO,
            levels: Arc::from(Vec::new()),
            built_at: Utc::now(),
        }
    }

    /// Builds a ladder from arbitrary levels, normalizing them into strictly
    /// descending reference-price order. Later duplicates of a price are
    /// dropped.
    #[must_use]
    pub fn from_levels(reference_price: Decimal, mut levels: Vec<OrderBookLevel>) -> Self {
        levels.sort_by(|a, b| b.reference_price.cmp(&a.reference_price));
        levels.dedup_by(|later, earlier| later.reference_price == earlier.reference_price);
        Self {
            reference_price,
            levels: levels.into(),
            built_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn reference_price(&self) -> Decimal {
        self.reference_price
    }

    /// Levels, highest reference price first.
    #[must_use]
    pub fn levels(&self) -> &[OrderBookLevel] {
        &self.levels
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Finds the level at a reference price.
    #[must_use]
    pub fn level(&self, reference_price: Decimal) -> Option<&OrderBookLevel> {
        self.levels
            .iter()
            .find(|level| level.reference_price == reference_price)
    }
}

/// Lays out ladder levels around a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderBuilder {
    pub ticks_each_side: u32,
    pub tick_size: Decimal,
}

impl Default for LadderBuilder {
    fn default() -> Self {
        Self {
            ticks_each_side: 20,
            tick_size: dec!(0.01),
        }
    }
}

impl From<&LadderSettings> for LadderBuilder {
    fn from(settings: &LadderSettings) -> Self {
        Self::new(settings.ticks_each_side, settings.tick_size)
    }
}

impl LadderBuilder {
    #[must_use]
    pub fn new(ticks_each_side: u32, tick_size: Decimal) -> Self {
        Self {
            ticks_each_side,
            tick_size,
        }
    }

    /// Snaps a reference price onto the tick grid and into level bounds.
    #[must_use]
    pub fn centre(&self, reference_price: Decimal) -> Decimal {
        if self.tick_size <= Decimal::ZERO {
            return clamp_level_price(reference_price);
        }
        let ticks = (reference_price / self.tick_size).round();
        clamp_level_price(ticks * self.tick_size)
    }

    /// Reference prices of every level, strictly descending.
    ///
    /// Levels clamped onto the same bound collapse into one, so ladders near
    /// 0.01 or 0.99 are shorter than `2 * ticks_each_side + 1`.
    #[must_use]
    pub fn level_prices(&self, reference_price: Decimal) -> Vec<Decimal> {
        let centre = self.centre(reference_price);
        if self.tick_size <= Decimal::ZERO {
            return vec![centre];
        }

        let n = i64::from(self.ticks_each_side);
        let mut prices: Vec<Decimal> = (-n..=n)
            .rev()
            .map(|k| clamp_level_price(centre + self.tick_size * Decimal::from(k)))
            .collect();
        prices.dedup();
        prices
    }

    /// Builds a ladder from the source's current reference price.
    ///
    /// Returns `None` when the source has no reference price yet.
    pub fn build(&self, source: &mut dyn LevelQuoteSource) -> Option<Ladder> {
        let reference = source.reference_price()?;
        Some(self.build_around(reference, source))
    }

    /// Builds a ladder centred on an explicit reference price.
    pub fn build_around(&self, reference_price: Decimal, source: &mut dyn LevelQuoteSource) -> Ladder {
        let centre = self.centre(reference_price);
        let levels: Vec<OrderBookLevel> = self
            .level_prices(reference_price)
            .into_iter()
            .map(|price| OrderBookLevel::from_quote(price, source.quote_level(price, centre)))
            .collect();

        Ladder {
            reference_price: centre,
            levels: levels.into(),
            built_at: Utc::now(),
        }
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Placeholder generator for tests and the `simulate` command.
///
/// Gross edge at a level is `0.02 - distance_from_reference * 0.1` plus a
/// jitter of at most half a cent, so only levels close to the reference ever
/// look profitable. This is not a market model.
///
/// Quotes are drawn once per level and held until the reference walks, so a
/// book that has not moved rebuilds to identical prices.
#[derive(Debug)]
pub struct SyntheticLadderSource {
    reference_price: Decimal,
    depth: Decimal,
    tick_size: Decimal,
    /// Chance per poll that the reference walks one tick.
    walk_probability: f64,
    rng: StdRng,
    quotes: HashMap<Decimal, LevelQuote>,
    /// Reference the cached quotes were drawn around.
    quoted_reference: Option<Decimal>,
}

impl SyntheticLadderSource {
    /// Gross edge at the reference price before jitter.
    pub const BASE_EDGE: Decimal = dec!(0.02);

    /// Edge lost per dollar of distance from the reference.
    pub const EDGE_DECAY: Decimal = dec!(0.1);

    /// Jitter bound in thousandths of a dollar.
    const MAX_JITTER_MILLIS: i64 = 5;

    #[must_use]
    pub fn new(reference_price: Decimal, depth: Decimal, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            reference_price: clamp_level_price(reference_price),
            depth,
            tick_size: dec!(0.01),
            walk_probability: 0.2,
            rng,
            quotes: HashMap::new(),
            quoted_reference: None,
        }
    }

    #[must_use]
    pub fn with_tick_size(mut self, tick_size: Decimal) -> Self {
        self.tick_size = tick_size;
        self.quotes.clear();
        self
    }

    /// Sets the per-poll probability of a one-tick reference move.
    #[must_use]
    pub fn with_walk_probability(mut self, probability: f64) -> Self {
        self.walk_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn set_reference_price(&mut self, price: Decimal) {
        self.reference_price = clamp_level_price(price);
    }

    fn jitter(&mut self) -> Decimal {
        let millis = self
            .rng
            .gen_range(-Self::MAX_JITTER_MILLIS..=Self::MAX_JITTER_MILLIS);
        Decimal::new(millis, 3)
    }

    fn size(&mut self) -> Decimal {
        let pct = self.rng.gen_range(50u32..=150);
        (self.depth * Decimal::from(pct) / dec!(100)).round()
    }
}

impl LevelQuoteSource for SyntheticLadderSource {
    fn reference_price(&self) -> Option<Decimal> {
        Some(self.reference_price)
    }

    fn quote_level(&mut self, level_price: Decimal, reference_price: Decimal) -> LevelQuote {
        if self.quoted_reference != Some(reference_price) {
            self.quotes.clear();
            self.quoted_reference = Some(reference_price);
        }
        if let Some(quote) = self.quotes.get(&level_price) {
            return *quote;
        }

        let distance = (level_price - reference_price).abs();
        let gross_edge = Self::BASE_EDGE - distance * Self::EDGE_DECAY + self.jitter();
        let quote = LevelQuote {
            yes_bid_size: self.size(),
            yes_ask_size: self.size(),
            yes_ask_price: level_price,
            no_bid_size: self.size(),
            no_ask_size: self.size(),
            no_ask_price: Decimal::ONE - level_price - gross_edge,
        };
        self.quotes.insert(level_price, quote);
        quote
    }

    fn poll(&mut self) {
        if self.rng.gen::<f64>() >= self.walk_probability {
            return;
        }
        let step = if self.rng.gen::<bool>() {
            self.tick_size
        } else {
            -self.tick_size
        };
        self.reference_price = (self.reference_price + step).clamp(dec!(0.05), dec!(0.95));
    }
}

/// Ladder source driven by the live top-of-book feed.
///
/// The reference is the YES mid. Each level's asks are the feed's best asks
/// shifted by the level's offset from the reference: the YES ask moves with
/// the level, the NO ask against it.
///
/// Like [`SyntheticLadderSource`] this is a placeholder, not a depth model:
/// every level carries the live pair cost, so all levels show the same edge
/// and NO asks below the reference sit under the live NO ask. A real book
/// source would quote each level from actual resting liquidity.
#[derive(Debug, Clone)]
pub struct SnapshotLadderSource {
    snapshot: MarketSnapshot,
    depth: Decimal,
}

impl SnapshotLadderSource {
    #[must_use]
    pub fn new(depth: Decimal) -> Self {
        Self {
            snapshot: MarketSnapshot::default(),
            depth,
        }
    }

    /// Latest snapshot seen by this source.
    #[must_use]
    pub fn snapshot(&self) -> &MarketSnapshot {
        &self.snapshot
    }
}

impl LevelQuoteSource for SnapshotLadderSource {
    fn reference_price(&self) -> Option<Decimal> {
        if self.snapshot.yes_ask.is_none() || self.snapshot.no_ask.is_none() {
            return None;
        }
        self.snapshot.yes_mid()
    }

    fn quote_level(&mut self, level_price: Decimal, reference_price: Decimal) -> LevelQuote {
        let offset = level_price - reference_price;
        let yes_ask = self.snapshot.yes_ask.unwrap_or(reference_price);
        let no_ask = self
            .snapshot
            .no_ask
            .unwrap_or(Decimal::ONE - reference_price);

        LevelQuote {
            yes_bid_size: self.depth,
            yes_ask_size: self.depth,
            yes_ask_price: yes_ask + offset,
            no_bid_size: self.depth,
            no_ask_size: self.depth,
            no_ask_price: no_ask - offset,
        }
    }

    fn on_snapshot(&mut self, snapshot: &MarketSnapshot) {
        self.snapshot = snapshot.clone();
    }
}

// =============================================================================
// Range check
// =============================================================================

/// Whether the live market has drifted away from the ladder's reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RangeCheck {
    InRange { drift_pct: Decimal },
    OutOfRange { drift_pct: Decimal },
    /// No executable price observed, or no reference to compare against.
    Unknown,
}

impl RangeCheck {
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, RangeCheck::OutOfRange { .. })
    }

    #[must_use]
    pub fn drift_pct(&self) -> Option<Decimal> {
        match self {
            RangeCheck::InRange { drift_pct } | RangeCheck::OutOfRange { drift_pct } => {
                Some(*drift_pct)
            }
            RangeCheck::Unknown => None,
        }
    }
}

/// Compares the feed's best executable YES price (YES ask, else `1 - NO ask`)
/// with the ladder reference.
#[must_use]
pub fn check_range(reference_price: Decimal, snapshot: &MarketSnapshot, tolerance_pct: Decimal) -> RangeCheck {
    if reference_price <= Decimal::ZERO {
        return RangeCheck::Unknown;
    }
    let Some(executable) = snapshot
        .yes_ask
        .or_else(|| snapshot.no_ask.map(|ask| Decimal::ONE - ask))
    else {
        return RangeCheck::Unknown;
    };

    let drift_pct = ((executable - reference_price).abs() / reference_price * dec!(100)).round_dp(4);
    if drift_pct > tolerance_pct {
        RangeCheck::OutOfRange { drift_pct }
    } else {
        RangeCheck::InRange { drift_pct }
    }
}

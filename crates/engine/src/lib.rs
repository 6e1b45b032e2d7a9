//! Arbitrage ladder engine for binary YES/NO markets.
//!
//! # Overview
//!
//! Buying one YES and one NO share pays out exactly $1.00 at resolution, so
//! a pair bought for less locks in the difference. The engine lays out a
//! ladder of price levels around the market, prices every level's pair net
//! of taker fees, and keeps a tiered set of orders on the best levels.
//!
//! For example, YES at $0.50 and NO at $0.47 with a 0.4% fee per leg:
//! - Pair cost: $0.97
//! - Gross edge: 3.0%
//! - Net edge: 3.0% - 2 × 0.4% = 2.2%
//!
//! # Modules
//!
//! - [`ladder`]: ladder geometry, quote sources and the range check
//! - [`edge`]: fee-adjusted edge per level
//! - [`sizing`]: front-loaded tier allocation
//! - [`reconciler`]: auto-mode planning and the active order set
//! - [`selection`]: two-step paired purchase
//! - [`gateway`] / [`paper_gateway`]: order submission seam and simulation
//! - [`engine`]: [`LadderEngine`], the single-owner driver
//!
//! # Example
//!
//! ```
//! use arb_ladder_engine::{EdgeCalculator, TieredSizer};
//! use rust_decimal_macros::dec;
//!
//! let edge = EdgeCalculator::new(dec!(0.4), dec!(0.5)).evaluate(dec!(0.50), dec!(0.47));
//! assert_eq!(edge.net_edge_pct, dec!(2.2));
//! assert!(edge.is_profitable);
//!
//! let tiers = TieredSizer::allocate(dec!(250), 5);
//! let total: rust_decimal::Decimal = tiers.iter().map(|t| t.dollars).sum();
//! assert_eq!(total, dec!(250));
//! ```

pub mod edge;
pub mod engine;
pub mod gateway;
pub mod ladder;
pub mod paper_gateway;
pub mod reconciler;
pub mod selection;
pub mod sizing;
pub mod types;

pub use edge::{AnnotatedLadder, AnnotatedLevel, EdgeCalculator, LevelEdgeInfo};
pub use engine::{DeployError, EngineControls, EngineView, LadderEngine, ReconcileOutcome};
pub use gateway::{DeployAck, DeployMode, GatewayError, OrderGateway};
pub use ladder::{
    check_range, Ladder, LadderBuilder, LevelQuote, LevelQuoteSource, OrderBookLevel, RangeCheck,
    SnapshotLadderSource, SyntheticLadderSource,
};
pub use paper_gateway::{PaperGateway, PaperGatewayConfig};
pub use reconciler::{
    DeployPlan, DeployRejection, Fingerprint, LadderReconciler, ReconcilePlan, Settlement, SkipReason,
};
pub use selection::{PairedArbSelection, PairedSelectionFlow, SelectionRejection};
pub use sizing::{ScaleDirection, TierAllocation, TieredSizer, MAX_TIERS, TIER_WEIGHTS};
pub use types::{ActiveLadderOrder, LadderOrderStatus};

//! Streaming market-data feed for one YES/NO token pair.
//!
//! - [`websocket`]: [`MarketDataFeed`] connection lifecycle, keep-alive and
//!   reconnection
//! - [`codec`]: subscription and inbound frame formats
//! - [`backoff`]: bounded exponential reconnect schedule

pub mod backoff;
pub mod codec;
pub mod error;
pub mod websocket;

pub use backoff::ReconnectPolicy;
pub use codec::{InboundFrame, RawQuote};
pub use error::FeedError;
pub use websocket::{FeedConfig, FeedEvent, InstrumentPair, MarketDataFeed};

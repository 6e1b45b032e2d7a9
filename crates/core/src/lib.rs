//! Shared types and configuration for the arbitrage ladder engine.

pub mod config;
pub mod config_loader;
pub mod market;

pub use config::{AppConfig, EngineSettings, FeedSettings, GatewaySettings, LadderSettings};
pub use config_loader::ConfigLoader;
pub use market::{
    clamp_price, ConnectionStatus, MarketSnapshot, PriceQuote, QuoteKind, TokenSide,
    MAX_QUOTE_PRICE, MIN_QUOTE_PRICE,
};

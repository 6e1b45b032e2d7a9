//! Wire format for the market channel.
//!
//! # Outbound
//!
//! ```json
//! { "assets_ids": ["<yes token>", "<no token>"], "type": "market" }
//! ```
//!
//! Keep-alive is a bare `PING` text frame; the server answers `PONG`.
//!
//! # Inbound
//!
//! A frame is a JSON object or an array of objects. Each object is one of:
//!
//! - a direct quote: `{"asset_id": "...", "price": "0.48", "side": "BID"}`
//! - `{"event_type": "price_change", "price_changes": [...]}` where each
//!   change carries `best_bid`/`best_ask`, or a `price` with a `BUY`/`SELL`
//!   side
//! - `{"event_type": "book", "asset_id": "...", "bids": [...], "asks": [...]}`
//! - `{"event_type": "pong"}`
//!
//! Anything else with an `event_type` is ignored.

use crate::error::FeedError;
use arb_ladder_core::QuoteKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Text frame sent on the keep-alive interval.
pub const PING_FRAME: &str = "PING";

/// A best-price update before it is mapped onto a token side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuote {
    pub instrument_id: String,
    pub kind: QuoteKind,
    pub price: Decimal,
}

/// Decoded contents of one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Quotes(Vec<RawQuote>),
    /// Liveness acknowledgment.
    Ack,
    /// Valid but irrelevant traffic.
    Ignored,
}

#[derive(Debug, Serialize)]
struct SubscriptionMessage<'a> {
    assets_ids: &'a [String],
    #[serde(rename = "type")]
    msg_type: &'static str,
}

/// Builds the subscription message naming both instruments.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn subscription_message(instrument_ids: &[String]) -> Result<String, FeedError> {
    let msg = SubscriptionMessage {
        assets_ids: instrument_ids,
        msg_type: "market",
    };
    Ok(serde_json::to_string(&msg)?)
}

/// Prices arrive as strings (`".48"`) or bare JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Text(String),
    Number(serde_json::Number),
}

impl RawPrice {
    fn to_decimal(&self) -> Result<Decimal, FeedError> {
        match self {
            RawPrice::Text(s) => parse_decimal(s),
            RawPrice::Number(n) => parse_decimal(&n.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectQuote {
    asset_id: String,
    price: RawPrice,
    side: String,
}

#[derive(Debug, Deserialize)]
struct PriceChangeMessage {
    #[serde(default)]
    price_changes: Vec<PriceChange>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    asset_id: String,
    #[serde(default)]
    price: Option<RawPrice>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    best_bid: Option<RawPrice>,
    #[serde(default)]
    best_ask: Option<RawPrice>,
}

#[derive(Debug, Deserialize)]
struct BookMessage {
    asset_id: String,
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
}

#[derive(Debug, Deserialize)]
struct BookLevel {
    price: RawPrice,
    size: RawPrice,
}

/// Decodes one inbound text frame.
///
/// # Errors
///
/// Returns error for invalid JSON or objects that look like quotes but
/// carry unusable fields. Callers log and drop these frames.
pub fn parse_frame(text: &str) -> Result<InboundFrame, FeedError> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("pong") {
        return Ok(InboundFrame::Ack);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let objects = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut quotes = Vec::new();
    let mut saw_ack = false;
    for object in objects {
        match parse_object(object)? {
            InboundFrame::Quotes(mut q) => quotes.append(&mut q),
            InboundFrame::Ack => saw_ack = true,
            InboundFrame::Ignored => {}
        }
    }

    Ok(if !quotes.is_empty() {
        InboundFrame::Quotes(quotes)
    } else if saw_ack {
        InboundFrame::Ack
    } else {
        InboundFrame::Ignored
    })
}

fn parse_object(object: Value) -> Result<InboundFrame, FeedError> {
    if !object.is_object() {
        return Err(FeedError::Malformed(format!("expected object, got {object}")));
    }

    let event_type = object
        .get("event_type")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase);

    match event_type.as_deref() {
        None => {
            let quote: DirectQuote = serde_json::from_value(object)?;
            Ok(InboundFrame::Quotes(vec![RawQuote {
                kind: parse_kind(&quote.side)?,
                price: quote.price.to_decimal()?,
                instrument_id: quote.asset_id,
            }]))
        }
        Some("price_change") => {
            let msg: PriceChangeMessage = serde_json::from_value(object)?;
            let mut quotes = Vec::with_capacity(msg.price_changes.len());
            for change in msg.price_changes {
                quotes.extend(price_change_quotes(change)?);
            }
            Ok(InboundFrame::Quotes(quotes))
        }
        Some("book") => {
            let msg: BookMessage = serde_json::from_value(object)?;
            book_quotes(msg).map(InboundFrame::Quotes)
        }
        Some("pong") => Ok(InboundFrame::Ack),
        Some(_) => Ok(InboundFrame::Ignored),
    }
}

fn price_change_quotes(change: PriceChange) -> Result<Vec<RawQuote>, FeedError> {
    let mut quotes = Vec::with_capacity(2);
    if let Some(bid) = &change.best_bid {
        quotes.push(RawQuote {
            instrument_id: change.asset_id.clone(),
            kind: QuoteKind::Bid,
            price: bid.to_decimal()?,
        });
    }
    if let Some(ask) = &change.best_ask {
        quotes.push(RawQuote {
            instrument_id: change.asset_id.clone(),
            kind: QuoteKind::Ask,
            price: ask.to_decimal()?,
        });
    }
    if !quotes.is_empty() {
        return Ok(quotes);
    }

    match (&change.price, &change.side) {
        (Some(price), Some(side)) => Ok(vec![RawQuote {
            instrument_id: change.asset_id,
            kind: parse_kind(side)?,
            price: price.to_decimal()?,
        }]),
        _ => Err(FeedError::Malformed(format!(
            "price change for {} has neither best prices nor price/side",
            change.asset_id
        ))),
    }
}

fn book_quotes(msg: BookMessage) -> Result<Vec<RawQuote>, FeedError> {
    let mut best_bid: Option<Decimal> = None;
    for level in &msg.bids {
        if level.size.to_decimal()? > Decimal::ZERO {
            let price = level.price.to_decimal()?;
            best_bid = Some(best_bid.map_or(price, |b| b.max(price)));
        }
    }

    let mut best_ask: Option<Decimal> = None;
    for level in &msg.asks {
        if level.size.to_decimal()? > Decimal::ZERO {
            let price = level.price.to_decimal()?;
            best_ask = Some(best_ask.map_or(price, |a| a.min(price)));
        }
    }

    let bid = best_bid.map(|price| RawQuote {
        instrument_id: msg.asset_id.clone(),
        kind: QuoteKind::Bid,
        price,
    });
    let ask = best_ask.map(|price| RawQuote {
        instrument_id: msg.asset_id.clone(),
        kind: QuoteKind::Ask,
        price,
    });
    Ok(bid.into_iter().chain(ask).collect())
}

/// Parses a decimal, accepting the `".48"` shorthand.
fn parse_decimal(s: &str) -> Result<Decimal, FeedError> {
    let s = s.trim();
    let normalized = if s.starts_with('.') {
        format!("0{s}")
    } else {
        s.to_string()
    };
    Decimal::from_str(&normalized).map_err(|e| FeedError::Malformed(format!("bad price {s:?}: {e}")))
}

/// Maps a side label onto the book side it describes.
fn parse_kind(s: &str) -> Result<QuoteKind, FeedError> {
    match s.to_ascii_uppercase().as_str() {
        "BID" | "BUY" | "B" => Ok(QuoteKind::Bid),
        "ASK" | "SELL" | "S" => Ok(QuoteKind::Ask),
        other => Err(FeedError::Malformed(format!("unknown side {other:?}"))),
    }
}

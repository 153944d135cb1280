use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick data for the tracked instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Breakout channel derived from the previous candle's extremes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelBounds {
    pub upper: f64,
    pub lower: f64,
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Free/locked balance for one asset, as reported by the exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AssetBalance {
    pub free: f64,
    pub locked: f64,
}

impl AssetBalance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Whether we currently hold the base asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Flat,
    Long,
}

/// Current holdings, classified against the dust threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub side: PositionSide,
    pub quantity: f64,
}

impl PositionState {
    pub fn flat() -> Self {
        Self {
            side: PositionSide::Flat,
            quantity: 0.0,
        }
    }
}

/// The one stop order this cycle wants resting on the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOrder {
    pub side: OrderSide,
    pub quantity: f64,
    pub trigger_price: f64,
}

/// A live resting order on the exchange for the tracked instrument
#[derive(Debug, Clone, PartialEq)]
pub struct LiveOrder {
    pub order_id: u64,
    pub trigger_price: f64,
}

/// One partial execution returned with a placement acknowledgment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
}

/// Exchange acknowledgment for an accepted order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: u64,
    pub fills: Vec<Fill>,
}

/// Outcome of one placement call.
///
/// Rejection is a tagged result, not an error: the executor decides the
/// fallback by inspecting the tag. Transport failures still surface as
/// errors from the capability.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Accepted(OrderAck),
    Rejected(String),
}

/// One audit record per placement call that produced at least one fill
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub avg_price: f64,
    pub quantity: f64,
}

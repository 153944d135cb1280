pub mod binance;

pub use binance::BinanceClient;

use std::collections::HashMap;

use crate::models::{AssetBalance, Candle, LiveOrder, OrderSide, Placement, TargetOrder};
use crate::Result;

/// Exchange capability consumed by the execution engine.
///
/// Components receive an implementation at construction time, never a
/// shared global handle, so each one is testable against a substitute.
/// The engine assumes it is the sole writer to this instrument's order
/// book; that precondition is documented, not enforced.
#[allow(async_fn_in_trait)]
pub trait SpotExchange {
    /// Ordered OHLCV history, oldest first, strictly increasing timestamps.
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32)
        -> Result<Vec<Candle>>;

    /// Free/locked balances keyed by asset.
    async fn account_balances(&self) -> Result<HashMap<String, AssetBalance>>;

    /// Live resting orders for the symbol.
    async fn open_orders(&self, symbol: &str) -> Result<Vec<LiveOrder>>;

    /// Submit a stop-trigger order. Exchange rejections come back as
    /// `Placement::Rejected`; `Err` is reserved for transport failures.
    async fn place_stop_order(&self, symbol: &str, order: &TargetOrder) -> Result<Placement>;

    /// Submit an immediate market order.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<Placement>;

    /// Cancel a resting order. Cancelling an already-terminal order fails;
    /// callers treat that as already-absent.
    async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<()>;
}

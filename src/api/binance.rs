use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;

use crate::api::SpotExchange;
use crate::models::{
    AssetBalance, Candle, Fill, LiveOrder, OrderAck, OrderSide, Placement, TargetOrder,
};
use crate::Result;

// Spot REST API weight limit leaves plenty of headroom at this rate
const REQUESTS_PER_SECOND: u32 = 10;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot REST client.
///
/// Cloneable so it can be shared across tasks; clones share the same rate
/// limiter. Requests carry the API key header only; request signing is a
/// deployment concern outside this bot. No automatic retries: a failed call
/// fails the cycle and the next scheduled tick starts over.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<BinanceRateLimiter>,
}

/// One entry of the /api/v3/account balances array
#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

/// Resting order as returned by /api/v3/openOrders
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenOrderEntry {
    order_id: u64,
    stop_price: String,
}

#[derive(Debug, Deserialize)]
struct FillEntry {
    price: String,
    qty: String,
}

/// Acknowledgment from /api/v3/order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    #[serde(default)]
    fills: Vec<FillEntry>,
}

/// Error body Binance returns alongside 4xx statuses
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap());

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Make a rate-limited request and fail on any non-success status.
    async fn send_checked(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let response = request.header("X-MBX-APIKEY", &self.api_key).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Binance API error ({}): {}", status, body).into());
        }

        Ok(response)
    }

    /// Make a rate-limited order request, mapping exchange rejections
    /// (4xx with a code/msg body) into `Placement::Rejected`.
    async fn send_order(&self, request: reqwest::RequestBuilder) -> Result<Placement> {
        self.rate_limiter.until_ready().await;

        let response = request.header("X-MBX-APIKEY", &self.api_key).send().await?;
        let status = response.status();

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => format!("{} (code {})", err.msg, err.code),
                Err(_) => format!("HTTP {}: {}", status, body),
            };
            return Ok(Placement::Rejected(reason));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Binance API error ({}): {}", status, body).into());
        }

        let ack: OrderResponse = response.json().await?;
        Ok(Placement::Accepted(ack.try_into()?))
    }
}

impl TryFrom<OrderResponse> for OrderAck {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(response: OrderResponse) -> Result<OrderAck> {
        let mut fills = Vec::with_capacity(response.fills.len());
        for fill in &response.fills {
            fills.push(Fill {
                price: fill.price.parse()?,
                quantity: fill.qty.parse()?,
            });
        }
        Ok(OrderAck {
            order_id: response.order_id,
            fills,
        })
    }
}

impl SpotExchange for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let rows: Vec<serde_json::Value> = self.send_checked(self.client.get(&url)).await?.json().await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            candles.push(parse_kline(row)?);
        }

        validate_candle_order(&candles)?;

        tracing::debug!("Fetched {} {} candles for {}", candles.len(), interval, symbol);
        Ok(candles)
    }

    async fn account_balances(&self) -> Result<HashMap<String, AssetBalance>> {
        let url = format!("{}/api/v3/account", self.base_url);
        let account: AccountResponse =
            self.send_checked(self.client.get(&url)).await?.json().await?;

        let mut balances = HashMap::with_capacity(account.balances.len());
        for entry in &account.balances {
            balances.insert(
                entry.asset.clone(),
                AssetBalance {
                    free: entry.free.parse()?,
                    locked: entry.locked.parse()?,
                },
            );
        }
        Ok(balances)
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<LiveOrder>> {
        let url = format!("{}/api/v3/openOrders?symbol={}", self.base_url, symbol);
        let entries: Vec<OpenOrderEntry> =
            self.send_checked(self.client.get(&url)).await?.json().await?;

        let mut orders = Vec::with_capacity(entries.len());
        for entry in &entries {
            orders.push(LiveOrder {
                order_id: entry.order_id,
                trigger_price: entry.stop_price.parse()?,
            });
        }
        Ok(orders)
    }

    async fn place_stop_order(&self, symbol: &str, order: &TargetOrder) -> Result<Placement> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", order.side.to_string()),
            ("type", "STOP_LOSS".to_string()),
            ("quantity", format!("{:.6}", order.quantity)),
            ("stopPrice", format!("{:.2}", order.trigger_price)),
        ];
        let request = self
            .client
            .post(format!("{}/api/v3/order", self.base_url))
            .query(&params);
        self.send_order(request).await
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<Placement> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format!("{:.6}", quantity)),
        ];
        let request = self
            .client
            .post(format!("{}/api/v3/order", self.base_url))
            .query(&params);
        self.send_order(request).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<()> {
        let url = format!(
            "{}/api/v3/order?symbol={}&orderId={}",
            self.base_url, symbol, order_id
        );
        self.send_checked(self.client.delete(&url)).await?;
        Ok(())
    }
}

/// Parse one kline row. Binance encodes klines as positional arrays with
/// string-encoded prices: [open_time, open, high, low, close, volume, ...]
fn parse_kline(row: &serde_json::Value) -> Result<Candle> {
    let open_time = row
        .get(0)
        .and_then(serde_json::Value::as_i64)
        .ok_or("malformed kline: missing open time")?;

    let timestamp = parse_timestamp_ms(open_time)?;

    Ok(Candle {
        timestamp,
        open: kline_price(row, 1)?,
        high: kline_price(row, 2)?,
        low: kline_price(row, 3)?,
        close: kline_price(row, 4)?,
        volume: kline_price(row, 5)?,
    })
}

fn parse_timestamp_ms(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| format!("invalid kline timestamp: {}", ms).into())
}

fn kline_price(row: &serde_json::Value, index: usize) -> Result<f64> {
    let raw = row
        .get(index)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| format!("malformed kline: field {} is not a string", index))?;
    Ok(raw.parse()?)
}

/// Reject out-of-order history; the channel calculation depends on the
/// second-to-last candle actually being the previous bar.
fn validate_candle_order(candles: &[Candle]) -> anyhow::Result<()> {
    for window in candles.windows(2) {
        if window[1].timestamp <= window[0].timestamp {
            anyhow::bail!(
                "klines out of order: {} followed by {}",
                window[0].timestamp,
                window[1].timestamp
            );
        }
    }
    Ok(())
}

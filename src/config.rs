use crate::Result;

/// Binance spot testnet; override BINANCE_BASE_URL for the live exchange.
const DEFAULT_BASE_URL: &str = "https://testnet.binance.vision";

/// Runtime settings, loaded from the environment.
///
/// Every knob has a default matching the reference BTCUSDT setup except the
/// API key, which is required.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub symbol: String,
    pub base_asset: String,
    pub interval: String,
    pub candle_limit: u32,
    pub poll_interval_secs: u64,
    /// Price granularity: breakout offset is one tick, and live-order
    /// prices are compared at tick resolution.
    pub price_tick: f64,
    /// Holdings below this count as flat.
    pub dust_threshold: f64,
    /// Entry size handed to the fixed sizer.
    pub order_quantity: f64,
    pub trade_log_path: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| "BINANCE_API_KEY not found in environment")?;

        Ok(Self {
            api_key,
            base_url: env_or("BINANCE_BASE_URL", DEFAULT_BASE_URL),
            symbol: env_or("SYMBOL", "BTCUSDT"),
            base_asset: env_or("BASE_ASSET", "BTC"),
            interval: env_or("TIMEFRAME", "1m"),
            candle_limit: env_parse_or("CANDLE_LIMIT", 5),
            poll_interval_secs: env_parse_or("POLL_INTERVAL_SECS", 30),
            price_tick: env_parse_or("PRICE_TICK", 1.0),
            dust_threshold: env_parse_or("DUST_THRESHOLD", 0.00015),
            order_quantity: env_parse_or("ORDER_QUANTITY", 0.001),
            trade_log_path: env_or("TRADE_LOG_FILE", "trade_log.csv"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

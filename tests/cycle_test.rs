use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use channelbot::api::SpotExchange;
use channelbot::execution::{CycleConfig, CycleOutcome, ExecutionCycle, ExecutionMechanism};
use channelbot::persistence::TradeLogSink;
use channelbot::risk::FixedQuantitySizer;
use channelbot::{
    AssetBalance, Candle, CycleError, Fill, LiveOrder, OrderAck, OrderSide, Placement,
    TargetOrder, TradeLogEntry,
};
use chrono::Utc;

#[derive(Clone)]
enum PlacementBehavior {
    Accept(Vec<Fill>),
    Reject(String),
}

impl PlacementBehavior {
    fn to_placement(&self) -> Placement {
        match self {
            PlacementBehavior::Accept(fills) => Placement::Accepted(OrderAck {
                order_id: 1,
                fills: fills.clone(),
            }),
            PlacementBehavior::Reject(reason) => Placement::Rejected(reason.clone()),
        }
    }
}

/// In-memory exchange with an observable order book and call log
#[derive(Clone)]
struct MockExchange {
    candles: Vec<Candle>,
    balances: HashMap<String, AssetBalance>,
    book: Arc<Mutex<Vec<LiveOrder>>>,
    stop_behavior: PlacementBehavior,
    market_behavior: PlacementBehavior,
    stop_calls: Arc<Mutex<Vec<TargetOrder>>>,
    market_calls: Arc<Mutex<Vec<(OrderSide, f64)>>>,
    cancel_calls: Arc<Mutex<Vec<u64>>>,
}

impl MockExchange {
    fn new(candles: Vec<Candle>, balances: HashMap<String, AssetBalance>) -> Self {
        Self {
            candles,
            balances,
            book: Arc::new(Mutex::new(Vec::new())),
            stop_behavior: PlacementBehavior::Accept(vec![]),
            market_behavior: PlacementBehavior::Accept(vec![]),
            stop_calls: Arc::new(Mutex::new(Vec::new())),
            market_calls: Arc::new(Mutex::new(Vec::new())),
            cancel_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_resting_order(self, order_id: u64, trigger_price: f64) -> Self {
        self.book.lock().unwrap().push(LiveOrder {
            order_id,
            trigger_price,
        });
        self
    }
}

impl SpotExchange for MockExchange {
    async fn fetch_candles(
        &self,
        _symbol: &str,
        _interval: &str,
        _limit: u32,
    ) -> channelbot::Result<Vec<Candle>> {
        Ok(self.candles.clone())
    }

    async fn account_balances(&self) -> channelbot::Result<HashMap<String, AssetBalance>> {
        Ok(self.balances.clone())
    }

    async fn open_orders(&self, _symbol: &str) -> channelbot::Result<Vec<LiveOrder>> {
        Ok(self.book.lock().unwrap().clone())
    }

    async fn place_stop_order(
        &self,
        _symbol: &str,
        order: &TargetOrder,
    ) -> channelbot::Result<Placement> {
        self.stop_calls.lock().unwrap().push(order.clone());
        Ok(self.stop_behavior.to_placement())
    }

    async fn place_market_order(
        &self,
        _symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> channelbot::Result<Placement> {
        self.market_calls.lock().unwrap().push((side, quantity));
        Ok(self.market_behavior.to_placement())
    }

    async fn cancel_order(&self, _symbol: &str, order_id: u64) -> channelbot::Result<()> {
        self.cancel_calls.lock().unwrap().push(order_id);
        self.book.lock().unwrap().retain(|o| o.order_id != order_id);
        Ok(())
    }
}

/// Sink that keeps a shared handle to its entries for post-run assertions
#[derive(Clone, Default)]
struct MemorySink {
    entries: Arc<Mutex<Vec<TradeLogEntry>>>,
}

impl TradeLogSink for MemorySink {
    fn append(&mut self, entry: &TradeLogEntry) -> channelbot::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

fn candles_from_extremes(extremes: &[(f64, f64)]) -> Vec<Candle> {
    extremes
        .iter()
        .enumerate()
        .map(|(i, &(high, low))| Candle {
            timestamp: Utc::now() + chrono::Duration::minutes(i as i64),
            open: low,
            high,
            low,
            close: high,
            volume: 1000.0,
        })
        .collect()
}

fn btc_balance(free: f64, locked: f64) -> HashMap<String, AssetBalance> {
    let mut balances = HashMap::new();
    balances.insert("BTC".to_string(), AssetBalance { free, locked });
    balances.insert(
        "USDT".to_string(),
        AssetBalance {
            free: 10_000.0,
            locked: 0.0,
        },
    );
    balances
}

fn test_config() -> CycleConfig {
    CycleConfig {
        symbol: "BTCUSDT".to_string(),
        base_asset: "BTC".to_string(),
        interval: "1m".to_string(),
        candle_limit: 5,
        price_tick: 1.0,
        dust_threshold: 0.00015,
    }
}

fn build_cycle(
    exchange: MockExchange,
    sink: MemorySink,
) -> ExecutionCycle<MockExchange, FixedQuantitySizer, MemorySink> {
    ExecutionCycle::new(exchange, FixedQuantitySizer::new(0.001), sink, test_config())
}

#[tokio::test]
async fn flat_position_arms_breakout_buy_and_resting_stop_logs_nothing() {
    // Prior candle: high 50200, low 50000; the forming candle must be ignored
    let candles = candles_from_extremes(&[(50100.0, 49900.0), (50200.0, 50000.0), (50500.0, 49500.0)]);
    let exchange = MockExchange::new(candles, btc_balance(0.0, 0.0));
    let sink = MemorySink::default();

    let outcome = build_cycle(exchange.clone(), sink.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Placed {
            side: OrderSide::Buy,
            trigger_price: 50201.0,
            mechanism: ExecutionMechanism::Stop,
            filled_quantity: 0.0,
        }
    );

    let stops = exchange.stop_calls.lock().unwrap();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].quantity, 0.001); // from the sizing collaborator
    assert_eq!(stops[0].trigger_price, 50201.0);

    assert!(exchange.cancel_calls.lock().unwrap().is_empty());
    assert!(exchange.market_calls.lock().unwrap().is_empty());
    // Zero fills: the stop rests, nothing to audit
    assert!(sink.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn long_position_with_resting_exit_skips_without_mutation() {
    // Prior candle low 49000 -> exit trigger 48999, already resting
    let candles = candles_from_extremes(&[(50200.0, 49000.0), (50100.0, 49800.0)]);
    let exchange =
        MockExchange::new(candles, btc_balance(0.3, 0.2)).with_resting_order(7, 48999.0);
    let sink = MemorySink::default();

    let outcome = build_cycle(exchange.clone(), sink.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Skipped {
            trigger_price: 48999.0
        }
    );
    assert!(exchange.cancel_calls.lock().unwrap().is_empty());
    assert!(exchange.stop_calls.lock().unwrap().is_empty());
    assert!(exchange.market_calls.lock().unwrap().is_empty());
    assert!(sink.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stale_order_is_replaced_and_fallback_fills_are_aggregated() {
    let candles = candles_from_extremes(&[(50200.0, 49000.0), (50100.0, 49800.0)]);
    let mut exchange =
        MockExchange::new(candles, btc_balance(0.5, 0.0)).with_resting_order(3, 50150.0);
    exchange.stop_behavior = PlacementBehavior::Reject("trigger would fire immediately".into());
    exchange.market_behavior = PlacementBehavior::Accept(vec![
        Fill {
            price: 49000.0,
            quantity: 0.3,
        },
        Fill {
            price: 48995.0,
            quantity: 0.2,
        },
    ]);
    let sink = MemorySink::default();

    let outcome = build_cycle(exchange.clone(), sink.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Placed {
            side: OrderSide::Sell,
            trigger_price: 48999.0,
            mechanism: ExecutionMechanism::MarketFallback,
            filled_quantity: 0.5,
        }
    );

    assert_eq!(*exchange.cancel_calls.lock().unwrap(), vec![3]);
    assert_eq!(
        *exchange.market_calls.lock().unwrap(),
        vec![(OrderSide::Sell, 0.5)]
    );

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].side, OrderSide::Sell);
    assert_eq!(entries[0].quantity, 0.5);
    // (49000 * 0.3 + 48995 * 0.2) / 0.5
    assert!((entries[0].avg_price - 48998.0).abs() < 1e-9);
}

#[tokio::test]
async fn insufficient_history_aborts_before_any_mutation() {
    let candles = candles_from_extremes(&[(50200.0, 50000.0)]);
    let exchange = MockExchange::new(candles, btc_balance(0.5, 0.0)).with_resting_order(9, 1.0);
    let sink = MemorySink::default();

    let err = build_cycle(exchange.clone(), sink)
        .run_once()
        .await
        .unwrap_err();

    assert!(matches!(err, CycleError::InsufficientHistory { got: 1, .. }));
    assert!(exchange.cancel_calls.lock().unwrap().is_empty());
    assert!(exchange.stop_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_base_asset_degrades_to_flat_entry() {
    let candles = candles_from_extremes(&[(50200.0, 50000.0), (50500.0, 49500.0)]);
    let mut balances = HashMap::new();
    balances.insert(
        "USDT".to_string(),
        AssetBalance {
            free: 10_000.0,
            locked: 0.0,
        },
    );
    let exchange = MockExchange::new(candles, balances);
    let sink = MemorySink::default();

    let outcome = build_cycle(exchange.clone(), sink)
        .run_once()
        .await
        .unwrap();

    // Degraded to flat: arms the breakout buy instead of failing
    assert!(matches!(
        outcome,
        CycleOutcome::Placed {
            side: OrderSide::Buy,
            trigger_price,
            ..
        } if trigger_price == 50201.0
    ));
}

#[tokio::test]
async fn second_cycle_with_unchanged_state_is_a_no_op() {
    let candles = candles_from_extremes(&[(50200.0, 50000.0), (50500.0, 49500.0)]);
    let exchange = MockExchange::new(candles, btc_balance(0.0, 0.0));
    let sink = MemorySink::default();
    let mut cycle = build_cycle(exchange.clone(), sink);

    let first = cycle.run_once().await.unwrap();
    assert!(matches!(first, CycleOutcome::Placed { .. }));

    // Simulate the accepted stop now resting on the book
    exchange.book.lock().unwrap().push(LiveOrder {
        order_id: 11,
        trigger_price: 50201.0,
    });

    let second = cycle.run_once().await.unwrap();
    assert_eq!(
        second,
        CycleOutcome::Skipped {
            trigger_price: 50201.0
        }
    );
    assert!(exchange.cancel_calls.lock().unwrap().is_empty());
    assert_eq!(exchange.stop_calls.lock().unwrap().len(), 1);
}

use crate::api::SpotExchange;
use crate::config::Settings;
use crate::error::CycleError;
use crate::execution::executor::{ExecutionMechanism, OrderExecutor};
use crate::execution::position::PositionTracker;
use crate::execution::reconciler::{OrderReconciler, ReconcileAction};
use crate::indicators::channel_bounds;
use crate::models::{ChannelBounds, OrderSide, PositionSide, PositionState, TargetOrder};
use crate::persistence::{FillLogger, TradeLogSink};
use crate::risk::PositionSizer;

/// Instrument parameters the cycle needs each tick
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub symbol: String,
    pub base_asset: String,
    pub interval: String,
    pub candle_limit: u32,
    pub price_tick: f64,
    pub dust_threshold: f64,
}

impl From<&Settings> for CycleConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            symbol: settings.symbol.clone(),
            base_asset: settings.base_asset.clone(),
            interval: settings.interval.clone(),
            candle_limit: settings.candle_limit,
            price_tick: settings.price_tick,
            dust_threshold: settings.dust_threshold,
        }
    }
}

/// What one pass did, for observability
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The target order already rests on the exchange
    Skipped { trigger_price: f64 },
    Placed {
        side: OrderSide,
        trigger_price: f64,
        mechanism: ExecutionMechanism,
        filled_quantity: f64,
    },
}

/// One decision-and-act pass over the tracked instrument.
///
/// Strict sequence per tick: candles, balances, bounds and position, target
/// derivation, reconciliation, placement, fill logging. Read failures abort
/// the pass before any exchange mutation. The exchange book may still move
/// between the reconciliation read and the placement write; that race is
/// accepted and converges on the next tick. Assumes this process is the sole
/// writer to the instrument's order book.
pub struct ExecutionCycle<E, Z, S> {
    exchange: E,
    sizer: Z,
    logger: FillLogger<S>,
    tracker: PositionTracker,
    config: CycleConfig,
}

impl<E, Z, S> ExecutionCycle<E, Z, S>
where
    E: SpotExchange,
    Z: PositionSizer,
    S: TradeLogSink,
{
    pub fn new(exchange: E, sizer: Z, sink: S, config: CycleConfig) -> Self {
        let tracker = PositionTracker::new(config.base_asset.clone(), config.dust_threshold);
        Self {
            exchange,
            sizer,
            logger: FillLogger::new(sink),
            tracker,
            config,
        }
    }

    pub async fn run_once(&mut self) -> Result<CycleOutcome, CycleError> {
        let candles = self
            .exchange
            .fetch_candles(&self.config.symbol, &self.config.interval, self.config.candle_limit)
            .await
            .map_err(|e| CycleError::exchange("fetch_candles", e))?;

        let bounds = channel_bounds(&candles)?;

        let balances = self
            .exchange
            .account_balances()
            .await
            .map_err(|e| CycleError::exchange("account_balances", e))?;

        let position = match self.tracker.position(&balances) {
            Ok(position) => position,
            Err(CycleError::BalanceUnavailable { asset }) => {
                // Most accounts report a zero balance rather than omitting
                // the asset; treat the odd omission as flat.
                tracing::warn!("No balance entry for {}, treating position as flat", asset);
                PositionState::flat()
            }
            Err(e) => return Err(e),
        };

        let target = target_order(&position, &bounds, self.config.price_tick, &self.sizer);
        tracing::info!(
            "Channel [{}, {}], position {:?} {:.6} -> target {} {:.6} @ trigger {}",
            bounds.lower,
            bounds.upper,
            position.side,
            position.quantity,
            target.side,
            target.quantity,
            target.trigger_price
        );

        let live_orders = self
            .exchange
            .open_orders(&self.config.symbol)
            .await
            .map_err(|e| CycleError::exchange("open_orders", e))?;

        let reconciler =
            OrderReconciler::new(&self.exchange, &self.config.symbol, self.config.price_tick);

        match reconciler.reconcile(&live_orders, &target).await? {
            ReconcileAction::Skip => Ok(CycleOutcome::Skipped {
                trigger_price: target.trigger_price,
            }),
            ReconcileAction::Place(order) => {
                let executor = OrderExecutor::new(&self.exchange, &self.config.symbol);
                let result = executor.execute(&order).await?;

                let filled_quantity = result.fills.iter().map(|f| f.quantity).sum();
                self.logger.record(&result, order.side);

                Ok(CycleOutcome::Placed {
                    side: order.side,
                    trigger_price: order.trigger_price,
                    mechanism: result.mechanism,
                    filled_quantity,
                })
            }
        }
    }
}

/// Derive the one order this cycle wants resting on the exchange.
///
/// Flat arms a breakout buy one tick above the channel, sized by the
/// collaborator; long arms a full-exit sell one tick below it.
pub fn target_order<Z: PositionSizer>(
    position: &PositionState,
    bounds: &ChannelBounds,
    price_tick: f64,
    sizer: &Z,
) -> TargetOrder {
    match position.side {
        PositionSide::Flat => TargetOrder {
            side: OrderSide::Buy,
            quantity: sizer.size_position(),
            trigger_price: bounds.upper + price_tick,
        },
        PositionSide::Long => TargetOrder {
            side: OrderSide::Sell,
            quantity: position.quantity,
            trigger_price: bounds.lower - price_tick,
        },
    }
}

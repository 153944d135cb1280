use crate::api::SpotExchange;
use crate::error::CycleError;
use crate::models::{LiveOrder, TargetOrder};

/// What the executor should do after the live order set has been converged
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    /// An order already rests at the target trigger price
    Skip,
    Place(TargetOrder),
}

/// Converges the live order set toward at most one resting order at the
/// target trigger price.
///
/// Only one resting order is permitted for the instrument at a time, so
/// every live order off the target price is cancelled regardless of side.
/// Prices are compared at tick granularity: exchange-returned floats carry
/// representation noise and bit-exact equality would re-place duplicates.
pub struct OrderReconciler<'a, E> {
    exchange: &'a E,
    symbol: &'a str,
    price_tick: f64,
}

impl<'a, E: SpotExchange> OrderReconciler<'a, E> {
    pub fn new(exchange: &'a E, symbol: &'a str, price_tick: f64) -> Self {
        Self {
            exchange,
            symbol,
            price_tick,
        }
    }

    /// Cancel stale orders, then decide whether the target still needs to
    /// be placed.
    ///
    /// Open orders are re-read after cancellation, immediately before the
    /// decision: the book may have changed since the cycle's first read.
    /// Idempotent for an unchanged live set and target.
    pub async fn reconcile(
        &self,
        live_orders: &[LiveOrder],
        target: &TargetOrder,
    ) -> Result<ReconcileAction, CycleError> {
        for order in live_orders {
            if self.same_tick(order.trigger_price, target.trigger_price) {
                continue;
            }

            match self.exchange.cancel_order(self.symbol, order.order_id).await {
                Ok(()) => {
                    tracing::info!(
                        "Cancelled stale order {} at {}",
                        order.order_id,
                        order.trigger_price
                    );
                }
                Err(e) => {
                    // Already filled or cancelled: treat as absent
                    tracing::debug!(
                        "Ignoring cancellation failure for order {}: {}",
                        order.order_id,
                        e
                    );
                }
            }
        }

        let remaining = self
            .exchange
            .open_orders(self.symbol)
            .await
            .map_err(|e| CycleError::exchange("open_orders", e))?;

        if remaining
            .iter()
            .any(|o| self.same_tick(o.trigger_price, target.trigger_price))
        {
            tracing::info!(
                "Order already resting at {}, nothing to place",
                target.trigger_price
            );
            Ok(ReconcileAction::Skip)
        } else {
            Ok(ReconcileAction::Place(target.clone()))
        }
    }

    fn same_tick(&self, a: f64, b: f64) -> bool {
        quantize(a, self.price_tick) == quantize(b, self.price_tick)
    }
}

fn quantize(price: f64, tick: f64) -> i64 {
    (price / tick).round() as i64
}

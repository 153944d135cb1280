use crate::api::SpotExchange;
use crate::error::CycleError;
use crate::models::{Fill, Placement, TargetOrder};

/// Which placement path produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMechanism {
    Stop,
    MarketFallback,
}

/// Fills produced by one placement call, tagged with the path that
/// succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub fills: Vec<Fill>,
    pub mechanism: ExecutionMechanism,
}

/// Places the target stop order, falling back to an immediate market order
/// when the stop is rejected.
///
/// The fallback fires on any primary failure, rejection or transport alike:
/// better to execute at market than to silently skip a signal. It fires at
/// most once; if both paths fail the cycle reports `ExecutionFailed` and the
/// next tick retries from scratch.
pub struct OrderExecutor<'a, E> {
    exchange: &'a E,
    symbol: &'a str,
}

impl<'a, E: SpotExchange> OrderExecutor<'a, E> {
    pub fn new(exchange: &'a E, symbol: &'a str) -> Self {
        Self { exchange, symbol }
    }

    pub async fn execute(&self, target: &TargetOrder) -> Result<ExecutionResult, CycleError> {
        let stop_reason = match self.exchange.place_stop_order(self.symbol, target).await {
            Ok(Placement::Accepted(ack)) => {
                tracing::info!(
                    "Placed {} stop order: {} @ trigger {}",
                    target.side,
                    target.quantity,
                    target.trigger_price
                );
                return Ok(ExecutionResult {
                    fills: ack.fills,
                    mechanism: ExecutionMechanism::Stop,
                });
            }
            Ok(Placement::Rejected(reason)) => reason,
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            "Stop order rejected ({}), falling back to {} market order",
            stop_reason,
            target.side
        );

        match self
            .exchange
            .place_market_order(self.symbol, target.side, target.quantity)
            .await
        {
            Ok(Placement::Accepted(ack)) => {
                tracing::info!(
                    "Placed {} market order for {}",
                    target.side,
                    target.quantity
                );
                Ok(ExecutionResult {
                    fills: ack.fills,
                    mechanism: ExecutionMechanism::MarketFallback,
                })
            }
            Ok(Placement::Rejected(fallback_reason)) => Err(CycleError::ExecutionFailed {
                stop_reason,
                fallback_reason,
            }),
            Err(e) => Err(CycleError::ExecutionFailed {
                stop_reason,
                fallback_reason: e.to_string(),
            }),
        }
    }
}

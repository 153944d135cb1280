/// Breakout channel bounds
///
/// The channel is the previous candle's high/low: a 1-period rolling extreme
/// shifted back by one bar. The executing candle never contributes its own
/// still-forming high/low, so a candle with no predecessor has no bounds and
/// must be skipped rather than zero-filled.
use crate::error::CycleError;
use crate::models::{Candle, ChannelBounds};

const MIN_CANDLES: usize = 2;

/// Derive channel bounds from candle history, newest last.
///
/// Uses the second-to-last candle's extremes. Fails with
/// `InsufficientHistory` when fewer than 2 candles are supplied.
pub fn channel_bounds(candles: &[Candle]) -> Result<ChannelBounds, CycleError> {
    if candles.len() < MIN_CANDLES {
        return Err(CycleError::InsufficientHistory {
            got: candles.len(),
            need: MIN_CANDLES,
        });
    }

    let previous = &candles[candles.len() - 2];

    Ok(ChannelBounds {
        upper: previous.high,
        lower: previous.low,
    })
}

use thiserror::Error;

/// Failures that end or degrade one execution cycle.
///
/// Rejected stop placements, ignored cancellations and trade-log write
/// failures are absorbed where they happen (fallback, debug log, error log)
/// and never surface as cycle errors.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Fewer candles than the channel needs; aborts before any exchange
    /// mutation.
    #[error("insufficient candle history: have {got}, need at least {need}")]
    InsufficientHistory { got: usize, need: usize },

    /// The tracked base asset is missing from the balance response. The
    /// cycle treats this as flat and continues.
    #[error("no balance entry for asset {asset}")]
    BalanceUnavailable { asset: String },

    /// A read-step exchange call failed; no mutation is attempted this
    /// cycle.
    #[error("exchange call failed during {step}: {reason}")]
    Exchange { step: &'static str, reason: String },

    /// Both the stop order and the market fallback failed. No order is
    /// live; the next cycle retries from scratch.
    #[error("execution failed: stop order rejected ({stop_reason}); market fallback failed ({fallback_reason})")]
    ExecutionFailed {
        stop_reason: String,
        fallback_reason: String,
    },
}

impl CycleError {
    pub(crate) fn exchange(step: &'static str, err: impl std::fmt::Display) -> Self {
        CycleError::Exchange {
            step,
            reason: err.to_string(),
        }
    }
}

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;

use crate::execution::ExecutionResult;
use crate::models::{OrderSide, TradeLogEntry};
use crate::Result;

/// Append-only audit sink for executed trades
pub trait TradeLogSink {
    fn append(&mut self, entry: &TradeLogEntry) -> Result<()>;
}

/// Flat CSV trade log, one record per line:
/// `YYYY-MM-DD HH:MM:SS,SIDE,avg_price,quantity`
///
/// Columns are fixed and human-auditable; the file is opened in append mode
/// and each record is flushed immediately.
pub struct CsvTradeLog {
    file: File,
}

impl CsvTradeLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self { file })
    }
}

impl TradeLogSink for CsvTradeLog {
    fn append(&mut self, entry: &TradeLogEntry) -> Result<()> {
        writeln!(
            self.file,
            "{},{},{:.2},{:.6}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.side,
            entry.avg_price,
            entry.quantity
        )?;
        self.file.flush()?;
        Ok(())
    }
}

/// Aggregates the fills of one placement into a single audit record.
///
/// Stop orders usually rest unfilled at placement time, so most executions
/// produce nothing here. A sink write failure is logged and swallowed: the
/// trade already happened and must not be rolled back over bookkeeping.
pub struct FillLogger<S> {
    sink: S,
}

impl<S: TradeLogSink> FillLogger<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn record(&mut self, result: &ExecutionResult, side: OrderSide) {
        let Some(entry) = aggregate_fills(result, side) else {
            return;
        };

        match self.sink.append(&entry) {
            Ok(()) => tracing::info!(
                "Logged trade: {} {:.6} @ avg {:.2}",
                entry.side,
                entry.quantity,
                entry.avg_price
            ),
            Err(e) => tracing::error!("Trade log write failed for {:?}: {}", entry, e),
        }
    }
}

/// Pure reduction of a fill set to one entry: total quantity and
/// volume-weighted average price, rounded per the logging convention
/// (2 dp price, 6 dp quantity). Empty fill sets produce no entry.
pub fn aggregate_fills(result: &ExecutionResult, side: OrderSide) -> Option<TradeLogEntry> {
    if result.fills.is_empty() {
        return None;
    }

    let total_quantity: f64 = result.fills.iter().map(|f| f.quantity).sum();
    let notional: f64 = result.fills.iter().map(|f| f.price * f.quantity).sum();

    Some(TradeLogEntry {
        timestamp: Utc::now(),
        side,
        avg_price: round_to(notional / total_quantity, 2),
        quantity: round_to(total_quantity, 6),
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionMechanism;
    use crate::models::Fill;

    fn result_with(fills: Vec<Fill>) -> ExecutionResult {
        ExecutionResult {
            fills,
            mechanism: ExecutionMechanism::MarketFallback,
        }
    }

    #[test]
    fn test_aggregates_multiple_fills_into_vwap() {
        let result = result_with(vec![
            Fill {
                price: 50000.0,
                quantity: 0.001,
            },
            Fill {
                price: 50010.0,
                quantity: 0.002,
            },
        ]);

        let entry = aggregate_fills(&result, OrderSide::Buy).unwrap();

        assert_eq!(entry.side, OrderSide::Buy);
        assert!((entry.quantity - 0.003).abs() < 1e-12);
        // (50000*0.001 + 50010*0.002) / 0.003 = 50006.666..., rounded to 2 dp
        assert!((entry.avg_price - 50006.67).abs() < 1e-9);
    }

    #[test]
    fn test_empty_fills_produce_no_entry() {
        let result = result_with(vec![]);
        assert!(aggregate_fills(&result, OrderSide::Sell).is_none());
    }

    #[test]
    fn test_single_fill_vwap_is_its_price() {
        let result = result_with(vec![Fill {
            price: 49000.5,
            quantity: 0.5,
        }]);

        let entry = aggregate_fills(&result, OrderSide::Sell).unwrap();
        assert_eq!(entry.avg_price, 49000.5);
        assert_eq!(entry.quantity, 0.5);
    }

    #[test]
    fn test_csv_log_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trade_log.csv");

        let mut logger = FillLogger::new(CsvTradeLog::open(&path).unwrap());
        logger.record(
            &result_with(vec![Fill {
                price: 50000.0,
                quantity: 0.001,
            }]),
            OrderSide::Buy,
        );
        logger.record(&result_with(vec![]), OrderSide::Buy); // no-op
        logger.record(
            &result_with(vec![Fill {
                price: 49000.0,
                quantity: 0.5,
            }]),
            OrderSide::Sell,
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",BUY,50000.00,0.001000"));
        assert!(lines[1].ends_with(",SELL,49000.00,0.500000"));
    }

    #[test]
    fn test_sink_failure_does_not_panic_or_propagate() {
        struct FailingSink;
        impl TradeLogSink for FailingSink {
            fn append(&mut self, _entry: &TradeLogEntry) -> crate::Result<()> {
                Err("disk full".into())
            }
        }

        let mut logger = FillLogger::new(FailingSink);
        logger.record(
            &result_with(vec![Fill {
                price: 50000.0,
                quantity: 0.001,
            }]),
            OrderSide::Buy,
        );
    }
}

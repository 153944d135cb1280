use channelbot::api::BinanceClient;
use channelbot::config::Settings;
use channelbot::execution::{CycleConfig, CycleOutcome, ExecutionCycle};
use channelbot::persistence::CsvTradeLog;
use channelbot::risk::FixedQuantitySizer;
use channelbot::{CycleError, Result};
use clap::Parser;
use tokio::time::{interval, Duration};

/// Channel-breakout stop-order executor
#[derive(Parser, Debug)]
#[command(name = "channelbot")]
struct Args {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Override the polling interval in seconds
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    tracing::info!("🚀 ChannelBot starting");
    tracing::info!("  Symbol: {}", settings.symbol);
    tracing::info!("  Timeframe: {}", settings.interval);
    tracing::info!("  Price tick: {}", settings.price_tick);
    tracing::info!("  Trade log: {}", settings.trade_log_path);

    let client = BinanceClient::new(settings.base_url.clone(), settings.api_key.clone())?;
    let sizer = FixedQuantitySizer::new(settings.order_quantity);
    let sink = CsvTradeLog::open(&settings.trade_log_path)?;

    let mut cycle = ExecutionCycle::new(client, sizer, sink, CycleConfig::from(&settings));

    if args.once {
        report_cycle(cycle.run_once().await);
        return Ok(());
    }

    let poll_secs = args.interval_secs.unwrap_or(settings.poll_interval_secs);
    tracing::info!("🔄 Polling every {}s, press Ctrl+C to stop", poll_secs);

    let mut ticker = interval(Duration::from_secs(poll_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                report_cycle(cycle.run_once().await);
            }
        }
    }

    tracing::info!("👋 ChannelBot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "channelbot=info".into()),
        )
        .init();
}

/// A failed cycle is never fatal: the next tick retries from scratch. Only
/// a double placement failure is operator-alert worthy.
fn report_cycle(outcome: std::result::Result<CycleOutcome, CycleError>) {
    match outcome {
        Ok(CycleOutcome::Skipped { trigger_price }) => {
            tracing::info!("Order already exists at {}, no new order placed", trigger_price);
        }
        Ok(CycleOutcome::Placed {
            side,
            trigger_price,
            mechanism,
            filled_quantity,
        }) => {
            tracing::info!(
                "Placed {} via {:?} at trigger {} (filled {:.6})",
                side,
                mechanism,
                trigger_price,
                filled_quantity
            );
        }
        Err(e @ CycleError::ExecutionFailed { .. }) => {
            tracing::error!("{}", e);
        }
        Err(e) => {
            tracing::warn!("Cycle aborted: {}", e);
        }
    }
}

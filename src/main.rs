use clap::Parser;
use optionbot::api::SimulatedMarket;
use optionbot::execution::{exchange_now, CycleOutcome, TradingBot};
use optionbot::persistence::CsvJournal;
use optionbot::settings::BotConfig;
use optionbot::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Paper-trade index options on MACD crossovers against a simulated market
#[derive(Parser, Debug)]
#[command(name = "optionbot", version)]
struct Cli {
    /// TOML config file (optional; OPTIONBOT_* env vars override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the simulated market
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting spot of the simulated underlying
    #[arg(long, default_value_t = 72_000.0)]
    spot: f64,

    /// Run cycles outside market hours (and never auto-stop)
    #[arg(long)]
    ignore_market_hours: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut config = BotConfig::load(cli.config.as_deref())?;
    if cli.ignore_market_hours {
        config.enforce_market_hours = false;
    }

    let offset = config.utc_offset().ok_or("utc_offset_minutes out of range")?;
    let market = Arc::new(SimulatedMarket::new(
        cli.seed,
        cli.spot,
        &config.underlying,
        config.strike_step,
        offset,
    ));
    let journal = CsvJournal::open(&config.trade_log_path, &config.daily_summary_path)?;

    tracing::info!("🚀 OptionBot starting (simulated market, seed {})", cli.seed);
    log_configuration(&config);

    let poll_interval = Duration::from_secs(config.poll_interval_secs.max(1));
    let market_close = config.market_close;
    let enforce_hours = config.enforce_market_hours;

    let mut bot = TradingBot::new(config, market.clone(), market, journal);
    bot.start_session();

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                let now = exchange_now(bot.config());
                if enforce_hours && now.time() >= market_close {
                    tracing::info!("⏹ Market closed at {}, stopping", market_close);
                    break;
                }

                match bot.run_cycle(now).await {
                    Ok(CycleOutcome::Completed(report)) => {
                        if let Some(id) = report.opened {
                            tracing::debug!("Cycle opened position {}", id);
                        }
                    }
                    Ok(CycleOutcome::MarketClosed) => {}
                    Err(e) => tracing::warn!("Cycle failed: {}", e),
                }
            }
        }
    }

    let now = exchange_now(bot.config());
    bot.stop(now).await;

    tracing::info!("👋 OptionBot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("optionbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(config: &BotConfig) {
    tracing::info!("📊 Configuration:");
    tracing::info!("  Capital: {:.2}", config.initial_capital);
    tracing::info!(
        "  Lots: {} x {} ({})",
        config.lots,
        config.contract_multiplier,
        config.underlying
    );
    tracing::info!(
        "  Candles: {} min, day high until {}",
        config.candle_interval_minutes,
        config.day_high_cutoff
    );
    tracing::info!(
        "  SL/Target: -{:.0}% / +{:.0}%",
        config.stop_loss_pct * 100.0,
        config.target_pct * 100.0
    );
    tracing::info!(
        "  Hours: {}-{} (enforced: {})",
        config.market_open,
        config.market_close,
        config.enforce_market_hours
    );
    tracing::info!("  Trade log: {}", config.trade_log_path);
}

//! Opportunity rotation service
//!
//! Replays newline-delimited `MarketEvent` JSON through the in-memory bus
//! against a paper exchange.
//!
//! Usage:
//!   opportunity_rotation --input candles.ndjson --portfolio portfolio.json
//!   opportunity_rotation --input history.ndjson --market-clock
//!   cat candles.ndjson | opportunity_rotation --env production
//!   opportunity_rotation --print-config

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use message_bus::{BusStats, EventBus, InMemoryBus};
use opportunity_strategy::logging::init_logging;
use opportunity_strategy::{
    log_metrics, Collaborators, OpportunityStrategy, PaperExchange, PaperPortfolio,
    StrategyConfig,
};
use service_config::load_config;
use state_trading::{
    InMemoryCandleStore, InMemoryHoldingStore, InMemoryOrderStore, InMemoryPreferenceStore,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use torq_strategy_shared::{LogNotifier, Strategy};
use tracing::{info, warn};

const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "opportunity_rotation")]
#[command(about = "Opportunity-score rotation strategy")]
#[command(version)]
struct Args {
    /// Base configuration file (default: config/opportunity.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay from config/environments/<env>.toml
    #[arg(short, long)]
    env: Option<String>,

    /// NDJSON market events; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON portfolio seeding preferences, holdings and paper balances
    #[arg(short, long)]
    portfolio: Option<PathBuf>,

    /// Judge candle freshness by the newest replayed candle, not the wall clock
    #[arg(long)]
    market_clock: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut service = load_config(args.config.as_deref(), args.env.as_deref())
        .context("Failed to load opportunity service configuration")?;
    if args.market_clock {
        service.engine.market_clock = true;
    }
    if args.print_config {
        print!("{}", service.to_toml_string()?);
        return Ok(());
    }

    init_logging(&service.logging)?;
    info!("Starting opportunity rotation service");

    let config = StrategyConfig::from_service_config(&service)?;

    let candles = Arc::new(InMemoryCandleStore::new());
    let holdings = Arc::new(InMemoryHoldingStore::new());
    let orders = Arc::new(InMemoryOrderStore::new());
    let preferences = Arc::new(InMemoryPreferenceStore::new());
    let bus = Arc::new(
        InMemoryBus::new(service.bus.queue_high_water).with_history_limit(service.bus.history_limit),
    );
    let exchange = Arc::new(PaperExchange::new(candles.clone()));

    if let Some(path) = &args.portfolio {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read portfolio {}", path.display()))?;
        let portfolio = PaperPortfolio::from_json(&content)?;
        let seeded = portfolio
            .seed(preferences.as_ref(), holdings.as_ref(), exchange.as_ref())
            .await?;
        info!(users = portfolio.users.len(), holdings = seeded, "portfolio seeded");
    }

    let mut strategy = OpportunityStrategy::new(
        config.clone(),
        Collaborators {
            candles: candles.clone(),
            holdings: holdings.clone(),
            orders: orders.clone(),
            preferences,
            exchange,
            notifier: Arc::new(LogNotifier),
            bus: bus.clone(),
        },
    )?;
    strategy.start().await?;

    let published = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            publish_lines(BufReader::new(file), bus.as_ref(), &config.market_data_subject).await?
        }
        None => {
            publish_lines(
                BufReader::new(tokio::io::stdin()),
                bus.as_ref(),
                &config.market_data_subject,
            )
            .await?
        }
    };
    info!(events = published, "input exhausted, draining bus");

    tokio::select! {
        stats = drained(bus.as_ref()) => {
            info!(delivered = stats.delivered, acked = stats.acked, nacked = stats.nacked, "bus drained");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            warn!("Interrupted before the bus drained");
        }
    }

    strategy.stop().await?;

    let metrics = strategy.metrics();
    log_metrics!(
        "messages={} candles={} duplicates={} partial_dropped={} recomputes={} scores={} signals={} trades={} (rotations={} stop_losses={}) errors={}",
        metrics.messages_processed,
        metrics.candles_ingested,
        metrics.duplicates_skipped,
        metrics.partial_candles_dropped,
        metrics.recomputes,
        metrics.scores_written,
        metrics.signals_generated,
        metrics.trades_executed(),
        metrics.rotations,
        metrics.stop_losses,
        metrics.errors
    );
    info!(
        points = candles.len(),
        holdings = holdings.len(),
        orders = orders.len(),
        recent_dead_letters = bus.published_on(&config.dlq_subject).len(),
        published = bus.stats().published,
        "final state"
    );

    Ok(())
}

/// Publish each non-blank line verbatim; decoding happens in the handler
async fn publish_lines<R>(reader: R, bus: &dyn EventBus, subject: &str) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        bus.publish(subject, line.as_bytes().to_vec()).await?;
        published += 1;
    }
    Ok(published)
}

/// Resolve once every delivery is settled and the counters stop moving
async fn drained(bus: &InMemoryBus) -> BusStats {
    let mut previous = bus.stats();
    loop {
        tokio::time::sleep(DRAIN_POLL).await;
        let current = bus.stats();
        if current == previous && current.delivered == current.acked + current.nacked {
            return current;
        }
        previous = current;
    }
}

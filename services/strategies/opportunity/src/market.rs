//! Market data service: indicator recompute and cross-symbol ranking

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use state_trading::CandleStore;
use torq_strategy_shared::MetricsCollector;
use tracing::{debug, trace};
use types::{CandlePoint, SymbolScore};
use uuid::Uuid;

use crate::config::StrategyConfig;
use crate::error::{Result, StrategyError};
use crate::indicators;
use crate::scoring;

#[derive(Debug)]
pub struct MarketDataService {
    candles: Arc<dyn CandleStore>,
    config: StrategyConfig,
    metrics: Arc<MetricsCollector>,
    /// Newest candle timestamp seen by a recompute
    market_time: Mutex<Option<DateTime<Utc>>>,
}

impl MarketDataService {
    pub fn new(
        candles: Arc<dyn CandleStore>,
        config: StrategyConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            candles,
            config,
            metrics,
            market_time: Mutex::new(None),
        }
    }

    /// Reference time for freshness checks
    ///
    /// With `market_clock` this is the newest recomputed candle's timestamp, so
    /// replayed history ranks the way it did live. Falls back to the wall clock
    /// until a candle has been recomputed.
    pub fn now(&self) -> DateTime<Utc> {
        if self.config.market_clock {
            if let Some(seen) = *self.market_time.lock() {
                return seen;
            }
        }
        Utc::now()
    }

    /// Recompute indicators and score for a persisted point
    ///
    /// The window is the trailing `window_days` ending at the point's own
    /// timestamp, so replayed history scores the same as live data. Returns the
    /// updated point.
    pub async fn recompute(&self, point_id: Uuid) -> Result<CandlePoint> {
        self.metrics.increment_recomputes();
        let point = self
            .candles
            .get(point_id)
            .await?
            .ok_or_else(|| StrategyError::not_found("candle", point_id))?;
        {
            let mut seen = self.market_time.lock();
            if seen.map_or(true, |t| point.timestamp > t) {
                *seen = Some(point.timestamp);
            }
        }

        let end = point.timestamp;
        let start = end - self.config.window_span();
        let window = self
            .candles
            .window(&point.symbol, start, end, self.config.window_cap)
            .await?;
        trace!(symbol = %point.symbol, point_id = %point_id, points = window.len(), "recompute window loaded");

        let mut latest = indicators::compute_all(window)?;
        latest.score = scoring::opportunity_score(&latest);
        self.candles.update(&latest).await?;

        if let Some(score) = latest.score {
            self.metrics.increment_scores();
            debug!(symbol = %latest.symbol, point_id = %latest.id, score, "score written");
        }
        Ok(latest)
    }

    /// Score of the latest point for `symbol`, which must be fresh at `now`
    pub async fn symbol_score(&self, symbol: &str, now: DateTime<Utc>) -> Result<SymbolScore> {
        let latest = self
            .candles
            .latest(symbol)
            .await?
            .ok_or_else(|| StrategyError::not_found("candle", symbol))?;

        let freshness = chrono::Duration::from_std(self.config.freshness).map_err(|e| {
            StrategyError::Configuration {
                message: format!("freshness out of range: {}", e),
            }
        })?;
        if latest.timestamp < now - freshness {
            return Err(StrategyError::Stale {
                symbol: symbol.to_string(),
                timestamp: latest.timestamp,
            });
        }

        let score = latest.score.ok_or_else(|| StrategyError::NoScore {
            symbol: symbol.to_string(),
        })?;
        Ok(SymbolScore {
            symbol: symbol.to_string(),
            score,
            rank: 0,
        })
    }

    /// Rank the watchlist by current score, best first
    ///
    /// Symbols that are missing, stale or unscored are skipped. Fails with
    /// `NoRankedSymbols` when nothing could be ranked.
    pub async fn rank_watchlist(&self, watchlist: &[String]) -> Result<Vec<SymbolScore>> {
        let now = self.now();
        let mut scored = Vec::with_capacity(watchlist.len());
        for symbol in watchlist {
            match self.symbol_score(symbol, now).await {
                Ok(entry) => scored.push((entry.symbol, entry.score)),
                Err(e) if e.is_unrankable() => {
                    debug!(symbol = %symbol, error = %e, "symbol skipped in ranking");
                }
                Err(e) => return Err(e),
            }
        }

        if scored.is_empty() {
            return Err(StrategyError::NoRankedSymbols);
        }
        Ok(scoring::rank(scored))
    }
}

//! Market events carried on the bus
//!
//! Payloads are JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"market_data_pushed","id":"…","symbol":"BTCUSDT","timestamp":"2024-05-01T12:00:00Z",
//!  "open":1.0,"high":1.1,"low":0.9,"close":1.05,"volume":12.0,"candle_closed":true}
//! {"type":"partial_market_data","datapoint_id":"…"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::CandlePoint;

/// A candle update from the market data feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlePushed {
    /// Correlation id used for idempotency
    pub id: Uuid,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub candle_closed: bool,
}

impl CandlePushed {
    /// Fresh candle point for this event
    pub fn to_point(&self) -> CandlePoint {
        CandlePoint::new(
            self.id,
            self.symbol.clone(),
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}

/// Request to recompute indicators and score around a persisted point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeRequested {
    pub datapoint_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    MarketDataPushed(CandlePushed),
    PartialMarketData(RecomputeRequested),
}

impl MarketEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::MarketDataPushed(_) => "market_data_pushed",
            MarketEvent::PartialMarketData(_) => "partial_market_data",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

impl From<CandlePushed> for MarketEvent {
    fn from(event: CandlePushed) -> Self {
        MarketEvent::MarketDataPushed(event)
    }
}

impl From<RecomputeRequested> for MarketEvent {
    fn from(event: RecomputeRequested) -> Self {
        MarketEvent::PartialMarketData(event)
    }
}

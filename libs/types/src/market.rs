//! Candle series entities
//!
//! A [`CandlePoint`] is one row per (symbol, minute bucket). Ingestion creates it
//! from a closed candle, the indicator engine fills [`Indicators`] on the latest
//! point of a window and the scoring engine writes `score` on that same point.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{is_quoted_pair, ValidationError};

const ENTITY: &str = "candle";

/// Computed indicator fields carried on a candle point
///
/// Every field is optional: a family is written only once its minimum window is
/// available, so a young series carries a partial set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub rsi6: Option<f64>,
    pub rsi12: Option<f64>,
    pub rsi24: Option<f64>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub atr: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub bollinger_width: Option<f64>,
    pub obv: Option<f64>,
    pub adx: Option<f64>,
    pub adx_positive: Option<f64>,
    pub adx_negative: Option<f64>,
}

impl Indicators {
    /// Number of indicator fields a fully computed point carries
    pub const FIELD_COUNT: usize = 18;

    fn fields(&self) -> [Option<f64>; Self::FIELD_COUNT] {
        [
            self.macd,
            self.macd_signal,
            self.macd_hist,
            self.rsi6,
            self.rsi12,
            self.rsi24,
            self.sma20,
            self.sma50,
            self.sma200,
            self.atr,
            self.bollinger_upper,
            self.bollinger_middle,
            self.bollinger_lower,
            self.bollinger_width,
            self.obv,
            self.adx,
            self.adx_positive,
            self.adx_negative,
        ]
    }

    /// Count of populated indicator fields
    pub fn populated(&self) -> usize {
        self.fields().iter().filter(|f| f.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.populated() == Self::FIELD_COUNT
    }
}

/// One closed minute candle for a symbol plus its derived indicators and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlePoint {
    pub id: Uuid,
    pub correlation_id: Uuid,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(flatten)]
    pub indicators: Indicators,
    /// Opportunity score in `[0, 100]`
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandlePoint {
    /// Build a fresh point with no indicators and a new identity
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        correlation_id: Uuid,
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            correlation_id,
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: Indicators::default(),
            score: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check symbol, timestamp and OHLCV bounds
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_quoted_pair(&self.symbol) {
            return Err(ValidationError::InvalidSymbol {
                entity: ENTITY,
                symbol: self.symbol.clone(),
            });
        }
        if self.timestamp.timestamp() <= 0 {
            return Err(ValidationError::InvalidTimestamp { entity: ENTITY });
        }
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NotFinite {
                    entity: ENTITY,
                    field,
                });
            }
            if value < 0.0 {
                return Err(ValidationError::negative(ENTITY, field, value));
            }
        }
        Ok(())
    }

    /// Half-open minute bucket `[start, start + 1min)` containing the timestamp
    pub fn bucket(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        minute_bucket(self.timestamp)
    }

    /// Overwrite the market fields from a newer write into the same bucket
    ///
    /// Identity (`id`, `correlation_id`, `created_at`) is kept; indicators and
    /// score are replaced by the incoming values and recomputed afterwards.
    pub fn merge_from(&mut self, incoming: &CandlePoint) {
        self.timestamp = incoming.timestamp;
        self.open = incoming.open;
        self.high = incoming.high;
        self.low = incoming.low;
        self.close = incoming.close;
        self.volume = incoming.volume;
        self.indicators = incoming.indicators.clone();
        self.score = incoming.score;
        self.updated_at = Utc::now();
    }
}

/// Minute bucket `[floor(ts, 1min), floor + 1min)`
pub fn minute_bucket(ts: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let secs = ts.timestamp();
    let start = DateTime::<Utc>::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(ts);
    (start, start + Duration::minutes(1))
}

//! Candle series and portfolio fixtures

use chrono::{DateTime, Duration, DurationRound, Utc};
use types::CandlePushed;
use uuid::Uuid;

/// Closed one-minute candles growing by `growth` per bar
///
/// The last candle falls in the minute bucket of `end`; earlier ones step back
/// one minute each. Highs and lows sit 0.2% around the close and each open is
/// the previous close.
pub fn trending_series(
    symbol: &str,
    count: usize,
    base: f64,
    growth: f64,
    end: DateTime<Utc>,
) -> Vec<CandlePushed> {
    let end = minute_floor(end);
    let mut previous_close = base;
    (0..count)
        .map(|i| {
            let close = base * growth.powi(i as i32);
            let open = previous_close;
            previous_close = close;
            CandlePushed {
                id: Uuid::new_v4(),
                symbol: symbol.to_string(),
                timestamp: end - Duration::minutes((count - 1 - i) as i64),
                open,
                high: open.max(close) * 1.002,
                low: open.min(close) * 0.998,
                close,
                volume: 1000.0 + i as f64,
                candle_closed: true,
            }
        })
        .collect()
}

/// Standard warm series: 250 bars rising 0.1% per minute ending now
pub fn warm_series(symbol: &str, base: f64) -> Vec<CandlePushed> {
    trending_series(symbol, 250, base, 1.001, Utc::now())
}

/// A second, differently priced update inside `candle`'s minute bucket
pub fn same_minute_update(candle: &CandlePushed, close: f64) -> CandlePushed {
    CandlePushed {
        id: Uuid::new_v4(),
        timestamp: candle.timestamp + Duration::seconds(30),
        high: candle.high.max(close),
        low: candle.low.min(close),
        close,
        ..candle.clone()
    }
}

fn minute_floor(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

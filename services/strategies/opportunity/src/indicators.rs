//! Technical indicators computed over a candle window
//!
//! Streaming calculators ([`Smoother`], [`MovingAverage`]) are fed the window in
//! chronological order; each family reads the final state and writes onto the
//! latest point. A family refuses windows shorter than its minimum.

use std::collections::VecDeque;
use std::fmt;

use types::{CandlePoint, Indicators};

use crate::error::{Result, StrategyError};

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const RSI_PERIODS: [usize; 3] = [6, 12, 24];
const SMA_PERIODS: [usize; 3] = [20, 50, 200];
const ATR_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_DEVIATIONS: f64 = 2.0;
const ADX_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorFamily {
    Macd,
    Rsi,
    Sma,
    Atr,
    Bollinger,
    Obv,
    Adx,
}

impl IndicatorFamily {
    /// Compute-all order
    pub const ALL: [IndicatorFamily; 7] = [
        IndicatorFamily::Macd,
        IndicatorFamily::Rsi,
        IndicatorFamily::Sma,
        IndicatorFamily::Atr,
        IndicatorFamily::Bollinger,
        IndicatorFamily::Obv,
        IndicatorFamily::Adx,
    ];

    /// Minimum window length
    pub fn min_points(&self) -> usize {
        match self {
            IndicatorFamily::Macd => MACD_SLOW,
            IndicatorFamily::Rsi => 24,
            IndicatorFamily::Sma => 200,
            IndicatorFamily::Atr => ATR_PERIOD,
            IndicatorFamily::Bollinger => BOLLINGER_PERIOD,
            IndicatorFamily::Obv => 14,
            IndicatorFamily::Adx => ADX_PERIOD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorFamily::Macd => "MACD",
            IndicatorFamily::Rsi => "RSI",
            IndicatorFamily::Sma => "SMA",
            IndicatorFamily::Atr => "ATR",
            IndicatorFamily::Bollinger => "Bollinger",
            IndicatorFamily::Obv => "OBV",
            IndicatorFamily::Adx => "ADX",
        }
    }

    /// Compute this family over a chronological window and write it onto `target`
    ///
    /// Zero readings leave the field untouched, except ADX which always writes.
    pub fn apply(&self, points: &[CandlePoint], target: &mut Indicators) -> Result<()> {
        match self {
            IndicatorFamily::Macd => {
                let reading = macd(points)?;
                write_nonzero(&mut target.macd, reading.macd);
                write_nonzero(&mut target.macd_signal, reading.signal);
                write_nonzero(&mut target.macd_hist, reading.histogram);
            }
            IndicatorFamily::Rsi => {
                let reading = rsi(points)?;
                write_nonzero(&mut target.rsi6, reading.rsi6);
                write_nonzero(&mut target.rsi12, reading.rsi12);
                write_nonzero(&mut target.rsi24, reading.rsi24);
            }
            IndicatorFamily::Sma => {
                let reading = sma(points)?;
                write_nonzero(&mut target.sma20, reading.sma20);
                write_nonzero(&mut target.sma50, reading.sma50);
                write_nonzero(&mut target.sma200, reading.sma200);
            }
            IndicatorFamily::Atr => {
                write_nonzero(&mut target.atr, atr(points)?);
            }
            IndicatorFamily::Bollinger => {
                let reading = bollinger(points)?;
                write_nonzero(&mut target.bollinger_upper, reading.upper);
                write_nonzero(&mut target.bollinger_middle, reading.middle);
                write_nonzero(&mut target.bollinger_lower, reading.lower);
                write_nonzero(&mut target.bollinger_width, reading.width);
            }
            IndicatorFamily::Obv => {
                write_nonzero(&mut target.obv, obv(points)?);
            }
            IndicatorFamily::Adx => {
                let reading = adx(points)?;
                target.adx = Some(reading.adx);
                target.adx_positive = Some(reading.plus_di);
                target.adx_negative = Some(reading.minus_di);
            }
        }
        Ok(())
    }
}

impl fmt::Display for IndicatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn write_nonzero(field: &mut Option<f64>, value: f64) {
    if value != 0.0 && value.is_finite() {
        *field = Some(value);
    }
}

fn require(family: IndicatorFamily, points: &[CandlePoint]) -> Result<()> {
    let required = family.min_points();
    if points.len() < required {
        return Err(StrategyError::InsufficientData {
            family,
            required,
            actual: points.len(),
        });
    }
    Ok(())
}

/// Exponentially weighted average seeded with the first observation
///
/// [`Smoother::ema`] uses `α = 2/(n+1)`, [`Smoother::wilder`] uses `α = 1/n`.
#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f64,
    value: Option<f64>,
}

impl Smoother {
    pub fn ema(period: usize) -> Self {
        Self {
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    pub fn wilder(period: usize) -> Self {
        Self {
            alpha: 1.0 / period.max(1) as f64,
            value: None,
        }
    }

    /// Add a new value and return the smoothed value
    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.value = Some(next);
        next
    }

    pub fn current(&self) -> Option<f64> {
        self.value
    }
}

/// Simple moving average over the last `period` values
#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    /// Add a new value and return current MA
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
        self.current()
    }

    /// Get current moving average without adding new value
    pub fn current(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    /// Population standard deviation of the current window
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.current()?;
        let variance = self
            .values
            .iter()
            .map(|x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / self.period as f64;
        Some(variance.sqrt())
    }

    pub fn is_ready(&self) -> bool {
        self.period > 0 && self.values.len() == self.period
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiReading {
    pub rsi6: f64,
    pub rsi12: f64,
    pub rsi24: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmaReading {
    pub sma20: f64,
    pub sma50: f64,
    pub sma200: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxReading {
    /// Raw DX of the latest bar
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

pub fn macd(points: &[CandlePoint]) -> Result<MacdReading> {
    require(IndicatorFamily::Macd, points)?;
    let mut fast = Smoother::ema(MACD_FAST);
    let mut slow = Smoother::ema(MACD_SLOW);
    let mut signal = Smoother::ema(MACD_SIGNAL);

    let mut reading = MacdReading {
        macd: 0.0,
        signal: 0.0,
        histogram: 0.0,
    };
    for point in points {
        let line = fast.update(point.close) - slow.update(point.close);
        let sig = signal.update(line);
        reading = MacdReading {
            macd: line,
            signal: sig,
            histogram: line - sig,
        };
    }
    Ok(reading)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

pub fn rsi(points: &[CandlePoint]) -> Result<RsiReading> {
    require(IndicatorFamily::Rsi, points)?;
    let mut averages: Vec<(Smoother, Smoother)> = RSI_PERIODS
        .iter()
        .map(|&n| (Smoother::wilder(n), Smoother::wilder(n)))
        .collect();

    for pair in points.windows(2) {
        let change = pair[1].close - pair[0].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        for (avg_gain, avg_loss) in averages.iter_mut() {
            avg_gain.update(gain);
            avg_loss.update(loss);
        }
    }

    let values: Vec<f64> = averages
        .iter()
        .map(|(g, l)| rsi_value(g.current().unwrap_or(0.0), l.current().unwrap_or(0.0)))
        .collect();
    Ok(RsiReading {
        rsi6: values[0],
        rsi12: values[1],
        rsi24: values[2],
    })
}

pub fn sma(points: &[CandlePoint]) -> Result<SmaReading> {
    require(IndicatorFamily::Sma, points)?;
    let mut averages: Vec<MovingAverage> = SMA_PERIODS.iter().map(|&n| MovingAverage::new(n)).collect();
    for point in points {
        for average in averages.iter_mut() {
            average.update(point.close);
        }
    }
    let value = |i: usize| averages[i].current().unwrap_or(0.0);
    Ok(SmaReading {
        sma20: value(0),
        sma50: value(1),
        sma200: value(2),
    })
}

/// True range of `point` given the previous close; the first bar uses H-L
fn true_range(point: &CandlePoint, prev_close: Option<f64>) -> f64 {
    let range = point.high - point.low;
    match prev_close {
        Some(prev) => range
            .max((point.high - prev).abs())
            .max((point.low - prev).abs()),
        None => range,
    }
}

pub fn atr(points: &[CandlePoint]) -> Result<f64> {
    require(IndicatorFamily::Atr, points)?;
    let mut smoother = Smoother::wilder(ATR_PERIOD);
    let mut prev_close = None;
    for point in points {
        smoother.update(true_range(point, prev_close));
        prev_close = Some(point.close);
    }
    Ok(smoother.current().unwrap_or(0.0))
}

pub fn bollinger(points: &[CandlePoint]) -> Result<BollingerReading> {
    require(IndicatorFamily::Bollinger, points)?;
    let mut average = MovingAverage::new(BOLLINGER_PERIOD);
    for point in points {
        average.update(point.close);
    }
    let middle = average.current().unwrap_or(0.0);
    let deviation = average.std_dev().unwrap_or(0.0) * BOLLINGER_DEVIATIONS;
    let upper = middle + deviation;
    let lower = middle - deviation;
    Ok(BollingerReading {
        upper,
        middle,
        lower,
        width: upper - lower,
    })
}

pub fn obv(points: &[CandlePoint]) -> Result<f64> {
    require(IndicatorFamily::Obv, points)?;
    let total = points.windows(2).fold(0.0, |acc, pair| {
        let (prev, current) = (&pair[0], &pair[1]);
        if current.close > prev.close {
            acc + current.volume
        } else if current.close < prev.close {
            acc - current.volume
        } else {
            acc
        }
    });
    Ok(total)
}

pub fn adx(points: &[CandlePoint]) -> Result<AdxReading> {
    require(IndicatorFamily::Adx, points)?;
    let mut tr = Smoother::ema(ADX_PERIOD);
    let mut plus_dm = Smoother::ema(ADX_PERIOD);
    let mut minus_dm = Smoother::ema(ADX_PERIOD);

    for pair in points.windows(2) {
        let (prev, current) = (&pair[0], &pair[1]);
        let up_move = current.high - prev.high;
        let down_move = prev.low - current.low;

        tr.update(true_range(current, Some(prev.close)));
        plus_dm.update(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.update(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
    }

    let atr = tr.current().unwrap_or(0.0);
    let directional = |dm: f64| if atr > 0.0 { dm / atr * 100.0 } else { 0.0 };
    let plus_di = directional(plus_dm.current().unwrap_or(0.0));
    let minus_di = directional(minus_dm.current().unwrap_or(0.0));

    let di_sum = plus_di + minus_di;
    let dx = if di_sum > 0.0 {
        (plus_di - minus_di).abs() / di_sum * 100.0
    } else {
        0.0
    };

    Ok(AdxReading {
        adx: dx,
        plus_di,
        minus_di,
    })
}

/// Order a batch chronologically
///
/// Sorted by creation time descending (ties by timestamp) and then reversed,
/// so the most recently created point ends up last.
pub fn chronological(mut points: Vec<CandlePoint>) -> Vec<CandlePoint> {
    points.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    points.reverse();
    points
}

/// Run every family over the window and return its latest point with the
/// indicators written
///
/// Fails on the first family whose minimum window is not met.
pub fn compute_all(points: Vec<CandlePoint>) -> Result<CandlePoint> {
    let window = chronological(points);
    let mut indicators = window
        .last()
        .map(|p| p.indicators.clone())
        .unwrap_or_default();

    for family in IndicatorFamily::ALL {
        family.apply(&window, &mut indicators)?;
    }

    let mut latest = window
        .into_iter()
        .last()
        .ok_or(StrategyError::InsufficientData {
            family: IndicatorFamily::Macd,
            required: IndicatorFamily::Macd.min_points(),
            actual: 0,
        })?;
    latest.indicators = indicators;
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Minute candles with created_at following timestamps
    fn series(closes: &[f64]) -> Vec<CandlePoint> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let ts = start + Duration::minutes(i as i64);
                let mut point = CandlePoint::new(
                    Uuid::new_v4(),
                    "BTCUSDT",
                    ts,
                    close,
                    close * 1.002,
                    close * 0.998,
                    close,
                    100.0 + i as f64,
                );
                point.created_at = ts;
                point
            })
            .collect()
    }

    fn ascending(n: usize) -> Vec<CandlePoint> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * 1.001f64.powi(i as i32)).collect();
        series(&closes)
    }

    #[test]
    fn test_smoother_seeds_with_first_value() {
        let mut ema = Smoother::ema(3);
        assert_eq!(ema.update(10.0), 10.0);
        assert_eq!(ema.update(20.0), 15.0); // α = 0.5

        let mut wilder = Smoother::wilder(4);
        wilder.update(8.0);
        assert_eq!(wilder.update(4.0), 7.0);
    }

    #[test]
    fn test_moving_average() {
        let mut ma = MovingAverage::new(3);

        assert_eq!(ma.update(10.0), None);
        assert_eq!(ma.update(20.0), None);
        assert_eq!(ma.update(30.0), Some(20.0));
        assert_eq!(ma.update(40.0), Some(30.0));
        assert!((ma.std_dev().unwrap() - (2.0f64 / 3.0).sqrt() * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_window_per_family() {
        for family in IndicatorFamily::ALL {
            let required = family.min_points();
            let mut target = Indicators::default();

            let short = ascending(required - 1);
            match family.apply(&short, &mut target) {
                Err(StrategyError::InsufficientData {
                    family: reported,
                    required: r,
                    actual,
                }) => {
                    assert_eq!(reported, family);
                    assert_eq!(r, required);
                    assert_eq!(actual, required - 1);
                }
                other => panic!("{family}: expected InsufficientData, got {other:?}"),
            }

            let exact = ascending(required);
            assert!(family.apply(&exact, &mut target).is_ok(), "{family} at minimum");
        }
    }

    #[test]
    fn test_rsi_extremes() {
        let rising = ascending(30);
        let reading = rsi(&rising).unwrap();
        assert_eq!(reading.rsi6, 100.0);
        assert_eq!(reading.rsi24, 100.0);

        let flat = series(&[50.0; 30]);
        assert_eq!(rsi(&flat).unwrap().rsi12, 50.0);
    }

    #[test]
    fn test_sma_and_obv() {
        let points = ascending(200);
        let reading = sma(&points).unwrap();
        let closes: Vec<f64> = points.iter().map(|p| p.close).collect();
        let expected20 = closes[180..].iter().sum::<f64>() / 20.0;
        assert!((reading.sma20 - expected20).abs() < 1e-9);
        assert!(reading.sma20 > reading.sma50 && reading.sma50 > reading.sma200);

        // every bar closes higher, so OBV sums volume from the second bar on
        let expected_obv: f64 = points.iter().skip(1).map(|p| p.volume).sum();
        assert_eq!(obv(&points).unwrap(), expected_obv);
    }

    #[test]
    fn test_flat_window_leaves_zero_fields_unset() {
        let flat = series(&[10.0; 30]);
        let mut target = Indicators::default();
        IndicatorFamily::Macd.apply(&flat, &mut target).unwrap();
        assert_eq!(target.macd, None);
        assert_eq!(target.macd_hist, None);

        IndicatorFamily::Obv.apply(&flat, &mut target).unwrap();
        assert_eq!(target.obv, None);
    }

    #[test]
    fn test_adx_always_writes() {
        let mut flat = series(&[10.0; 20]);
        for point in flat.iter_mut() {
            point.high = 10.0;
            point.low = 10.0;
        }
        let mut target = Indicators::default();
        IndicatorFamily::Adx.apply(&flat, &mut target).unwrap();
        assert_eq!(target.adx, Some(0.0));
        assert_eq!(target.adx_positive, Some(0.0));
        assert_eq!(target.adx_negative, Some(0.0));
    }

    #[test]
    fn test_uptrend_directional_movement() {
        let reading = adx(&ascending(60)).unwrap();
        assert!(reading.plus_di > reading.minus_di);
        assert!(reading.adx > 0.0);
    }

    #[test]
    fn test_compute_all_populates_every_field() {
        let latest = compute_all(ascending(250)).unwrap();
        assert!(
            latest.indicators.is_complete(),
            "populated {}",
            latest.indicators.populated()
        );
    }

    #[test]
    fn test_compute_all_writes_onto_latest_created() {
        let mut points = ascending(210);
        let newest = points[209].id;
        points.reverse();
        let latest = compute_all(points).unwrap();
        assert_eq!(latest.id, newest);
    }

    #[test]
    fn test_compute_all_fails_fast() {
        // 100 points satisfy MACD and RSI but not SMA
        match compute_all(ascending(100)) {
            Err(StrategyError::InsufficientData { family, .. }) => {
                assert_eq!(family, IndicatorFamily::Sma)
            }
            other => panic!("expected SMA failure, got {other:?}"),
        }
        assert!(matches!(
            compute_all(Vec::new()),
            Err(StrategyError::InsufficientData {
                family: IndicatorFamily::Macd,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_chronological_breaks_ties_by_timestamp() {
        let mut points = ascending(3);
        let created = points[0].created_at;
        for point in points.iter_mut() {
            point.created_at = created;
        }
        let expected: Vec<_> = points.iter().map(|p| p.id).collect();
        points.swap(0, 2);
        let ordered: Vec<_> = chronological(points).iter().map(|p| p.id).collect();
        assert_eq!(ordered, expected);
    }

    fn candle_strategy() -> impl Strategy<Value = Vec<(f64, f64, f64, f64)>> {
        // (close, high spread, low spread, volume)
        prop::collection::vec((1.0f64..1000.0, 0.0f64..0.05, 0.0f64..0.05, 0.0f64..5000.0), 24..80)
    }

    fn build(raw: &[(f64, f64, f64, f64)]) -> Vec<CandlePoint> {
        let closes: Vec<f64> = raw.iter().map(|r| r.0).collect();
        let mut points = series(&closes);
        for (point, &(close, up, down, volume)) in points.iter_mut().zip(raw) {
            point.high = close * (1.0 + up);
            point.low = close * (1.0 - down);
            point.volume = volume;
        }
        points
    }

    proptest! {
        #[test]
        fn prop_rsi_bounded(raw in candle_strategy()) {
            let reading = rsi(&build(&raw)).unwrap();
            for value in [reading.rsi6, reading.rsi12, reading.rsi24] {
                prop_assert!((0.0..=100.0).contains(&value), "rsi {}", value);
            }
        }

        #[test]
        fn prop_adx_bounded(raw in candle_strategy()) {
            let reading = adx(&build(&raw)).unwrap();
            for value in [reading.adx, reading.plus_di, reading.minus_di] {
                prop_assert!((0.0..=100.0 + 1e-9).contains(&value), "adx family {}", value);
            }
        }

        #[test]
        fn prop_bollinger_ordering(raw in candle_strategy()) {
            // A strictly increasing drift term keeps the band width positive
            let drifted: Vec<_> = raw
                .iter()
                .enumerate()
                .map(|(i, &(c, u, d, v))| (c + i as f64 * 0.5, u, d, v))
                .collect();
            let reading = bollinger(&build(&drifted)).unwrap();
            prop_assert!(reading.upper > reading.middle);
            prop_assert!(reading.middle > reading.lower);
            prop_assert!((reading.width - (reading.upper - reading.lower)).abs() < 1e-9);
        }
    }
}

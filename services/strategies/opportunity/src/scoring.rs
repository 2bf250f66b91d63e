//! Opportunity scoring
//!
//! Seven sub-scores in `[0, 1]` read the indicators of one point. The composite
//! is their weighted mean over the sub-scores whose inputs are present, scaled
//! to `[0, 100]`.

use std::cmp::Ordering;

use types::{CandlePoint, SymbolScore};

pub const MACD_WEIGHT: f64 = 0.20;
pub const RSI_WEIGHT: f64 = 0.15;
pub const SMA_WEIGHT: f64 = 0.20;
pub const BOLLINGER_WEIGHT: f64 = 0.15;
pub const VOLUME_WEIGHT: f64 = 0.10;
pub const TREND_WEIGHT: f64 = 0.10;
pub const VOLATILITY_WEIGHT: f64 = 0.10;

pub fn macd_score(macd: f64, signal: f64, histogram: f64) -> f64 {
    let mut score = if macd > signal { 30.0 } else { 10.0 };
    if histogram > 0.0 && histogram >= 0.1 {
        score += 20.0;
    }
    let strength = macd.abs();
    if strength > 0.5 {
        score += 25.0;
    } else if strength > 0.2 {
        score += 15.0;
    }
    score / 100.0
}

pub fn rsi_score(rsi6: f64, rsi12: f64, rsi24: f64) -> f64 {
    let band = if rsi6 < 30.0 && rsi12 < 35.0 && rsi24 < 40.0 {
        50.0 // oversold
    } else if rsi6 > 70.0 && rsi12 > 65.0 && rsi24 > 60.0 {
        0.0 // overbought
    } else if rsi6 < 40.0 && rsi12 < 45.0 {
        25.0
    } else if rsi6 > 60.0 && rsi12 > 55.0 {
        10.0
    } else {
        20.0
    };
    let alignment = if rsi6 > rsi12 && rsi12 > rsi24 {
        30.0
    } else if rsi6 < rsi12 && rsi12 < rsi24 {
        10.0
    } else {
        20.0
    };
    (band + alignment) / 100.0
}

/// `close` must be positive
pub fn sma_score(close: f64, sma20: f64, sma50: f64, sma200: f64) -> f64 {
    let position = if close > sma20 && close > sma50 && close > sma200 {
        40.0
    } else if close > sma20 && close > sma50 {
        30.0
    } else if close > sma20 {
        20.0
    } else if close < sma20 && close < sma50 && close < sma200 {
        5.0
    } else {
        15.0
    };
    let alignment = if sma20 > sma50 && sma50 > sma200 {
        30.0
    } else if sma20 < sma50 && sma50 < sma200 {
        10.0
    } else {
        20.0
    };
    let mean_distance =
        ((close - sma20).abs() + (close - sma50).abs() + (close - sma200).abs()) / 3.0;
    let distance = match mean_distance / close {
        d if d > 0.05 => 20.0,
        d if d > 0.02 => 10.0,
        _ => 5.0,
    };
    (position + alignment + distance) / 100.0
}

/// `close` must be positive
pub fn bollinger_score(close: f64, upper: f64, lower: f64, width: f64) -> f64 {
    let mut score = 0.0;
    let range = upper - lower;
    if range > 0.0 {
        let position = (close - lower) / range;
        score += if position < 0.2 {
            40.0
        } else if position > 0.8 {
            10.0
        } else if position > 0.4 && position < 0.6 {
            25.0
        } else {
            15.0
        };
    }

    let relative_width = width / close;
    score += if relative_width > 0.05 {
        30.0
    } else if relative_width > 0.03 {
        20.0
    } else {
        10.0
    };
    // squeeze
    if relative_width < 0.02 {
        score += 20.0;
    }
    score / 100.0
}

pub fn volume_score(obv: f64, volume: f64) -> f64 {
    let direction = if obv > 0.0 { 30.0 } else { 10.0 };
    let size = if volume > 1000.0 {
        25.0
    } else if volume > 500.0 {
        15.0
    } else {
        5.0
    };
    (direction + size + 20.0) / 100.0
}

pub fn trend_score(adx: f64, plus_di: f64, minus_di: f64) -> f64 {
    let strength = if adx > 25.0 {
        40.0
    } else if adx > 20.0 {
        25.0
    } else {
        10.0
    };
    let direction = if plus_di > minus_di { 30.0 } else { 10.0 };
    let bias = match (plus_di - minus_di).abs() {
        b if b > 10.0 => 20.0,
        b if b > 5.0 => 15.0,
        _ => 10.0,
    };
    (strength + direction + bias) / 100.0
}

/// `close` must be positive
pub fn volatility_score(atr: f64, close: f64) -> f64 {
    let relative = atr / close;
    let level = if relative > 0.03 {
        35.0
    } else if relative > 0.02 {
        25.0
    } else if relative > 0.01 {
        15.0
    } else {
        5.0
    };
    let opportunity = if relative > 0.04 {
        25.0
    } else if relative > 0.025 {
        20.0
    } else {
        15.0
    };
    (level + opportunity + 20.0) / 100.0
}

/// Composite opportunity score of a point, `None` when no sub-score applies
///
/// Sub-scores that divide by the close are skipped for a non-positive close.
pub fn opportunity_score(point: &CandlePoint) -> Option<f64> {
    let ind = &point.indicators;
    let close = point.close;
    let priced = close > 0.0;

    let components: [(Option<f64>, f64); 7] = [
        (
            match (ind.macd, ind.macd_signal, ind.macd_hist) {
                (Some(m), Some(s), Some(h)) => Some(macd_score(m, s, h)),
                _ => None,
            },
            MACD_WEIGHT,
        ),
        (
            match (ind.rsi6, ind.rsi12, ind.rsi24) {
                (Some(a), Some(b), Some(c)) => Some(rsi_score(a, b, c)),
                _ => None,
            },
            RSI_WEIGHT,
        ),
        (
            match (ind.sma20, ind.sma50, ind.sma200) {
                (Some(a), Some(b), Some(c)) if priced => Some(sma_score(close, a, b, c)),
                _ => None,
            },
            SMA_WEIGHT,
        ),
        (
            match (ind.bollinger_upper, ind.bollinger_lower, ind.bollinger_width) {
                (Some(u), Some(l), Some(w)) if priced => Some(bollinger_score(close, u, l, w)),
                _ => None,
            },
            BOLLINGER_WEIGHT,
        ),
        (ind.obv.map(|obv| volume_score(obv, point.volume)), VOLUME_WEIGHT),
        (
            match (ind.adx, ind.adx_positive, ind.adx_negative) {
                (Some(a), Some(p), Some(n)) => Some(trend_score(a, p, n)),
                _ => None,
            },
            TREND_WEIGHT,
        ),
        (
            ind.atr.filter(|_| priced).map(|atr| volatility_score(atr, close)),
            VOLATILITY_WEIGHT,
        ),
    ];

    let (weighted, total_weight) = components
        .iter()
        .filter_map(|(score, weight)| score.map(|s| (s * weight, *weight)))
        .fold((0.0, 0.0), |(acc, total), (s, w)| (acc + s, total + w));

    if total_weight == 0.0 {
        return None;
    }
    Some((weighted / total_weight * 100.0).clamp(0.0, 100.0))
}

/// Sort descending and assign ranks 1..N
///
/// The sort is stable so equal scores keep their input order.
pub fn rank(scores: Vec<(String, f64)>) -> Vec<SymbolScore> {
    let mut scores = scores;
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scores
        .into_iter()
        .enumerate()
        .map(|(i, (symbol, score))| SymbolScore {
            symbol,
            score,
            rank: i + 1,
        })
        .collect()
}

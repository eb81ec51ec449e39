//! Indicator engine
//!
//! Pure functions over ordered OHLCV series. Every function returns a vector
//! aligned by position with its input; cells before an indicator's minimum
//! lookback are `None`, never silently zero. All recurrences read only
//! candles at or before their own row.

use crate::market_data::Candle;
use serde::{Deserialize, Serialize};

/// Exponential moving average, smoothing 2/(period+1), recursive from the
/// first observation (no simple-average seed window).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Wilder RSI: exponential smoothing of gains/losses with alpha = 1/period.
/// Zero average loss yields 100 (all gains) or 50 (flat series).
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if n < 2 {
        return out;
    }
    let alpha = 1.0 / period.max(1) as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }
        out[i] = Some(if avg_loss == 0.0 {
            if avg_gain == 0.0 { 50.0 } else { 100.0 }
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        });
    }
    out
}

/// MACD line, signal line, histogram.
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_period);
    let hist: Vec<f64> = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
    (line, signal, hist)
}

/// Intraday VWAP. Cumulative typical-price-volume and cumulative volume both
/// reset at each calendar-day boundary; cross-day leakage is a correctness
/// bug. Rows with zero cumulative volume are `None`.
pub fn vwap(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(candles.len());
    let mut day = None;
    let mut cum_tp_vol = 0.0;
    let mut cum_vol = 0.0;
    for c in candles {
        let current = c.trading_day();
        if day != Some(current) {
            day = Some(current);
            cum_tp_vol = 0.0;
            cum_vol = 0.0;
        }
        cum_tp_vol += c.typical_price() * c.volume;
        cum_vol += c.volume;
        out.push(if cum_vol > 0.0 {
            Some(cum_tp_vol / cum_vol)
        } else {
            None
        });
    }
    out
}

/// Wilder-smoothed average true range. The first row's true range is just
/// high - low (no previous close exists).
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let alpha = 1.0 / period.max(1) as f64;
    let mut out = Vec::with_capacity(candles.len());
    let mut prev_atr = None;
    for (i, c) in candles.iter().enumerate() {
        let tr = if i == 0 {
            c.range()
        } else {
            let prev_close = candles[i - 1].close;
            c.range()
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        };
        let next = match prev_atr {
            None => tr,
            Some(p) => alpha * tr + (1.0 - alpha) * p,
        };
        out.push(next);
        prev_atr = Some(next);
    }
    out
}

/// On-balance volume: signed cumulative volume, flat closes contribute zero.
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut running = 0.0;
    for (i, c) in candles.iter().enumerate() {
        if i > 0 {
            let delta = c.close - candles[i - 1].close;
            if delta > 0.0 {
                running += c.volume;
            } else if delta < 0.0 {
                running -= c.volume;
            }
        }
        out.push(running);
    }
    out
}

/// Rolling mean volume with a minimum window of one row.
pub fn avg_volume(candles: &[Candle], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(candles.len());
    let mut window_sum = 0.0;
    for (i, c) in candles.iter().enumerate() {
        window_sum += c.volume;
        if i >= period {
            window_sum -= candles[i - period].volume;
        }
        let width = (i + 1).min(period) as f64;
        out.push(window_sum / width);
    }
    out
}

/// Central pivot range derived from the prior day's OHLC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pivot: f64,
    pub tc: f64,
    pub bc: f64,
    pub r1: f64,
    pub r2: f64,
    pub s1: f64,
    pub s2: f64,
    pub width_pct: f64,
}

impl PivotLevels {
    /// Narrow CPR is a proxy for breakout potential.
    pub fn is_narrow(&self) -> bool {
        self.width_pct < 0.2
    }
}

pub fn cpr_levels(prev_high: f64, prev_low: f64, prev_close: f64) -> PivotLevels {
    let pivot = (prev_high + prev_low + prev_close) / 3.0;
    let tc = (pivot + prev_high) / 2.0;
    let bc = (pivot + prev_low) / 2.0;
    let width_pct = if pivot != 0.0 {
        (tc - bc).abs() / pivot * 100.0
    } else {
        0.0
    };
    PivotLevels {
        pivot,
        tc,
        bc,
        r1: 2.0 * pivot - prev_low,
        r2: pivot + (prev_high - prev_low),
        s1: 2.0 * pivot - prev_high,
        s2: pivot - (prev_high - prev_low),
        width_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use proptest::prelude::*;

    fn flat_candles(n: usize, price: f64, volume: f64) -> Vec<Candle> {
        let tz = FixedOffset::east_opt(19800).unwrap();
        (0..n)
            .map(|i| Candle {
                timestamp: tz
                    .with_ymd_and_hms(2026, 3, 10, 9, 15, 0)
                    .unwrap()
                    + chrono::Duration::minutes(15 * i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume,
            })
            .collect()
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let out = ema(&[100.0; 30], 9);
        assert!(out.iter().all(|v| (v - 100.0).abs() < 1e-9));
    }

    #[test]
    fn ema_tracks_first_observation() {
        let out = ema(&[10.0, 20.0], 9);
        assert_eq!(out[0], 10.0);
        assert!((out[1] - (0.2 * 20.0 + 0.8 * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn rsi_flat_series_settles_at_50() {
        let closes = vec![22000.0; 20];
        let out = rsi(&closes, 14);
        assert!(out[0].is_none());
        assert!(out[1..].iter().all(|v| *v == Some(50.0)));
    }

    #[test]
    fn rsi_all_gains_is_100_all_losses_near_0() {
        let up: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&up, 14);
        assert_eq!(*out.last().unwrap(), Some(100.0));

        let down: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&down, 14);
        assert_eq!(*out.last().unwrap(), Some(0.0));
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let (line, signal, hist) = macd(&closes, 12, 26, 9);
        for i in 0..closes.len() {
            assert!((hist[i] - (line[i] - signal[i])).abs() < 1e-9);
        }
    }

    #[test]
    fn vwap_resets_at_day_boundary() {
        let tz = FixedOffset::east_opt(19800).unwrap();
        let mut candles = Vec::new();
        for (day, price) in [(10, 22000.0), (11, 23000.0)] {
            for i in 0..4 {
                candles.push(Candle {
                    timestamp: tz.with_ymd_and_hms(2026, 3, day, 9, 15, 0).unwrap()
                        + chrono::Duration::minutes(15 * i),
                    open: price,
                    high: price + 10.0,
                    low: price - 10.0,
                    close: price + i as f64,
                    volume: 500.0 + 100.0 * i as f64,
                });
            }
        }
        let out = vwap(&candles);
        // First row of each day equals that row's typical price.
        assert!((out[0].unwrap() - candles[0].typical_price()).abs() < 1e-9);
        assert!((out[4].unwrap() - candles[4].typical_price()).abs() < 1e-9);
        // Second day carries no volume over from the first.
        assert!(out[5].unwrap() > 22900.0);
    }

    #[test]
    fn vwap_zero_volume_rows_are_none() {
        let candles = flat_candles(3, 22000.0, 0.0);
        assert!(vwap(&candles).iter().all(|v| v.is_none()));
    }

    #[test]
    fn atr_of_flat_series_is_zero() {
        let candles = flat_candles(30, 22000.0, 1000.0);
        let out = atr(&candles, 14);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn obv_signs_follow_close_changes() {
        let mut candles = flat_candles(4, 100.0, 10.0);
        candles[1].close = 101.0; // +10
        candles[2].close = 101.0; // flat, contributes zero
        candles[3].close = 100.0; // -10
        let out = obv(&candles);
        assert_eq!(out, vec![0.0, 10.0, 10.0, 0.0]);
    }

    #[test]
    fn avg_volume_uses_partial_windows() {
        let mut candles = flat_candles(3, 100.0, 0.0);
        candles[0].volume = 100.0;
        candles[1].volume = 300.0;
        candles[2].volume = 500.0;
        let out = avg_volume(&candles, 2);
        assert_eq!(out, vec![100.0, 200.0, 400.0]);
    }

    #[test]
    fn cpr_matches_worked_example() {
        let levels = cpr_levels(22600.0, 22400.0, 22500.0);
        assert!((levels.pivot - 22500.0).abs() < 1e-9);
        assert!((levels.tc - 22550.0).abs() < 1e-9);
        assert!((levels.bc - 22450.0).abs() < 1e-9);
        assert!((levels.r1 - 22600.0).abs() < 1e-9);
        assert!((levels.s1 - 22400.0).abs() < 1e-9);
        assert!((levels.r2 - 22700.0).abs() < 1e-9);
        assert!((levels.s2 - 22300.0).abs() < 1e-9);
    }

    #[test]
    fn cpr_zero_pivot_has_zero_width() {
        let levels = cpr_levels(10.0, -10.0, 0.0);
        assert_eq!(levels.width_pct, 0.0);
    }

    proptest! {
        #[test]
        fn cpr_ordering_holds(
            low in 1000.0f64..40000.0,
            spread in 1.0f64..2000.0,
            close_frac in 0.0f64..1.0,
        ) {
            let high = low + spread;
            let close = low + spread * close_frac;
            let levels = cpr_levels(high, low, close);
            prop_assert!(levels.tc > levels.pivot);
            prop_assert!(levels.pivot > levels.bc);
            prop_assert!(levels.r1 > levels.pivot);
            prop_assert!(levels.pivot > levels.s1);
        }

        #[test]
        fn rsi_stays_bounded(closes in prop::collection::vec(1000.0f64..50000.0, 2..120)) {
            for v in rsi(&closes, 14).into_iter().flatten() {
                prop_assert!((0.0..=100.0).contains(&v));
            }
        }

        #[test]
        fn ema_stays_within_input_envelope(
            values in prop::collection::vec(10.0f64..1000.0, 1..100),
        ) {
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            for v in ema(&values, 9) {
                prop_assert!(v >= min - 1e-9 && v <= max + 1e-9);
            }
        }
    }
}

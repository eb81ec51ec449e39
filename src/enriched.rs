//! Enriched candle series
//!
//! A `Series` augmented per row with the derived columns the voting models
//! read. Columns are positionally aligned with the candles; every value is
//! computed only from candles at or before its own row.

use crate::config::IndicatorConfig;
use crate::indicators::{atr, avg_volume, ema, macd, obv, rsi, vwap};
use crate::market_data::{Candle, Series};

#[derive(Debug, Clone)]
pub struct EnrichedSeries {
    pub candles: Series,
    pub ema_fast: Vec<f64>,
    pub ema_medium: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub rsi: Vec<Option<f64>>,
    pub macd_line: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_hist: Vec<f64>,
    pub vwap: Vec<Option<f64>>,
    pub avg_volume: Vec<f64>,
    pub atr: Vec<f64>,
    pub obv: Vec<f64>,
    /// First candle's high of each trading day, held for the rest of the day.
    pub or_high: Vec<Option<f64>>,
    pub or_low: Vec<Option<f64>>,
}

impl EnrichedSeries {
    pub fn enrich(candles: Series, cfg: &IndicatorConfig) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (macd_line, macd_signal, macd_hist) =
            macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        let (or_high, or_low) = opening_range(&candles);
        Self {
            ema_fast: ema(&closes, cfg.ema_fast),
            ema_medium: ema(&closes, cfg.ema_medium),
            ema_slow: ema(&closes, cfg.ema_slow),
            rsi: rsi(&closes, cfg.rsi_period),
            macd_line,
            macd_signal,
            macd_hist,
            vwap: vwap(&candles),
            avg_volume: avg_volume(&candles, cfg.avg_volume_period),
            atr: atr(&candles, cfg.atr_period),
            obv: obv(&candles),
            or_high,
            or_low,
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Candle `back` rows from the end (0 = latest).
    pub fn candle_back(&self, back: usize) -> Option<&Candle> {
        self.candles.len().checked_sub(back + 1).map(|i| &self.candles[i])
    }
}

/// Value `back` rows from the end of a column (0 = latest).
pub fn nth_back<T: Copy>(column: &[T], back: usize) -> Option<T> {
    column.len().checked_sub(back + 1).map(|i| column[i])
}

/// Per-day opening range: each row carries the high/low of its day's first
/// candle. The candles of an unseen day start a new range.
fn opening_range(candles: &[Candle]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut highs = Vec::with_capacity(candles.len());
    let mut lows = Vec::with_capacity(candles.len());
    let mut day = None;
    let mut current = None;
    for c in candles {
        let d = c.trading_day();
        if day != Some(d) {
            day = Some(d);
            current = Some((c.high, c.low));
        }
        highs.push(current.map(|(h, _)| h));
        lows.push(current.map(|(_, l)| l));
    }
    (highs, lows)
}

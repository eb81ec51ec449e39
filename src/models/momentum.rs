//! Momentum / RSI confirmation
//!
//! Requires RSI in a directional band, an accelerating MACD histogram over
//! two consecutive steps, and a fresh extreme versus the prior candle.

use super::core::{Direction, ModelVote, SignalModel};
use crate::enriched::{EnrichedSeries, nth_back};
use crate::indicators::PivotLevels;

pub struct MomentumRsi;

impl MomentumRsi {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MomentumRsi {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalModel for MomentumRsi {
    fn name(&self) -> &'static str {
        "MOMENTUM"
    }

    fn evaluate(&self, series: &EnrichedSeries, _pivots: Option<&PivotLevels>) -> ModelVote {
        if series.len() < 5 {
            return ModelVote::neutral("MOMENTUM: insufficient data");
        }
        let (Some(cur), Some(prev)) = (series.candle_back(0), series.candle_back(1)) else {
            return ModelVote::neutral("MOMENTUM: insufficient data");
        };
        let (Some(cur_rsi), Some(prev_rsi)) = (
            nth_back(&series.rsi, 0).flatten(),
            nth_back(&series.rsi, 1).flatten(),
        ) else {
            return ModelVote::neutral("MOMENTUM: RSI unavailable");
        };
        let (Some(cur_hist), Some(prev_hist)) = (
            nth_back(&series.macd_hist, 0),
            nth_back(&series.macd_hist, 1),
        ) else {
            return ModelVote::neutral("MOMENTUM: MACD unavailable");
        };
        let pp_hist = nth_back(&series.macd_hist, 2).unwrap_or(prev_hist);

        let accel_up = cur_hist > prev_hist && prev_hist > pp_hist;
        let accel_down = cur_hist < prev_hist && prev_hist < pp_hist;
        let higher_high = cur.high > prev.high;
        let lower_low = cur.low < prev.low;

        if (45.0..=65.0).contains(&cur_rsi)
            && cur_rsi > prev_rsi
            && cur_hist > 0.0
            && accel_up
            && higher_high
        {
            let mut score = 3;
            if cur_rsi > 55.0 {
                score += 1;
            }
            // Extreme over the last three candles, not just the prior one.
            if series.candle_back(3).is_some_and(|c| cur.high > c.high) {
                score += 1;
            }
            ModelVote::directional(
                Direction::Buy,
                score,
                format!(
                    "MOMENTUM BUY: RSI {:.1} rising, MACD hist {:.1} accelerating, higher high",
                    cur_rsi, cur_hist
                ),
            )
        } else if (35.0..=55.0).contains(&cur_rsi)
            && cur_rsi < prev_rsi
            && cur_hist < 0.0
            && accel_down
            && lower_low
        {
            let mut score = 3;
            if cur_rsi < 45.0 {
                score += 1;
            }
            if series.candle_back(3).is_some_and(|c| cur.low < c.low) {
                score += 1;
            }
            ModelVote::directional(
                Direction::Sell,
                score,
                format!(
                    "MOMENTUM SELL: RSI {:.1} falling, MACD hist {:.1} accelerating, lower low",
                    cur_rsi, cur_hist
                ),
            )
        } else {
            ModelVote::neutral("MOMENTUM: no signal")
        }
    }
}

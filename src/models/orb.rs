//! Opening Range Breakout
//!
//! The first candle of the day sets the range; a close beyond it on elevated
//! volume votes in the breakout direction.

use super::core::{Direction, ModelVote, SignalModel};
use crate::enriched::{EnrichedSeries, nth_back};
use crate::indicators::PivotLevels;

pub struct OpeningRangeBreakout {
    volume_mult: f64,
}

impl OpeningRangeBreakout {
    pub fn new(volume_mult: f64) -> Self {
        Self { volume_mult }
    }

    /// First candle of the latest trading day in the series.
    fn day_open_index(series: &EnrichedSeries) -> Option<usize> {
        let last_day = series.candles.last()?.trading_day();
        series.candles.iter().position(|c| c.trading_day() == last_day)
    }
}

impl SignalModel for OpeningRangeBreakout {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn evaluate(&self, series: &EnrichedSeries, _pivots: Option<&PivotLevels>) -> ModelVote {
        if series.len() < 2 {
            return ModelVote::neutral("ORB: insufficient data");
        }
        let (Some(or_high), Some(or_low)) =
            (nth_back(&series.or_high, 0).flatten(), nth_back(&series.or_low, 0).flatten())
        else {
            return ModelVote::neutral("ORB: opening range not yet set");
        };

        let Some(cur) = series.candle_back(0) else {
            return ModelVote::neutral("ORB: insufficient data");
        };
        let avg_vol = nth_back(&series.avg_volume, 0).unwrap_or(0.0);
        let vol_ratio = if avg_vol > 0.0 { cur.volume / avg_vol } else { 0.0 };

        // Gap proxy: a down first candle of the day reads as a gap-up open.
        let Some(open_idx) = Self::day_open_index(series) else {
            return ModelVote::neutral("ORB: opening range not yet set");
        };
        let first = &series.candles[open_idx];
        let gap_up = first.open > first.close;
        let strong_body = cur.range() > 0.0 && cur.body() > 0.3 * cur.range();

        if cur.close > or_high && vol_ratio >= self.volume_mult {
            let mut score = 2;
            if vol_ratio >= 2.0 {
                score += 1;
            }
            if strong_body {
                score += 1;
            }
            if gap_up {
                score += 1;
            }
            ModelVote::directional(
                Direction::Buy,
                score,
                format!(
                    "ORB BUY: close {:.0} > OR high {:.0}, volume {:.1}x avg",
                    cur.close, or_high, vol_ratio
                ),
            )
        } else if cur.close < or_low && vol_ratio >= self.volume_mult {
            let mut score = 2;
            if vol_ratio >= 2.0 {
                score += 1;
            }
            if strong_body {
                score += 1;
            }
            if !gap_up {
                score += 1;
            }
            ModelVote::directional(
                Direction::Sell,
                score,
                format!(
                    "ORB SELL: close {:.0} < OR low {:.0}, volume {:.1}x avg",
                    cur.close, or_low, vol_ratio
                ),
            )
        } else {
            ModelVote::neutral("ORB: no breakout")
        }
    }
}

//! CPR Breakout
//!
//! Votes on a close crossing the central pivot range boundary from inside,
//! with bonuses for a narrow range and R1/S1 confluence.

use super::core::{Direction, ModelVote, SignalModel};
use crate::enriched::EnrichedSeries;
use crate::indicators::PivotLevels;

pub struct CprBreakout;

impl CprBreakout {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CprBreakout {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalModel for CprBreakout {
    fn name(&self) -> &'static str {
        "CPR"
    }

    fn evaluate(&self, series: &EnrichedSeries, pivots: Option<&PivotLevels>) -> ModelVote {
        let Some(levels) = pivots else {
            return ModelVote::neutral("CPR: levels not available");
        };
        let (Some(cur), Some(prev)) = (series.candle_back(0), series.candle_back(1)) else {
            return ModelVote::neutral("CPR: insufficient data");
        };

        if prev.close <= levels.tc && cur.close > levels.tc {
            let mut score = 3;
            if levels.is_narrow() {
                score += 1;
            }
            if levels.r1 != 0.0 && ((cur.close - levels.r1) / levels.r1).abs() < 0.002 {
                score += 1;
            }
            ModelVote::directional(
                Direction::Buy,
                score,
                format!(
                    "CPR BUY: broke TC {:.0}, width {:.3}%",
                    levels.tc, levels.width_pct
                ),
            )
        } else if prev.close >= levels.bc && cur.close < levels.bc {
            let mut score = 3;
            if levels.is_narrow() {
                score += 1;
            }
            if levels.s1 != 0.0 && ((cur.close - levels.s1) / levels.s1).abs() < 0.002 {
                score += 1;
            }
            ModelVote::directional(
                Direction::Sell,
                score,
                format!(
                    "CPR SELL: broke BC {:.0}, width {:.3}%",
                    levels.bc, levels.width_pct
                ),
            )
        } else {
            ModelVote::neutral("CPR: no breakout")
        }
    }
}

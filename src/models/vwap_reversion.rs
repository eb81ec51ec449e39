//! VWAP Reversion
//!
//! Fades a stretch away from VWAP once price crosses back through it with
//! RSI confirming the prior extension.

use super::core::{Direction, ModelVote, SignalModel};
use crate::enriched::{EnrichedSeries, nth_back};
use crate::indicators::PivotLevels;

pub struct VwapReversion;

impl VwapReversion {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VwapReversion {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalModel for VwapReversion {
    fn name(&self) -> &'static str {
        "VWAP"
    }

    fn evaluate(&self, series: &EnrichedSeries, _pivots: Option<&PivotLevels>) -> ModelVote {
        if series.len() < 3 {
            return ModelVote::neutral("VWAP: insufficient data");
        }
        let (Some(cur), Some(prev)) = (series.candle_back(0), series.candle_back(1)) else {
            return ModelVote::neutral("VWAP: insufficient data");
        };
        let (Some(cur_vwap), Some(prev_vwap), Some(cur_rsi)) = (
            nth_back(&series.vwap, 0).flatten(),
            nth_back(&series.vwap, 1).flatten(),
            nth_back(&series.rsi, 0).flatten(),
        ) else {
            return ModelVote::neutral("VWAP: VWAP or RSI unavailable");
        };

        if prev.close < prev_vwap && cur_rsi < 40.0 && cur.close > cur_vwap {
            let mut score = 3;
            if cur_rsi < 30.0 {
                score += 1;
            }
            if cur.is_bullish() {
                score += 1;
            }
            ModelVote::directional(
                Direction::Buy,
                score,
                format!(
                    "VWAP BUY reversion: RSI {:.1}, close {:.0} > VWAP {:.0}",
                    cur_rsi, cur.close, cur_vwap
                ),
            )
        } else if prev.close > prev_vwap && cur_rsi > 60.0 && cur.close < cur_vwap {
            let mut score = 3;
            if cur_rsi > 70.0 {
                score += 1;
            }
            if !cur.is_bullish() {
                score += 1;
            }
            ModelVote::directional(
                Direction::Sell,
                score,
                format!(
                    "VWAP SELL reversion: RSI {:.1}, close {:.0} < VWAP {:.0}",
                    cur_rsi, cur.close, cur_vwap
                ),
            )
        } else {
            ModelVote::neutral("VWAP: no signal")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::testutil::base_series;

    #[test]
    fn reversion_cross_above_vwap_votes_buy() {
        let mut series = base_series(5, 22000.0);
        let n = series.len();
        series.vwap = vec![Some(22000.0); n];
        series.rsi[n - 1] = Some(35.0);
        series.candles[n - 2].close = 21980.0; // below VWAP
        series.candles[n - 1].open = 22005.0;
        series.candles[n - 1].close = 22010.0; // back above, bullish candle

        let vote = VwapReversion::new().evaluate(&series, None);
        assert_eq!(vote.direction, Direction::Buy);
        assert_eq!(vote.score, 4); // base 3 + bullish candle
    }

    #[test]
    fn oversold_extremity_adds_a_point() {
        let mut series = base_series(5, 22000.0);
        let n = series.len();
        series.rsi[n - 1] = Some(28.0);
        series.candles[n - 2].close = 21980.0;
        series.candles[n - 1].open = 22005.0;
        series.candles[n - 1].close = 22010.0;

        let vote = VwapReversion::new().evaluate(&series, None);
        assert_eq!(vote.score, 5);
    }

    #[test]
    fn sell_mirror_requires_overbought_rsi() {
        let mut series = base_series(5, 22000.0);
        let n = series.len();
        series.rsi[n - 1] = Some(65.0);
        series.candles[n - 2].close = 22020.0; // above VWAP
        series.candles[n - 1].open = 21995.0;
        series.candles[n - 1].close = 21990.0; // back below, bearish

        let vote = VwapReversion::new().evaluate(&series, None);
        assert_eq!(vote.direction, Direction::Sell);
        assert_eq!(vote.score, 4);
    }

    #[test]
    fn missing_rsi_is_a_diagnostic_neutral() {
        let mut series = base_series(5, 22000.0);
        let n = series.len();
        series.rsi[n - 1] = None;
        let vote = VwapReversion::new().evaluate(&series, None);
        assert_eq!(vote.direction, Direction::Neutral);
        assert!(vote.reason.contains("unavailable"));
    }

    #[test]
    fn rsi_in_the_middle_is_no_signal() {
        let mut series = base_series(5, 22000.0);
        let n = series.len();
        series.candles[n - 2].close = 21980.0;
        series.candles[n - 1].close = 22010.0;
        // RSI 50 confirms nothing.
        let vote = VwapReversion::new().evaluate(&series, None);
        assert_eq!(vote.reason, "VWAP: no signal");
    }
}

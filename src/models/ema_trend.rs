//! EMA Trend Alignment
//!
//! Votes with a stacked fast/medium/slow EMA trend after a pullback touch of
//! the medium EMA on the prior candle.

use super::core::{Direction, ModelVote, SignalModel};
use crate::enriched::{EnrichedSeries, nth_back};
use crate::indicators::PivotLevels;

pub struct EmaTrendAlignment {
    /// Candles required before the slow EMA is considered settled.
    warmup: usize,
}

impl EmaTrendAlignment {
    pub fn new(warmup: usize) -> Self {
        Self { warmup }
    }
}

impl SignalModel for EmaTrendAlignment {
    fn name(&self) -> &'static str {
        "EMA"
    }

    fn evaluate(&self, series: &EnrichedSeries, _pivots: Option<&PivotLevels>) -> ModelVote {
        if series.len() < self.warmup {
            return ModelVote::neutral(format!(
                "EMA: warming up (<{} candles)",
                self.warmup
            ));
        }
        let (Some(cur), Some(prev)) = (series.candle_back(0), series.candle_back(1)) else {
            return ModelVote::neutral("EMA: insufficient data");
        };
        let (Some(fast), Some(medium), Some(slow)) = (
            nth_back(&series.ema_fast, 0),
            nth_back(&series.ema_medium, 0),
            nth_back(&series.ema_slow, 0),
        ) else {
            return ModelVote::neutral("EMA: insufficient data");
        };
        if !(cur.close.is_finite() && fast.is_finite() && medium.is_finite() && slow.is_finite()) {
            return ModelVote::neutral("EMA: non-finite values");
        }

        // Normalised fast/slow separation; wider means a stronger trend.
        let sep_pct = if slow != 0.0 {
            (fast - slow).abs() / slow * 100.0
        } else {
            0.0
        };

        if fast > medium && medium > slow && cur.close > fast && prev.low <= medium * 1.001 {
            let mut score = 3;
            if sep_pct > 0.3 {
                score += 1;
            }
            if cur.is_bullish() {
                score += 1;
            }
            ModelVote::directional(
                Direction::Buy,
                score,
                format!("EMA BUY: aligned pullback bounce, separation {sep_pct:.2}%"),
            )
        } else if fast < medium && medium < slow && cur.close < fast && prev.high >= medium * 0.999
        {
            let mut score = 3;
            if sep_pct > 0.3 {
                score += 1;
            }
            if !cur.is_bullish() {
                score += 1;
            }
            ModelVote::directional(
                Direction::Sell,
                score,
                format!("EMA SELL: aligned pullback rejection, separation {sep_pct:.2}%"),
            )
        } else {
            ModelVote::neutral("EMA: no alignment")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::testutil::base_series;

    fn aligned_buy_series() -> EnrichedSeries {
        let mut series = base_series(60, 22000.0);
        let n = series.len();
        series.ema_fast = vec![22050.0; n];
        series.ema_medium = vec![22020.0; n];
        series.ema_slow = vec![21990.0; n];
        series.candles[n - 2].low = 22015.0; // pullback touched the medium EMA
        series.candles[n - 1].open = 22055.0;
        series.candles[n - 1].close = 22070.0; // above fast, bullish
        series
    }

    #[test]
    fn warming_up_before_enough_candles() {
        let series = base_series(50, 22000.0);
        let vote = EmaTrendAlignment::new(51).evaluate(&series, None);
        assert_eq!(vote.direction, Direction::Neutral);
        assert!(vote.reason.contains("warming up"));
    }

    #[test]
    fn aligned_pullback_bounce_votes_buy() {
        let vote = EmaTrendAlignment::new(51).evaluate(&aligned_buy_series(), None);
        assert_eq!(vote.direction, Direction::Buy);
        // base 3 + bullish candle; separation 60/21990 = 0.27% misses the bonus
        assert_eq!(vote.score, 4);
    }

    #[test]
    fn wide_separation_adds_a_point() {
        let mut series = aligned_buy_series();
        let n = series.len();
        series.ema_slow = vec![21900.0; n]; // 150 / 21900 = 0.68%
        let vote = EmaTrendAlignment::new(51).evaluate(&series, None);
        assert_eq!(vote.score, 5);
    }

    #[test]
    fn alignment_without_pullback_is_neutral() {
        let mut series = aligned_buy_series();
        let n = series.len();
        // Stays above the 0.1% touch band around the medium EMA (22042.02).
        series.candles[n - 2].low = 22050.0;
        let vote = EmaTrendAlignment::new(51).evaluate(&series, None);
        assert_eq!(vote.reason, "EMA: no alignment");
    }

    #[test]
    fn bearish_alignment_votes_sell() {
        let mut series = base_series(60, 22000.0);
        let n = series.len();
        series.ema_fast = vec![21950.0; n];
        series.ema_medium = vec![21980.0; n];
        series.ema_slow = vec![22010.0; n];
        series.candles[n - 2].high = 21985.0; // rejection at medium EMA
        series.candles[n - 1].open = 21945.0;
        series.candles[n - 1].close = 21930.0;
        let vote = EmaTrendAlignment::new(51).evaluate(&series, None);
        assert_eq!(vote.direction, Direction::Sell);
        assert_eq!(vote.score, 4);
    }
}

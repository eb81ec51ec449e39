//! Voting models
//!
//! Five independent, stateless evaluators behind one `SignalModel` trait.
//! Each consumes the enriched series (plus pivot levels where relevant) and
//! emits a directional vote; the consensus engine never hardcodes the set.

pub mod core;
pub mod cpr_breakout;
pub mod ema_trend;
pub mod momentum;
pub mod orb;
pub mod vwap_reversion;

pub use self::core::{Direction, ModelVote, SignalModel};

use crate::config::IndicatorConfig;

/// The standard five-model set in presentation order.
pub fn standard_models(cfg: &IndicatorConfig) -> Vec<Box<dyn SignalModel>> {
    vec![
        Box::new(orb::OpeningRangeBreakout::new(cfg.orb_volume_mult)),
        Box::new(vwap_reversion::VwapReversion::new()),
        Box::new(ema_trend::EmaTrendAlignment::new(cfg.ema_slow + 1)),
        Box::new(momentum::MomentumRsi::new()),
        Box::new(cpr_breakout::CprBreakout::new()),
    ]
}

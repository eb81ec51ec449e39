//! Risk and target calculation plus option strike suggestion.
//!
//! Stop-loss defaults to a percentage of entry; an opening-range level on the
//! correct side overrides it when tighter. Risk-reward ratios are recomputed
//! from realized distances so an override shows up in the ratios.

use crate::config::{InstrumentConfig, RiskConfig};
use crate::models::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPlan {
    pub entry: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
    pub rr_1: f64,
    pub rr_2: f64,
    pub risk_points: f64,
    pub lot_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "CE"),
            OptionType::Put => write!(f, "PE"),
        }
    }
}

/// ATM / one-step ITM strike pair for the signal direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsIdea {
    pub option_type: OptionType,
    pub atm_strike: i64,
    pub itm_strike: i64,
    pub atm_symbol: String,
    pub itm_symbol: String,
    pub lot_size: u32,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round_to_strike(price: f64, interval: u32) -> i64 {
    let interval = i64::from(interval.max(1));
    (price / interval as f64).round() as i64 * interval
}

/// Derive the stop, both targets and realized ratios for a signal.
///
/// `structural` is the opening-range boundary on the risk side (OR low for
/// BUY, OR high for SELL), padded by 0.1% of entry before comparison.
pub fn calculate_risk(
    direction: Direction,
    entry: f64,
    structural: Option<f64>,
    instrument: &InstrumentConfig,
    cfg: &RiskConfig,
) -> RiskPlan {
    let pct_points = entry * cfg.sl_pct;

    let stop_loss = match direction {
        Direction::Sell => {
            let pct_sl = entry + pct_points;
            match structural.filter(|level| *level > entry) {
                Some(level) => pct_sl.min(level + entry * 0.001),
                None => pct_sl,
            }
        }
        // BUY and (defensively) NEUTRAL both stop below entry.
        _ => {
            let pct_sl = entry - pct_points;
            let sl = match structural.filter(|level| *level < entry) {
                Some(level) => pct_sl.max(level - entry * 0.001),
                None => pct_sl,
            };
            sl.max(0.0)
        }
    };

    let mut risk_points = (entry - stop_loss).abs();
    if risk_points == 0.0 {
        risk_points = pct_points;
    }

    let sign = if direction == Direction::Sell { -1.0 } else { 1.0 };
    let target_1 = entry + sign * risk_points * cfg.target_rr_min;
    let target_2 = entry + sign * risk_points * cfg.target_rr_ideal;

    RiskPlan {
        entry: round2(entry),
        stop_loss: round2(stop_loss),
        target_1: round2(target_1),
        target_2: round2(target_2),
        rr_1: round2((target_1 - entry).abs() / risk_points),
        rr_2: round2((target_2 - entry).abs() / risk_points),
        risk_points: round2(risk_points),
        lot_size: instrument.lot_size,
    }
}

/// ATM and one-step ITM strikes for the direction, rounded to the
/// instrument's strike interval.
pub fn suggest_options(
    direction: Direction,
    last_price: f64,
    instrument: &InstrumentConfig,
) -> OptionsIdea {
    let interval = instrument.strike_interval;
    let atm = round_to_strike(last_price, interval);
    let step = i64::from(interval);
    // ITM call sits below spot, ITM put above.
    let (option_type, itm) = match direction {
        Direction::Sell => (OptionType::Put, atm + step),
        _ => (OptionType::Call, atm - step),
    };

    let symbol = |strike: i64| {
        format!(
            "{}:{}{}{}{}",
            instrument.exchange, instrument.name, instrument.expiry_code, strike, option_type
        )
    };

    OptionsIdea {
        option_type,
        atm_strike: atm,
        itm_strike: itm,
        atm_symbol: symbol(atm),
        itm_symbol: symbol(itm),
        lot_size: instrument.lot_size,
    }
}

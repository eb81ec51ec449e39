//! Post-signal outcome replay
//!
//! Walks the candles after a signal chronologically: waits for the entry
//! price to be touched, then checks each later candle for a stop or target
//! touch. The entry candle itself never triggers an exit, and a candle that
//! spans both levels counts as a stop (conservative tie-break).

use crate::market_data::Candle;
use crate::models::Direction;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeOutcome {
    /// Entry price never traded.
    Pending,
    /// In the trade with history exhausted and no exit.
    Watching,
    SlHit,
    TargetHit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub entry_met: bool,
    pub entry_met_time: Option<DateTime<FixedOffset>>,
    pub outcome: TradeOutcome,
    pub exit_price: Option<f64>,
    pub pnl_pct: Option<f64>,
}

impl OutcomeReport {
    fn pending() -> Self {
        Self {
            entry_met: false,
            entry_met_time: None,
            outcome: TradeOutcome::Pending,
            exit_price: None,
            pnl_pct: None,
        }
    }
}

enum State {
    AwaitingEntry,
    InTrade,
}

pub fn evaluate_outcome(
    direction: Direction,
    entry: f64,
    stop_loss: f64,
    target: f64,
    candles_after: &[Candle],
) -> OutcomeReport {
    let mut report = OutcomeReport::pending();
    let mut state = State::AwaitingEntry;

    for candle in candles_after {
        match state {
            State::AwaitingEntry => {
                let touched = match direction {
                    Direction::Sell => candle.low <= entry,
                    _ => candle.high >= entry,
                };
                if touched {
                    report.entry_met = true;
                    report.entry_met_time = Some(candle.timestamp);
                    // Exit checks start on the next candle.
                    state = State::InTrade;
                }
            }
            State::InTrade => {
                let (stop_touched, target_touched) = match direction {
                    Direction::Sell => (candle.high >= stop_loss, candle.low <= target),
                    _ => (candle.low <= stop_loss, candle.high >= target),
                };
                if stop_touched {
                    report.outcome = TradeOutcome::SlHit;
                    report.exit_price = Some(stop_loss);
                    break;
                }
                if target_touched {
                    report.outcome = TradeOutcome::TargetHit;
                    report.exit_price = Some(target);
                    break;
                }
            }
        }
    }

    if report.entry_met && report.outcome == TradeOutcome::Pending {
        report.outcome = TradeOutcome::Watching;
    }

    if let Some(exit) = report.exit_price {
        let pnl = match direction {
            Direction::Sell => (entry - exit) / entry * 100.0,
            _ => (exit - entry) / entry * 100.0,
        };
        report.pnl_pct = Some((pnl * 1000.0).round() / 1000.0);
    }

    report
}

//! Model vote types and the scoring-rule trait shared by all models.

use crate::enriched::EnrichedSeries;
use crate::indicators::PivotLevels;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_MODEL_SCORE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// One model's output for one scan. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVote {
    pub direction: Direction,
    pub score: u8,
    pub reason: String,
}

impl ModelVote {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            direction: Direction::Neutral,
            score: 0,
            reason: reason.into(),
        }
    }

    pub fn directional(direction: Direction, score: u8, reason: impl Into<String>) -> Self {
        Self {
            direction,
            score: score.min(MAX_MODEL_SCORE),
            reason: reason.into(),
        }
    }
}

/// A scoring rule over the enriched series. Implementations are pure: they
/// never mutate shared state and answer insufficient or invalid history with
/// a zero-score NEUTRAL vote instead of an error.
pub trait SignalModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, series: &EnrichedSeries, pivots: Option<&PivotLevels>) -> ModelVote;
}

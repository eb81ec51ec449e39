//! Consensus and grading
//!
//! Tallies the model votes, applies agreement and dead-zone gates, and either
//! grades the signal or rejects it with a typed reason. Signals below the
//! medium grade are discarded entirely, never reported as a weaker tier.

use crate::config::{ConsensusConfig, SessionConfig};
use crate::models::{Direction, ModelVote};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+ HIGH")]
    High,
    #[serde(rename = "A+ MEDIUM")]
    Medium,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::High => write!(f, "A+ HIGH"),
            Grade::Medium => write!(f, "A+ MEDIUM"),
        }
    }
}

/// Why a tallied scan produced no signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    OutsideWindow,
    NoConsensus { buy: usize, sell: usize },
    DeadZone { score: u32, required: u32 },
    BelowGrade { score: u32, agreeing: usize },
    TrendFilter { close: f64, vwap: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutsideWindow => write!(f, "outside signal window"),
            RejectReason::NoConsensus { buy, sell } => {
                write!(f, "no consensus (BUY={buy}, SELL={sell})")
            }
            RejectReason::DeadZone { score, required } => {
                write!(f, "dead zone: score {score} < {required}")
            }
            RejectReason::BelowGrade { score, agreeing } => {
                write!(f, "below grade thresholds (score {score}, agreeing {agreeing})")
            }
            RejectReason::TrendFilter { close, vwap } => {
                write!(f, "BUY filtered: price {close:.0} below VWAP {vwap:.0}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub direction: Direction,
    pub agreeing: usize,
    pub total_score: u32,
    pub grade: Grade,
}

pub struct ConsensusEngine<'a> {
    consensus: &'a ConsensusConfig,
    session: &'a SessionConfig,
}

impl<'a> ConsensusEngine<'a> {
    pub fn new(consensus: &'a ConsensusConfig, session: &'a SessionConfig) -> Self {
        Self { consensus, session }
    }

    /// Evaluate the votes as of `at` (exchange-local candle time), with the
    /// latest close and VWAP for the trend filter.
    pub fn evaluate(
        &self,
        votes: &[ModelVote],
        at: NaiveTime,
        close: f64,
        vwap: Option<f64>,
    ) -> Result<Consensus, RejectReason> {
        let cfg = self.consensus;
        let buy = votes.iter().filter(|v| v.direction == Direction::Buy).count();
        let sell = votes.iter().filter(|v| v.direction == Direction::Sell).count();

        // Ties resolve to BUY only when BUY itself meets the threshold.
        let (direction, agreeing) = if buy >= sell && buy >= cfg.min_models_agree {
            (Direction::Buy, buy)
        } else if sell > buy && sell >= cfg.min_models_agree {
            (Direction::Sell, sell)
        } else {
            return Err(RejectReason::NoConsensus { buy, sell });
        };

        // Every model's score counts, including neutral and opposing votes.
        let mut total_score: u32 = votes.iter().map(|v| u32::from(v.score)).sum();
        if agreeing == votes.len() {
            total_score += cfg.all_agree_bonus;
        }

        if self.session.in_dead_zone(at) && total_score < cfg.dead_zone_min_score {
            return Err(RejectReason::DeadZone {
                score: total_score,
                required: cfg.dead_zone_min_score,
            });
        }

        let grade = if total_score >= cfg.high_grade_score && agreeing >= cfg.high_grade_agreement
        {
            Grade::High
        } else if total_score >= cfg.medium_grade_score && agreeing >= cfg.min_models_agree {
            Grade::Medium
        } else {
            return Err(RejectReason::BelowGrade {
                score: total_score,
                agreeing,
            });
        };

        // Trend filter is deliberately BUY-only: longs below VWAP are
        // rejected, shorts above VWAP are not. Preserved product behavior.
        if direction == Direction::Buy {
            if let Some(vwap) = vwap {
                if close < vwap {
                    return Err(RejectReason::TrendFilter { close, vwap });
                }
            }
        }

        Ok(Consensus {
            direction,
            agreeing,
            total_score,
            grade,
        })
    }
}

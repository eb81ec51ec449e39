//! Intraday index-futures signal scanner.
//!
//! Pipeline: intraday candles are enriched with indicators, five independent
//! models vote on direction with a scored conviction, a consensus engine
//! tallies and grades the votes, and surviving signals get a risk plan and an
//! option strike suggestion. A replay evaluator classifies what a past signal
//! went on to do.

pub mod config;
pub mod consensus;
pub mod enriched;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod models;
pub mod outcome;
pub mod risk;
pub mod scanner;

pub use config::ScannerConfig;
pub use consensus::{Consensus, ConsensusEngine, Grade, RejectReason};
pub use enriched::EnrichedSeries;
pub use error::ScanError;
pub use market_data::{Candle, MarketDataProvider, ReplayProvider, Series};
pub use models::{Direction, ModelVote, SignalModel};
pub use outcome::{OutcomeReport, TradeOutcome, evaluate_outcome};
pub use risk::{OptionsIdea, RiskPlan};
pub use scanner::{ScanState, Scanner, Signal};

//! Scan orchestrator
//!
//! Drives the per-instrument pipeline (pivots, intraday fetch, enrichment,
//! model votes, consensus, risk plan) across the configured universe and
//! publishes progress and results to a shared, pollable state snapshot.
//! At most one cycle runs at a time; a trigger during a running cycle is a
//! no-op. Individual instrument failures are recorded in the cycle report
//! and never abort the remaining instruments.

use crate::config::{InstrumentConfig, ScannerConfig};
use crate::consensus::{ConsensusEngine, Grade, RejectReason};
use crate::enriched::{EnrichedSeries, nth_back};
use crate::error::ScanError;
use crate::indicators::{PivotLevels, cpr_levels};
use crate::market_data::MarketDataProvider;
use crate::models::{Direction, ModelVote, SignalModel, standard_models};
use crate::outcome::{OutcomeReport, evaluate_outcome};
use crate::risk::{OptionsIdea, RiskPlan, calculate_risk, suggest_options};
use chrono::{DateTime, FixedOffset, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One model's vote annotated for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub name: String,
    pub direction: Direction,
    pub score: u8,
    pub reason: String,
    /// Whether this model voted with the consensus direction.
    pub agrees: bool,
}

/// A qualifying scan output. Immutable once assembled; the results buffer is
/// overwritten by each new cycle, never appended across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub direction: Direction,
    pub grade: Grade,
    pub total_score: u32,
    pub agreeing: usize,
    pub models: Vec<ModelReport>,
    #[serde(flatten)]
    pub risk: RiskPlan,
    pub options: OptionsIdea,
    /// Timestamp of the candle the signal fired on.
    pub signal_time: DateTime<FixedOffset>,
    pub scanned_at: DateTime<FixedOffset>,
    pub pivots: Option<PivotLevels>,
}

/// Per-instrument cycle result, kept typed instead of being swallowed into
/// logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstrumentOutcome {
    Signal,
    NoSignal { reason: RejectReason },
    Skipped { detail: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub instrument: String,
    pub outcome: InstrumentOutcome,
}

/// Pollable scan snapshot. Mutated only by the orchestrator under the lock;
/// readers receive clones.
#[derive(Debug, Clone, Serialize)]
pub struct ScanState {
    pub running: bool,
    pub progress: u8,
    pub message: String,
    pub signals: Vec<Signal>,
    pub pivots: HashMap<String, PivotLevels>,
    pub report: Vec<InstrumentReport>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub last_error: Option<String>,
}

impl ScanState {
    fn idle() -> Self {
        Self {
            running: false,
            progress: 0,
            message: "Idle".to_string(),
            signals: Vec::new(),
            pivots: HashMap::new(),
            report: Vec::new(),
            completed_at: None,
            last_error: None,
        }
    }
}

/// Enriched last row exposed by the debug interface.
#[derive(Debug, Clone, Serialize)]
pub struct LastCandleSnapshot {
    pub time: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ema_fast: f64,
    pub ema_medium: f64,
    pub ema_slow: f64,
    pub rsi: Option<f64>,
    pub macd_hist: f64,
    pub vwap: Option<f64>,
    pub atr: f64,
    pub obv: f64,
    pub or_high: Option<f64>,
    pub or_low: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugVote {
    pub name: String,
    #[serde(flatten)]
    pub vote: ModelVote,
}

/// Full pipeline detail for one instrument, independent of any running cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub instrument: String,
    pub candle_count: usize,
    pub last_candle: Option<LastCandleSnapshot>,
    pub pivots: Option<PivotLevels>,
    pub votes: Vec<DebugVote>,
}

pub struct Scanner {
    config: Arc<ScannerConfig>,
    provider: Arc<dyn MarketDataProvider>,
    models: Arc<Vec<Box<dyn SignalModel>>>,
    state: Arc<Mutex<ScanState>>,
}

impl Scanner {
    pub fn new(config: ScannerConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let models = Arc::new(standard_models(&config.indicators));
        Self {
            config: Arc::new(config),
            provider,
            models,
            state: Arc::new(Mutex::new(ScanState::idle())),
        }
    }

    /// Current scan state snapshot.
    pub async fn results(&self) -> ScanState {
        self.state.lock().await.clone()
    }

    /// Start a background cycle and return immediately. Returns `false`
    /// without side effects when a cycle is already running.
    pub async fn trigger_scan(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.running {
                info!("Scan already running, trigger ignored");
                return false;
            }
            *state = ScanState::idle();
            state.running = true;
            state.message = "Starting scan...".to_string();
        }

        let config = Arc::clone(&self.config);
        let provider = Arc::clone(&self.provider);
        let models = Arc::clone(&self.models);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            run_cycle(config, provider, models, state).await;
        });
        true
    }

    /// Run the full pipeline for one instrument and return every raw vote,
    /// without touching the shared state.
    pub async fn debug_scan(&self, name: &str) -> Result<DebugReport, ScanError> {
        let instrument = self.instrument(name)?;
        let pivots = fetch_pivots(&*self.provider, instrument, self.config.daily_lookback)
            .await
            .map_err(|e| {
                warn!("{name}: pivot fetch failed during debug scan: {e}");
                e
            })
            .ok();

        let series = fetch_enriched(&self.config, &*self.provider, instrument).await?;
        let votes = self
            .models
            .iter()
            .map(|model| DebugVote {
                name: model.name().to_string(),
                vote: model.evaluate(&series, pivots.as_ref()),
            })
            .collect();

        let last_candle = series.candle_back(0).map(|c| LastCandleSnapshot {
            time: c.timestamp,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            ema_fast: nth_back(&series.ema_fast, 0).unwrap_or_default(),
            ema_medium: nth_back(&series.ema_medium, 0).unwrap_or_default(),
            ema_slow: nth_back(&series.ema_slow, 0).unwrap_or_default(),
            rsi: nth_back(&series.rsi, 0).flatten(),
            macd_hist: nth_back(&series.macd_hist, 0).unwrap_or_default(),
            vwap: nth_back(&series.vwap, 0).flatten(),
            atr: nth_back(&series.atr, 0).unwrap_or_default(),
            obv: nth_back(&series.obv, 0).unwrap_or_default(),
            or_high: nth_back(&series.or_high, 0).flatten(),
            or_low: nth_back(&series.or_low, 0).flatten(),
        });

        Ok(DebugReport {
            instrument: instrument.name.clone(),
            candle_count: series.len(),
            last_candle,
            pivots,
            votes,
        })
    }

    /// Today's pivot levels for one tracked instrument, computed fresh.
    pub async fn pivot_levels(&self, name: &str) -> Result<PivotLevels, ScanError> {
        let instrument = self.instrument(name)?;
        fetch_pivots(&*self.provider, instrument, self.config.daily_lookback).await
    }

    /// Replay the candles after a signal and classify its outcome.
    pub async fn signal_outcome(
        &self,
        name: &str,
        direction: Direction,
        entry: f64,
        stop_loss: f64,
        target: f64,
        signal_time: DateTime<FixedOffset>,
    ) -> Result<(OutcomeReport, usize), ScanError> {
        let instrument = self.instrument(name)?;
        let candles = self
            .provider
            .fetch_after(&instrument.symbol, signal_time)
            .await
            .map_err(ScanError::Upstream)?;
        Ok((
            evaluate_outcome(direction, entry, stop_loss, target, &candles),
            candles.len(),
        ))
    }

    fn instrument(&self, name: &str) -> Result<&InstrumentConfig, ScanError> {
        self.config
            .instrument(name)
            .ok_or_else(|| ScanError::UnknownInstrument(name.to_string()))
    }
}

async fn run_cycle(
    config: Arc<ScannerConfig>,
    provider: Arc<dyn MarketDataProvider>,
    models: Arc<Vec<Box<dyn SignalModel>>>,
    state: Arc<Mutex<ScanState>>,
) {
    let total = config.instruments.len().max(1);

    for (i, instrument) in config.instruments.iter().enumerate() {
        {
            let mut s = state.lock().await;
            s.progress = (i * 80 / total) as u8;
            s.message = format!("Fetching pivots for {}...", instrument.name);
        }

        let pivots = match fetch_pivots(&*provider, instrument, config.daily_lookback).await {
            Ok(levels) => {
                state.lock().await.pivots.insert(instrument.name.clone(), levels);
                Some(levels)
            }
            Err(e) => {
                warn!("{}: pivot levels unavailable: {e}", instrument.name);
                None
            }
        };

        {
            let mut s = state.lock().await;
            s.message = format!("Scanning {}...", instrument.name);
        }

        let outcome = match scan_instrument(&config, &*provider, &models, instrument, pivots.as_ref())
            .await
        {
            Ok(Ok(signal)) => {
                info!(
                    "Signal: {} {} {} score={}",
                    signal.instrument, signal.direction, signal.grade, signal.total_score
                );
                let mut s = state.lock().await;
                s.signals.push(signal);
                InstrumentOutcome::Signal
            }
            Ok(Err(reason)) => {
                info!("{}: {reason}", instrument.name);
                InstrumentOutcome::NoSignal { reason }
            }
            Err(ScanError::DataUnavailable(detail)) => {
                warn!("{}: {detail}", instrument.name);
                InstrumentOutcome::Skipped { detail }
            }
            Err(e) => {
                error!("{}: scan failed: {e}", instrument.name);
                state.lock().await.last_error = Some(e.to_string());
                InstrumentOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        state.lock().await.report.push(InstrumentReport {
            instrument: instrument.name.clone(),
            outcome,
        });
    }

    let mut s = state.lock().await;
    s.progress = 100;
    s.message = format!("Scan complete. {} signal(s) found.", s.signals.len());
    s.completed_at = Some(Utc::now().with_timezone(&config.exchange_offset()));
    s.running = false;
}

/// Evaluate one instrument: `Ok(Ok)` is a qualifying signal, `Ok(Err)` a
/// typed rejection, `Err` a skip or failure.
async fn scan_instrument(
    config: &ScannerConfig,
    provider: &dyn MarketDataProvider,
    models: &[Box<dyn SignalModel>],
    instrument: &InstrumentConfig,
    pivots: Option<&PivotLevels>,
) -> Result<Result<Signal, RejectReason>, ScanError> {
    let series = fetch_enriched(config, provider, instrument).await?;

    let last = series
        .candle_back(0)
        .ok_or_else(|| ScanError::DataUnavailable(format!("{}: empty series", instrument.name)))?;
    let signal_time = last.timestamp;
    let close = last.close;
    if !close.is_finite() {
        return Err(ScanError::InvalidNumeric(format!(
            "{}: latest close",
            instrument.name
        )));
    }

    // Gates are evaluated at candle time so replayed data behaves exactly
    // like a live scan did at that moment.
    if !config.session.in_signal_window(signal_time.time()) {
        return Ok(Err(RejectReason::OutsideWindow));
    }

    let votes: Vec<ModelVote> = models
        .iter()
        .map(|model| model.evaluate(&series, pivots))
        .collect();

    let vwap = nth_back(&series.vwap, 0).flatten();
    let engine = ConsensusEngine::new(&config.consensus, &config.session);
    let consensus = match engine.evaluate(&votes, signal_time.time(), close, vwap) {
        Ok(c) => c,
        Err(reason) => return Ok(Err(reason)),
    };

    // The opening-range boundary on the risk side can tighten the stop.
    let structural = match consensus.direction {
        Direction::Sell => nth_back(&series.or_high, 0).flatten(),
        _ => nth_back(&series.or_low, 0).flatten(),
    };
    let risk = calculate_risk(consensus.direction, close, structural, instrument, &config.risk);
    let options = suggest_options(consensus.direction, close, instrument);

    let model_reports = models
        .iter()
        .zip(&votes)
        .map(|(model, vote)| ModelReport {
            name: model.name().to_string(),
            direction: vote.direction,
            score: vote.score,
            reason: vote.reason.clone(),
            agrees: vote.direction == consensus.direction,
        })
        .collect();

    Ok(Ok(Signal {
        instrument: instrument.name.clone(),
        direction: consensus.direction,
        grade: consensus.grade,
        total_score: consensus.total_score,
        agreeing: consensus.agreeing,
        models: model_reports,
        risk,
        options,
        signal_time,
        scanned_at: Utc::now().with_timezone(&config.exchange_offset()),
        pivots: pivots.copied(),
    }))
}

async fn fetch_enriched(
    config: &ScannerConfig,
    provider: &dyn MarketDataProvider,
    instrument: &InstrumentConfig,
) -> Result<EnrichedSeries, ScanError> {
    let day = config.scan_date.unwrap_or_else(|| {
        Utc::now().with_timezone(&config.exchange_offset()).date_naive()
    });
    let from = day - chrono::Days::new(config.intraday_days.saturating_sub(1) as u64);
    let candles = provider
        .fetch_intraday(&instrument.symbol, from, day)
        .await
        .map_err(ScanError::Upstream)?;
    if candles.len() < 5 {
        return Err(ScanError::DataUnavailable(format!(
            "{}: only {} candles for {day}",
            instrument.name,
            candles.len()
        )));
    }
    Ok(EnrichedSeries::enrich(candles, &config.indicators))
}

async fn fetch_pivots(
    provider: &dyn MarketDataProvider,
    instrument: &InstrumentConfig,
    daily_lookback: usize,
) -> Result<PivotLevels, ScanError> {
    let daily = provider
        .fetch_daily(&instrument.symbol, daily_lookback)
        .await
        .map_err(ScanError::Upstream)?;
    let prev = daily.last().ok_or_else(|| {
        ScanError::DataUnavailable(format!("{}: no daily candles", instrument.name))
    })?;
    Ok(cpr_levels(prev.high, prev.low, prev.close))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{Candle, MockMarketDataProvider};
    use chrono::{NaiveDate, TimeZone};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(19800).unwrap()
    }

    fn intraday_candle(slot: i64, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: ist().with_ymd_and_hms(2026, 3, 10, 9, 15, 0).unwrap()
                + chrono::Duration::minutes(15 * slot),
            open: close - 3.0,
            high: close + 8.0,
            low: close - 8.0,
            close,
            volume,
        }
    }

    fn test_config() -> ScannerConfig {
        let mut config = ScannerConfig::default();
        config.scan_date = Some(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        config
    }

    #[tokio::test]
    async fn unknown_instrument_is_a_synchronous_error() {
        let scanner = Scanner::new(test_config(), Arc::new(MockMarketDataProvider::new()));
        let err = scanner.debug_scan("GOLD").await.unwrap_err();
        assert!(matches!(err, ScanError::UnknownInstrument(_)));
        let err = scanner.pivot_levels("GOLD").await.unwrap_err();
        assert!(matches!(err, ScanError::UnknownInstrument(_)));
    }

    #[tokio::test]
    async fn pivot_levels_come_from_last_daily_candle() {
        let mut provider = MockMarketDataProvider::new();
        provider.expect_fetch_daily().returning(|_, _| {
            Ok(vec![
                Candle {
                    timestamp: ist().with_ymd_and_hms(2026, 3, 9, 15, 30, 0).unwrap(),
                    open: 22450.0,
                    high: 22600.0,
                    low: 22400.0,
                    close: 22500.0,
                    volume: 0.0,
                },
            ])
        });
        let scanner = Scanner::new(test_config(), Arc::new(provider));
        let levels = scanner.pivot_levels("NIFTY").await.unwrap();
        assert!((levels.pivot - 22500.0).abs() < 1e-9);
        assert!((levels.tc - 22550.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn debug_scan_reports_all_five_votes() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_fetch_daily()
            .returning(|_, _| Err(anyhow::anyhow!("daily history offline")));
        provider.expect_fetch_intraday().returning(|_, _, _| {
            Ok((0..12).map(|i| intraday_candle(i, 22500.0 + i as f64, 1000.0)).collect())
        });
        let scanner = Scanner::new(test_config(), Arc::new(provider));

        let report = scanner.debug_scan("NIFTY").await.unwrap();
        assert_eq!(report.candle_count, 12);
        assert_eq!(report.votes.len(), 5);
        assert!(report.pivots.is_none());
        let last = report.last_candle.unwrap();
        assert_eq!(last.close, 22511.0);
        assert!(last.vwap.is_some());
        let names: Vec<&str> = report.votes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["ORB", "VWAP", "EMA", "MOMENTUM", "CPR"]);
    }

    #[tokio::test]
    async fn short_series_skips_the_instrument() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_fetch_daily()
            .returning(|_, _| Ok(vec![intraday_candle(0, 22500.0, 0.0)]));
        provider
            .expect_fetch_intraday()
            .returning(|_, _, _| Ok(vec![intraday_candle(0, 22500.0, 1000.0)]));
        let config = test_config();
        let instrument = config.instrument("NIFTY").unwrap().clone();
        let models = standard_models(&config.indicators);

        let result = scan_instrument(&config, &provider, &models, &instrument, None).await;
        assert!(matches!(result, Err(ScanError::DataUnavailable(_))));
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_a_noop() {
        let mut provider = MockMarketDataProvider::new();
        provider.expect_fetch_daily().returning(|_, _| {
            // Slow upstream keeps the first cycle running.
            std::thread::sleep(std::time::Duration::from_millis(50));
            Err(anyhow::anyhow!("offline"))
        });
        provider
            .expect_fetch_intraday()
            .returning(|_, _, _| Err(anyhow::anyhow!("offline")));
        let scanner = Scanner::new(test_config(), Arc::new(provider));

        assert!(scanner.trigger_scan().await);
        assert!(!scanner.trigger_scan().await);

        // Wait for the cycle to finish and release the running flag.
        for _ in 0..100 {
            if !scanner.results().await.running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let state = scanner.results().await;
        assert!(!state.running);
        assert_eq!(state.progress, 100);
        assert!(scanner.trigger_scan().await);
    }

    #[tokio::test]
    async fn upstream_failure_is_recorded_not_fatal() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_fetch_daily()
            .returning(|_, _| Err(anyhow::anyhow!("token expired")));
        provider
            .expect_fetch_intraday()
            .returning(|_, _, _| Err(anyhow::anyhow!("token expired")));
        let scanner = Scanner::new(test_config(), Arc::new(provider));

        scanner.trigger_scan().await;
        for _ in 0..100 {
            if !scanner.results().await.running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let state = scanner.results().await;
        // Both instruments were attempted despite the first failing.
        assert_eq!(state.report.len(), 2);
        assert!(state
            .report
            .iter()
            .all(|r| matches!(r.outcome, InstrumentOutcome::Failed { .. })));
        assert!(state.last_error.as_deref().unwrap().contains("token expired"));
        assert_eq!(state.signals.len(), 0);
    }
}

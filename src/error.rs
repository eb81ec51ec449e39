//! Scan error taxonomy
//!
//! Per-instrument failures are typed so the orchestrator can record them in
//! the cycle report instead of swallowing them into logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Empty or too-short candle series; the instrument is skipped, never fatal.
    #[error("no usable candle data: {0}")]
    DataUnavailable(String),

    /// NaN or division-by-zero surfaced outside an indicator's own guard.
    #[error("invalid numeric value in {0}")]
    InvalidNumeric(String),

    /// The instrument key is not in the configured universe.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// The data-fetch capability raised; no retry is attempted here.
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] anyhow::Error),
}

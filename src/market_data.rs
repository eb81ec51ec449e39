//! Candle series and the upstream market data capability
//!
//! The live broker connection is an external collaborator; this module only
//! defines the fetch contract plus a file-backed replay source used by the
//! binary and the integration tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

/// One OHLCV bar in exchange-local time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// (high + low + close) / 3, the VWAP input.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn trading_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Time-ascending candles for one instrument. Gaps are tolerated, duplicates
/// and interpolation are not.
pub type Series = Vec<Candle>;

/// Upstream OHLCV retrieval. Implementations may block on network I/O and may
/// fail; retry policy belongs to the implementation, not to the scanner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 15-minute candles for `symbol` covering `[from, to]` calendar days.
    async fn fetch_intraday(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Series>;

    /// Last `n_days` completed daily candles, current day excluded, ascending.
    async fn fetch_daily(&self, symbol: &str, n_days: usize) -> Result<Series>;

    /// Intraday candles strictly after `after`, same trading day.
    async fn fetch_after(&self, symbol: &str, after: DateTime<FixedOffset>) -> Result<Series>;
}

/// Candle store for offline runs, keyed by the fetch symbol.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReplayData {
    #[serde(default)]
    pub intraday: HashMap<String, Series>,
    #[serde(default)]
    pub daily: HashMap<String, Series>,
}

/// Serves recorded candles from a JSON file. The recorder is expected to have
/// already excluded the current day from the daily series.
pub struct ReplayProvider {
    data: ReplayData,
}

impl ReplayProvider {
    pub fn new(data: ReplayData) -> Self {
        Self { data }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading replay data from {path}"))?;
        let data: ReplayData =
            serde_json::from_str(&raw).with_context(|| format!("parsing replay data {path}"))?;
        Ok(Self::new(data))
    }

    fn series<'a>(map: &'a HashMap<String, Series>, symbol: &str) -> Result<&'a Series> {
        map.get(symbol)
            .ok_or_else(|| anyhow::anyhow!("no recorded candles for {symbol}"))
    }
}

#[async_trait]
impl MarketDataProvider for ReplayProvider {
    async fn fetch_intraday(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Series> {
        let series = Self::series(&self.data.intraday, symbol)?;
        Ok(series
            .iter()
            .filter(|c| c.trading_day() >= from && c.trading_day() <= to)
            .copied()
            .collect())
    }

    async fn fetch_daily(&self, symbol: &str, n_days: usize) -> Result<Series> {
        let series = Self::series(&self.data.daily, symbol)?;
        let start = series.len().saturating_sub(n_days);
        Ok(series[start..].to_vec())
    }

    async fn fetch_after(&self, symbol: &str, after: DateTime<FixedOffset>) -> Result<Series> {
        let series = Self::series(&self.data.intraday, symbol)?;
        Ok(series
            .iter()
            .filter(|c| c.trading_day() == after.date_naive() && c.timestamp > after)
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    pub fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn candle(y: i32, m: u32, d: u32, h: u32, min: u32, close: f64) -> Candle {
        Candle {
            timestamp: ist().with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
            open: close - 5.0,
            high: close + 10.0,
            low: close - 10.0,
            close,
            volume: 1000.0,
        }
    }

    #[tokio::test]
    async fn replay_filters_by_day_and_timestamp() {
        let mut data = ReplayData::default();
        data.intraday.insert(
            "NIFTY".to_string(),
            vec![
                candle(2026, 3, 9, 15, 0, 22400.0),
                candle(2026, 3, 10, 9, 15, 22450.0),
                candle(2026, 3, 10, 9, 30, 22480.0),
                candle(2026, 3, 10, 9, 45, 22510.0),
            ],
        );
        let provider = ReplayProvider::new(data);

        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let intraday = provider.fetch_intraday("NIFTY", day, day).await.unwrap();
        assert_eq!(intraday.len(), 3);

        let after = ist().with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();
        let tail = provider.fetch_after("NIFTY", after).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].close, 22510.0);
    }

    #[tokio::test]
    async fn replay_daily_returns_last_n() {
        let mut data = ReplayData::default();
        data.daily.insert(
            "NIFTY".to_string(),
            (0..7).map(|i| candle(2026, 3, 2 + i, 15, 30, 22000.0 + i as f64)).collect(),
        );
        let provider = ReplayProvider::new(data);

        let daily = provider.fetch_daily("NIFTY", 5).await.unwrap();
        assert_eq!(daily.len(), 5);
        assert_eq!(daily.last().unwrap().close, 22006.0);
    }

    #[tokio::test]
    async fn replay_unknown_symbol_is_an_error() {
        let provider = ReplayProvider::new(ReplayData::default());
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(provider.fetch_intraday("GOLD", day, day).await.is_err());
    }

    #[test]
    fn candle_shape_helpers() {
        let c = candle(2026, 3, 10, 9, 15, 22500.0);
        assert!(c.is_bullish());
        assert_eq!(c.body(), 5.0);
        assert_eq!(c.range(), 20.0);
        let tp = (22510.0 + 22490.0 + 22500.0) / 3.0;
        assert!((c.typical_price() - tp).abs() < 1e-9);
    }
}

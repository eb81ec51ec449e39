use anyhow::Result;
use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    /// Exchange-local offset from UTC in minutes (IST = +330).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Completed daily candles fetched for pivot levels.
    #[serde(default = "default_daily_lookback")]
    pub daily_lookback: usize,
    /// Calendar days of intraday candles fetched per scan; the slow EMA needs
    /// more than one session of 15-minute bars to settle.
    #[serde(default = "default_intraday_days")]
    pub intraday_days: usize,
    /// Fixed trading day for offline replays; live scans use the current
    /// exchange-local date.
    #[serde(default)]
    pub scan_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Universe key, e.g. "NIFTY".
    pub name: String,
    /// Tradable futures symbol, e.g. "NSE:NIFTY26MARFUT".
    pub symbol: String,
    pub exchange: String,
    pub lot_size: u32,
    /// Option strike spacing in index points.
    pub strike_interval: u32,
    /// Expiry fragment embedded in option symbols, e.g. "26MAR".
    pub expiry_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(with = "hhmm", default = "default_signal_start")]
    pub signal_start: NaiveTime,
    #[serde(with = "hhmm", default = "default_signal_end")]
    pub signal_end: NaiveTime,
    #[serde(with = "hhmm", default = "default_dead_zone_start")]
    pub dead_zone_start: NaiveTime,
    #[serde(with = "hhmm", default = "default_dead_zone_end")]
    pub dead_zone_end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_min_models_agree")]
    pub min_models_agree: usize,
    #[serde(default = "default_all_agree_bonus")]
    pub all_agree_bonus: u32,
    /// Composite score floor inside the dead zone.
    #[serde(default = "default_dead_zone_min_score")]
    pub dead_zone_min_score: u32,
    #[serde(default = "default_high_grade_score")]
    pub high_grade_score: u32,
    #[serde(default = "default_high_grade_agreement")]
    pub high_grade_agreement: usize,
    #[serde(default = "default_medium_grade_score")]
    pub medium_grade_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Default stop distance as a fraction of entry (0.004 = 0.4%).
    #[serde(default = "default_sl_pct")]
    pub sl_pct: f64,
    #[serde(default = "default_target_rr_min")]
    pub target_rr_min: f64,
    #[serde(default = "default_target_rr_ideal")]
    pub target_rr_ideal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,
    #[serde(default = "default_ema_medium")]
    pub ema_medium: usize,
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    #[serde(default = "default_avg_volume_period")]
    pub avg_volume_period: usize,
    /// ORB volume confirmation multiple over rolling average volume.
    #[serde(default = "default_orb_volume_mult")]
    pub orb_volume_mult: f64,
}

fn default_utc_offset_minutes() -> i32 {
    330
}
fn default_daily_lookback() -> usize {
    5
}
fn default_intraday_days() -> usize {
    5
}

fn default_signal_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}
fn default_signal_end() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap()
}
fn default_dead_zone_start() -> NaiveTime {
    NaiveTime::from_hms_opt(11, 30, 0).unwrap()
}
fn default_dead_zone_end() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

fn default_min_models_agree() -> usize {
    3
}
fn default_all_agree_bonus() -> u32 {
    3
}
fn default_dead_zone_min_score() -> u32 {
    20
}
fn default_high_grade_score() -> u32 {
    20
}
fn default_high_grade_agreement() -> usize {
    4
}
fn default_medium_grade_score() -> u32 {
    16
}

fn default_sl_pct() -> f64 {
    0.004
}
fn default_target_rr_min() -> f64 {
    1.5
}
fn default_target_rr_ideal() -> f64 {
    2.0
}

fn default_ema_fast() -> usize {
    9
}
fn default_ema_medium() -> usize {
    21
}
fn default_ema_slow() -> usize {
    50
}
fn default_rsi_period() -> usize {
    14
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_atr_period() -> usize {
    14
}
fn default_avg_volume_period() -> usize {
    20
}
fn default_orb_volume_mult() -> f64 {
    1.5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signal_start: default_signal_start(),
            signal_end: default_signal_end(),
            dead_zone_start: default_dead_zone_start(),
            dead_zone_end: default_dead_zone_end(),
        }
    }
}

impl SessionConfig {
    pub fn in_signal_window(&self, t: NaiveTime) -> bool {
        self.signal_start <= t && t <= self.signal_end
    }

    pub fn in_dead_zone(&self, t: NaiveTime) -> bool {
        self.dead_zone_start <= t && t <= self.dead_zone_end
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_models_agree: default_min_models_agree(),
            all_agree_bonus: default_all_agree_bonus(),
            dead_zone_min_score: default_dead_zone_min_score(),
            high_grade_score: default_high_grade_score(),
            high_grade_agreement: default_high_grade_agreement(),
            medium_grade_score: default_medium_grade_score(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sl_pct: default_sl_pct(),
            target_rr_min: default_target_rr_min(),
            target_rr_ideal: default_target_rr_ideal(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: default_ema_fast(),
            ema_medium: default_ema_medium(),
            ema_slow: default_ema_slow(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            atr_period: default_atr_period(),
            avg_volume_period: default_avg_volume_period(),
            orb_volume_mult: default_orb_volume_mult(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            instruments: vec![
                InstrumentConfig {
                    name: "NIFTY".to_string(),
                    symbol: "NSE:NIFTY26MARFUT".to_string(),
                    exchange: "NSE".to_string(),
                    lot_size: 25,
                    strike_interval: 50,
                    expiry_code: "26MAR".to_string(),
                },
                InstrumentConfig {
                    name: "BANKNIFTY".to_string(),
                    symbol: "NSE:BANKNIFTY26MARFUT".to_string(),
                    exchange: "NSE".to_string(),
                    lot_size: 15,
                    strike_interval: 100,
                    expiry_code: "26MAR".to_string(),
                },
            ],
            session: SessionConfig::default(),
            consensus: ConsensusConfig::default(),
            risk: RiskConfig::default(),
            indicators: IndicatorConfig::default(),
            utc_offset_minutes: default_utc_offset_minutes(),
            daily_lookback: default_daily_lookback(),
            intraday_days: default_intraday_days(),
            scan_date: None,
        }
    }
}

impl ScannerConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_file("config.json")
    }

    /// Load from a JSON file, falling back to defaults when the file is absent.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str =
            fs::read_to_string(path).unwrap_or_else(|_| Self::default_config_json());
        let config: ScannerConfig = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    fn default_config_json() -> String {
        serde_json::to_string_pretty(&Self::default()).unwrap()
    }

    pub fn exchange_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    pub fn instrument(&self, name: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.name == name)
    }
}

/// "HH:MM" (de)serialization for session boundaries.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scanner_tuning() {
        let config = ScannerConfig::default();
        assert_eq!(config.consensus.min_models_agree, 3);
        assert_eq!(config.consensus.high_grade_score, 20);
        assert_eq!(config.consensus.medium_grade_score, 16);
        assert_eq!(config.risk.sl_pct, 0.004);
        assert_eq!(config.indicators.ema_slow, 50);
        assert_eq!(config.instrument("NIFTY").unwrap().strike_interval, 50);
        assert!(config.instrument("GOLD").is_none());
    }

    #[test]
    fn session_times_round_trip_as_hhmm() {
        let config = ScannerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"signal_start\":\"09:30\""));
        let back: ScannerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session.dead_zone_end, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let json = r#"{
            "instruments": [{
                "name": "NIFTY",
                "symbol": "NSE:NIFTY26MARFUT",
                "exchange": "NSE",
                "lot_size": 25,
                "strike_interval": 50,
                "expiry_code": "26MAR"
            }],
            "consensus": { "min_models_agree": 4 }
        }"#;
        let config: ScannerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.consensus.min_models_agree, 4);
        assert_eq!(config.consensus.all_agree_bonus, 3);
        assert_eq!(config.utc_offset_minutes, 330);
    }
}

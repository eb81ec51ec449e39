use anyhow::Result;
use index_scanner::config::ScannerConfig;
use index_scanner::market_data::ReplayProvider;
use index_scanner::scanner::Scanner;
use log::{info, warn};
use std::env;
use std::sync::Arc;
use tokio::time::{Duration, sleep};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with default info level if RUST_LOG not set
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();
    info!("Starting index signal scanner");

    let args: Vec<String> = env::args().collect();
    let config_file = args.get(1).map(String::as_str).unwrap_or("config.json");
    let replay_file = args.get(2).map(String::as_str).unwrap_or("replay.json");

    info!("Loading configuration from: {}", config_file);
    let config = ScannerConfig::load_from_file(config_file)?;

    info!("Loading recorded candles from: {}", replay_file);
    let provider = Arc::new(ReplayProvider::from_file(replay_file)?);

    let scanner = Scanner::new(config, provider);
    scanner.trigger_scan().await;

    let state = loop {
        let state = scanner.results().await;
        if !state.running {
            break state;
        }
        info!("{} ({}%)", state.message, state.progress);
        sleep(Duration::from_millis(200)).await;
    };

    info!("{}", state.message);
    if let Some(err) = &state.last_error {
        warn!("Last error during scan: {}", err);
    }

    for report in &state.report {
        info!("{}: {}", report.instrument, serde_json::to_string(&report.outcome)?);
    }

    for signal in &state.signals {
        println!("{}", serde_json::to_string_pretty(signal)?);

        // Replay the rest of the recorded day to see how the signal fared.
        let (outcome, candles_seen) = scanner
            .signal_outcome(
                &signal.instrument,
                signal.direction,
                signal.risk.entry,
                signal.risk.stop_loss,
                signal.risk.target_1,
                signal.signal_time,
            )
            .await?;
        info!(
            "{}: outcome over {} later candle(s): {}",
            signal.instrument,
            candles_seen,
            serde_json::to_string(&outcome)?
        );
    }

    Ok(())
}

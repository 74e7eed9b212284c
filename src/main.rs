//! # Current Node
//!
//! Samples an analog current sensor and ships RMS current readings to a
//! time-series store.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, or `config/default.toml`)
//!    - Set up logging with tracing subscriber
//!    - Open the telemetry sink, associate the link and sync time
//!
//! 2. **Main Loop**
//!    - Poll the node every `poll_interval_ms`; it samples and delivers
//!      only when a tick is due
//!    - Log delivery stats every 100 measurements
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Flush pending points
//!    - Log final stats
//!
//! On host builds the analog input is a simulated sine wave and the sink
//! appends JSON lines to a local file.

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use current_node::config::{Config, LoggingConfig};
use current_node::node::Node;
use current_node::sampler::{RmsEstimator, SineSource};
use current_node::scheduler::SystemClock;
use current_node::telemetry::{Batcher, JsonlSink};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of measurements between status log messages
const LOG_INTERVAL_MEASUREMENTS: u64 = 100;

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "current-node.log";

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must live
/// until exit so buffered file logs are written out.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("Current Node v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "ADC: {} bits, {} dB attenuation, {} V reference",
        config.adc.resolution_bits, config.adc.attenuation_db, config.adc.supply_voltage
    );

    let source = SineSource::new(
        config.simulation.amplitude_counts,
        config.simulation.offset_counts,
        config.simulation.samples_per_cycle,
        config.adc.resolution_bits,
    );
    let estimator = RmsEstimator::with_initial_bias(
        source,
        config.calibration(),
        config.sampler.smoothing,
        config.initial_bias(),
    );

    let sink = JsonlSink::open(&config.sink.output_dir, &config.sink.bucket)
        .context("Failed to open telemetry sink")?;
    let batcher = Batcher::new(sink, config.tag_set(), config.batcher_settings());

    let mut node = Node::new(
        estimator,
        batcher,
        SystemClock,
        config.scheduler.tick_interval_ms,
        config.sampler.samples_per_estimate,
    )?;
    node.start();

    let mut poll_interval = interval(Duration::from_millis(config.scheduler.poll_interval_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Measuring every {} ms, {} samples per estimate",
        config.scheduler.tick_interval_ms, config.sampler.samples_per_estimate
    );
    info!("Press Ctrl+C to exit");

    let mut measurement_count: u64 = 0;

    // Main loop; the only yield point is between polls
    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                if let Some(measurement) = node.poll()? {
                    measurement_count += 1;

                    if measurement_count % LOG_INTERVAL_MEASUREMENTS == 0 {
                        let stats = node.batcher().stats();
                        info!(
                            "{} measurements, last {:.1} mA, {} points written, {} pending, {} dropped",
                            measurement_count,
                            measurement.value * 1000.0,
                            stats.points_written,
                            node.batcher().pending_len(),
                            stats.evicted
                        );
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    node.shutdown();
    let stats = node.batcher().stats();
    info!(
        "Total measurements: {}, points written: {}, dropped: {}",
        measurement_count, stats.points_written, stats.evicted
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_interval_constant() {
        assert_eq!(LOG_INTERVAL_MEASUREMENTS, 100);

        // At the default 500 ms tick, 100 measurements = 50 seconds
        let seconds = LOG_INTERVAL_MEASUREMENTS as f64 * 0.5;
        assert_eq!(seconds, 50.0);
    }

    #[test]
    fn test_default_config_path_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/", "config/default.toml");
        assert!(path.ends_with(DEFAULT_CONFIG_PATH));
        assert!(Config::load(path).is_ok());
    }
}

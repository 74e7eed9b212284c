//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{NodeError, Result};
use crate::sampler::Calibration;
use crate::telemetry::{BatcherSettings, TagSet, WritePrecision};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub adc: AdcConfig,
    pub sampler: SamplerConfig,
    pub scheduler: SchedulerConfig,
    pub batch: BatchConfig,
    pub sync: SyncConfig,
    pub tags: TagConfig,
    pub sink: SinkConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

/// ADC front end configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AdcConfig {
    #[serde(default = "default_resolution_bits")]
    pub resolution_bits: u8,

    #[serde(default = "default_attenuation_db")]
    pub attenuation_db: f32,

    #[serde(default = "default_supply_voltage")]
    pub supply_voltage: f64,
}

/// RMS estimator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplerConfig {
    #[serde(default = "default_calibration")]
    pub calibration: f64,

    #[serde(default = "default_smoothing")]
    pub smoothing: f64,

    #[serde(default = "default_samples_per_estimate")]
    pub samples_per_estimate: usize,

    #[serde(default = "default_mains_voltage")]
    pub mains_voltage: f64,

    /// Starting bias in ADC counts; mid-scale when absent
    #[serde(default)]
    pub initial_bias: Option<f64>,
}

/// Measurement loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Outbound batching configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_buffer_multiplier")]
    pub buffer_multiplier: usize,

    #[serde(default = "default_precision")]
    pub precision: WritePrecision,
}

/// Time resynchronization configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_sync_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_primary_server")]
    pub primary_server: String,

    #[serde(default = "default_secondary_server")]
    pub secondary_server: String,
}

/// Fixed tags attached to every point
#[derive(Debug, Deserialize, Clone)]
pub struct TagConfig {
    #[serde(default = "default_measurement")]
    pub measurement: String,

    #[serde(default = "default_device_id")]
    pub device_id: String,

    #[serde(default = "default_sensor_model")]
    pub sensor_model: String,

    #[serde(default)]
    pub instrumented_device: String,
}

/// File sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Simulated current transformer used on host builds
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_amplitude_counts")]
    pub amplitude_counts: f64,

    #[serde(default = "default_offset_counts")]
    pub offset_counts: f64,

    #[serde(default = "default_samples_per_cycle")]
    pub samples_per_cycle: f64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; stdout only when absent
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_resolution_bits() -> u8 { 10 }
fn default_attenuation_db() -> f32 { 11.0 }
fn default_supply_voltage() -> f64 { 3.3 }

fn default_calibration() -> f64 { 30.0 }
fn default_smoothing() -> f64 { 1024.0 }
fn default_samples_per_estimate() -> usize { 1480 }
fn default_mains_voltage() -> f64 { 239.0 }

fn default_tick_interval_ms() -> u64 { 500 }
fn default_poll_interval_ms() -> u64 { 10 }

fn default_batch_size() -> usize { 10 }
fn default_buffer_multiplier() -> usize { 3 }
fn default_precision() -> WritePrecision { WritePrecision::Milliseconds }

fn default_sync_interval_ms() -> u64 { 3_600_000 }
fn default_timezone() -> String { "UTC0".to_string() }
fn default_primary_server() -> String { "pool.ntp.org".to_string() }
fn default_secondary_server() -> String { "time.nis.gov".to_string() }

fn default_measurement() -> String { "energy".to_string() }
fn default_device_id() -> String { "current-node".to_string() }
fn default_sensor_model() -> String { "SCT-013-030".to_string() }

fn default_output_dir() -> String { "./telemetry".to_string() }
fn default_bucket() -> String { "energy".to_string() }

fn default_amplitude_counts() -> f64 { 200.0 }
fn default_offset_counts() -> f64 { 512.0 }
fn default_samples_per_cycle() -> f64 { 40.0 }

fn default_log_level() -> String { "info".to_string() }

/// Supported ADC input attenuations in dB
const ATTENUATIONS_DB: [f32; 4] = [0.0, 2.5, 6.0, 11.0];

/// Accepted log levels
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(msg: impl std::fmt::Display) -> NodeError {
    NodeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use current_node::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // ADC
        if self.adc.resolution_bits == 0 || self.adc.resolution_bits > 16 {
            return Err(invalid("resolution_bits must be between 1 and 16"));
        }

        if !ATTENUATIONS_DB.contains(&self.adc.attenuation_db) {
            return Err(invalid("attenuation_db must be one of: 0, 2.5, 6, 11"));
        }

        if !(self.adc.supply_voltage > 0.0 && self.adc.supply_voltage <= 5.0) {
            return Err(invalid("supply_voltage must be greater than 0 and at most 5.0"));
        }

        // Sampler
        if !(self.sampler.calibration > 0.0) {
            return Err(invalid("calibration must be greater than 0"));
        }

        if !(self.sampler.smoothing >= 1.0) {
            return Err(invalid("smoothing must be at least 1"));
        }

        if self.sampler.samples_per_estimate == 0 || self.sampler.samples_per_estimate > 100_000 {
            return Err(invalid("samples_per_estimate must be between 1 and 100000"));
        }

        if !(self.sampler.mains_voltage > 0.0) {
            return Err(invalid("mains_voltage must be greater than 0"));
        }

        if let Some(bias) = self.sampler.initial_bias {
            let max = ((1u32 << self.adc.resolution_bits) - 1) as f64;
            if !(0.0..=max).contains(&bias) {
                return Err(invalid(format!("initial_bias must be between 0 and {}", max)));
            }
        }

        // Scheduler
        if self.scheduler.tick_interval_ms == 0 || self.scheduler.tick_interval_ms > 3_600_000 {
            return Err(invalid("tick_interval_ms must be between 1 and 3600000"));
        }

        if self.scheduler.poll_interval_ms == 0
            || self.scheduler.poll_interval_ms > self.scheduler.tick_interval_ms {
            return Err(invalid("poll_interval_ms must be between 1 and tick_interval_ms"));
        }

        // Batching
        if self.batch.batch_size == 0 || self.batch.batch_size > 1000 {
            return Err(invalid("batch_size must be between 1 and 1000"));
        }

        if self.batch.buffer_multiplier == 0 || self.batch.buffer_multiplier > 100 {
            return Err(invalid("buffer_multiplier must be between 1 and 100"));
        }

        // Consecutive ticks must not collapse onto the same stored timestamp
        if self.batch.precision == WritePrecision::Seconds && self.scheduler.tick_interval_ms < 1000 {
            return Err(invalid("precision \"s\" requires tick_interval_ms of at least 1000"));
        }

        // Time sync
        if self.sync.interval_ms < self.scheduler.tick_interval_ms {
            return Err(invalid("sync interval_ms must be at least tick_interval_ms"));
        }

        if self.sync.timezone.is_empty() {
            return Err(invalid("timezone cannot be empty"));
        }

        if self.sync.primary_server.is_empty() {
            return Err(invalid("primary_server cannot be empty"));
        }

        // Tags
        if self.tags.measurement.is_empty() {
            return Err(invalid("measurement cannot be empty"));
        }

        if self.tags.device_id.is_empty() {
            return Err(invalid("device_id cannot be empty"));
        }

        // Sink
        if self.sink.output_dir.is_empty() {
            return Err(invalid("sink output_dir cannot be empty"));
        }

        if self.sink.bucket.is_empty() {
            return Err(invalid("sink bucket cannot be empty"));
        }

        // Simulation
        if !(self.simulation.samples_per_cycle >= 2.0) {
            return Err(invalid("samples_per_cycle must be at least 2"));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }

    /// Counts-to-amperes calibration inputs
    pub fn calibration(&self) -> Calibration {
        Calibration {
            factor: self.sampler.calibration,
            supply_voltage: self.adc.supply_voltage,
            resolution_bits: self.adc.resolution_bits,
        }
    }

    /// Starting bias for the estimator, mid-scale unless overridden
    pub fn initial_bias(&self) -> f64 {
        self.sampler
            .initial_bias
            .unwrap_or_else(|| self.calibration().mid_scale())
    }

    /// Resync interval expressed in scheduler ticks
    pub fn resync_interval_ticks(&self) -> u64 {
        (self.sync.interval_ms / self.scheduler.tick_interval_ms).max(1)
    }

    /// Batcher parameters derived from the batch, sync and sampler sections
    pub fn batcher_settings(&self) -> BatcherSettings {
        BatcherSettings {
            batch_size: self.batch.batch_size,
            buffer_multiplier: self.batch.buffer_multiplier,
            precision: self.batch.precision,
            resync_interval_ticks: self.resync_interval_ticks(),
            timezone: self.sync.timezone.clone(),
            primary_server: self.sync.primary_server.clone(),
            secondary_server: self.sync.secondary_server.clone(),
            mains_voltage: self.sampler.mains_voltage,
        }
    }

    /// Fixed tag set; the crate version is attached as `version`
    pub fn tag_set(&self) -> TagSet {
        TagSet::new(self.tags.measurement.as_str())
            .with_tag("device", self.tags.device_id.as_str())
            .with_tag("sensor", self.tags.sensor_model.as_str())
            .with_tag("instrumented_device", self.tags.instrumented_device.as_str())
            .with_tag("version", env!("CARGO_PKG_VERSION"))
    }
}

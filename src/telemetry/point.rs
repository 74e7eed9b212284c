//! # Telemetry Data Types
//!
//! Measurements produced by the sampler and the tagged points shipped to the sink.

use serde::Serialize;
use std::collections::BTreeMap;

/// Field name carrying the RMS current in amperes.
pub const FIELD_CURRENT: &str = "current";

/// Field name carrying the apparent power in volt-amperes.
pub const FIELD_POWER: &str = "power";

/// One RMS current reading, stamped when it left the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// RMS current in amperes.
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Measurement {
    #[must_use]
    pub fn new(value: f64, timestamp_ms: u64) -> Self {
        Self { value, timestamp_ms }
    }
}

/// Fixed tags attached to every point, established once at startup.
///
/// # Examples
///
/// ```
/// use current_node::telemetry::TagSet;
///
/// let tags = TagSet::new("energy")
///     .with_tag("device", "node-01")
///     .with_tag("sensor", "SCT-013-030");
/// assert_eq!(tags.tags().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    measurement: String,
    tags: BTreeMap<String, String>,
}

impl TagSet {
    /// Creates an empty tag set for the given measurement name.
    #[must_use]
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Adds a tag. Empty values are skipped, the store rejects empty tag values.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.tags.insert(key.into(), value);
        }
        self
    }

    #[must_use]
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// A measurement decorated with the tag set, as handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp_ms: u64,
}

impl Point {
    /// Builds the point for `measurement` with current and apparent power fields.
    ///
    /// # Arguments
    ///
    /// * `tags` - Fixed tag set
    /// * `measurement` - Sampler output
    /// * `mains_voltage` - Nominal line voltage used for the power field
    #[must_use]
    pub fn from_measurement(tags: &TagSet, measurement: Measurement, mains_voltage: f64) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_CURRENT.to_string(), measurement.value);
        fields.insert(FIELD_POWER.to_string(), measurement.value * mains_voltage);

        Self {
            measurement: tags.measurement.clone(),
            tags: tags.tags.clone(),
            fields,
            timestamp_ms: measurement.timestamp_ms,
        }
    }

    /// Current field value, if present.
    #[must_use]
    pub fn current(&self) -> Option<f64> {
        self.fields.get(FIELD_CURRENT).copied()
    }
}

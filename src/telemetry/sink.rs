//! Trait abstraction for the remote time-series store and its link

use serde::Deserialize;

use super::point::Point;
use crate::error::Result;

/// Timestamp precision the store expects on written points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum WritePrecision {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "ms")]
    Milliseconds,
}

impl WritePrecision {
    /// Converts a millisecond timestamp to this precision.
    ///
    /// # Examples
    ///
    /// ```
    /// use current_node::telemetry::WritePrecision;
    ///
    /// assert_eq!(WritePrecision::Seconds.convert(1_999), 1);
    /// assert_eq!(WritePrecision::Milliseconds.convert(1_999), 1_999);
    /// ```
    #[must_use]
    pub fn convert(self, timestamp_ms: u64) -> u64 {
        match self {
            WritePrecision::Seconds => timestamp_ms / 1000,
            WritePrecision::Milliseconds => timestamp_ms,
        }
    }
}

/// Batching parameters handed to the sink once at startup.
///
/// `buffer_size` matches the outbound buffer bound so a sink with its own
/// internal queue never holds more than the node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub batch_size: usize,
    pub buffer_size: usize,
    pub precision: WritePrecision,
}

/// Remote store, time source and link, as driven by the batcher.
///
/// Every operation is fail-soft from the caller's point of view: the batcher
/// turns errors into "keep buffering and retry later".
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink {
    /// Applies batching parameters.
    fn configure(&mut self, options: WriteOptions);

    /// Writes one ordered batch. Either the whole batch is accepted or none of it.
    fn write_batch(&mut self, points: &[Point]) -> Result<()>;

    /// Synchronizes the node's wall clock.
    fn sync_time(&mut self, timezone: &str, primary_server: &str, secondary_server: &str) -> Result<()>;

    /// Whether the link is currently associated.
    fn is_connected(&self) -> bool;

    /// Attempts to re-associate the link.
    fn reconnect(&mut self) -> Result<()>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn configure(&mut self, options: WriteOptions) {
        (**self).configure(options)
    }

    fn write_batch(&mut self, points: &[Point]) -> Result<()> {
        (**self).write_batch(points)
    }

    fn sync_time(&mut self, timezone: &str, primary_server: &str, secondary_server: &str) -> Result<()> {
        (**self).sync_time(timezone, primary_server, secondary_server)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reconnect(&mut self) -> Result<()> {
        (**self).reconnect()
    }
}

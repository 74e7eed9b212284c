//! # Telemetry Batcher
//!
//! Buffers tagged measurements and ships them to the sink in batches.
//!
//! ## Delivery Rules
//!
//! - Every observed measurement is appended to the outbound buffer, whatever
//!   the link state.
//! - Once the buffer holds at least `batch_size` points, the oldest
//!   `batch_size` are written as one batch. They are removed only when the
//!   sink accepts the write; a failed write leaves the buffer unchanged and is
//!   retried on a later tick.
//! - The buffer holds `batch_size * buffer_multiplier` points. Past that the
//!   oldest point is evicted and counted.
//!
//! ## Housekeeping
//!
//! The link is checked every tick and re-associated when down. The time source
//! is resynchronized every `resync_interval_ticks`; a failed sync keeps the
//! last time source and waits for the next interval.
//!
//! ## Link State
//!
//! ```text
//! Disconnected --(reconnect ok)--> Connected --(link lost)--> Disconnected
//! ```
//!
//! The batcher starts `Disconnected` and has no terminal state.

use tracing::{debug, info, warn};

use super::buffer::OutboundBuffer;
use super::point::{Measurement, Point, TagSet};
use super::sink::{TelemetrySink, WriteOptions, WritePrecision};

/// Link association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// Connectivity as last observed by the batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub link: LinkState,
    /// Outcome of the most recent time sync attempt.
    pub time_synced: bool,
    /// Tick of the most recent time sync attempt.
    pub last_sync_tick: u64,
}

/// Delivery counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    pub observed: u64,
    pub batches_written: u64,
    pub points_written: u64,
    pub failed_writes: u64,
    pub evicted: u64,
    pub resyncs_ok: u64,
    pub resyncs_failed: u64,
    pub reconnects: u64,
}

/// Batching, resync and time source parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BatcherSettings {
    pub batch_size: usize,
    pub buffer_multiplier: usize,
    pub precision: WritePrecision,
    pub resync_interval_ticks: u64,
    pub timezone: String,
    pub primary_server: String,
    pub secondary_server: String,
    /// Nominal line voltage for the apparent power field.
    pub mains_voltage: f64,
}

impl BatcherSettings {
    /// Outbound buffer bound, `batch_size * buffer_multiplier`.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.batch_size.max(1) * self.buffer_multiplier.max(1)
    }
}

impl Default for BatcherSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            buffer_multiplier: 3,
            precision: WritePrecision::Milliseconds,
            resync_interval_ticks: 7200,
            timezone: "UTC0".to_string(),
            primary_server: "pool.ntp.org".to_string(),
            secondary_server: "time.nis.gov".to_string(),
            mains_voltage: 239.0,
        }
    }
}

/// Buffers measurements and drives a [`TelemetrySink`].
#[derive(Debug)]
pub struct Batcher<S> {
    sink: S,
    tags: TagSet,
    buffer: OutboundBuffer,
    batch_size: usize,
    settings: BatcherSettings,
    state: ConnectivityState,
    tick: u64,
    stats: BatcherStats,
}

impl<S: TelemetrySink> Batcher<S> {
    /// Creates a batcher and hands the write options to the sink.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use current_node::telemetry::{Batcher, BatcherSettings, JsonlSink, TagSet};
    ///
    /// let sink = JsonlSink::open("./telemetry", "energy")?;
    /// let tags = TagSet::new("energy").with_tag("device", "node-01");
    /// let batcher = Batcher::new(sink, tags, BatcherSettings::default());
    /// assert_eq!(batcher.capacity(), 30);
    /// # Ok::<(), current_node::error::NodeError>(())
    /// ```
    pub fn new(mut sink: S, tags: TagSet, settings: BatcherSettings) -> Self {
        let batch_size = settings.batch_size.max(1);
        let capacity = settings.capacity();

        sink.configure(WriteOptions {
            batch_size,
            buffer_size: capacity,
            precision: settings.precision,
        });

        Self {
            sink,
            tags,
            buffer: OutboundBuffer::new(capacity),
            batch_size,
            settings,
            state: ConnectivityState {
                link: LinkState::Disconnected,
                time_synced: false,
                last_sync_tick: 0,
            },
            tick: 0,
            stats: BatcherStats::default(),
        }
    }

    /// Buffers one measurement and writes a batch if one is ready.
    ///
    /// Never fails: sink errors leave the points buffered for a later tick.
    pub fn observe(&mut self, measurement: Measurement) {
        let point = Point::from_measurement(&self.tags, measurement, self.settings.mains_voltage);
        self.stats.observed += 1;

        if let Some(dropped) = self.buffer.push(point) {
            warn!(
                "Outbound buffer full ({} points), dropped point at {} ms ({} dropped total)",
                self.buffer.capacity(),
                dropped.timestamp_ms,
                self.buffer.evicted()
            );
        }

        if self.buffer.len() >= self.batch_size {
            self.try_flush();
        }
    }

    /// Writes the oldest `batch_size` points. Returns whether the sink accepted them.
    fn try_flush(&mut self) -> bool {
        let batch = self.buffer.oldest(self.batch_size);
        let count = batch.len();

        match self.sink.write_batch(batch) {
            Ok(()) => {
                self.buffer.remove_oldest(count);
                self.stats.batches_written += 1;
                self.stats.points_written += count as u64;
                debug!("Flushed batch of {} points, {} pending", count, self.buffer.len());
                true
            }
            Err(e) => {
                self.stats.failed_writes += 1;
                debug!("Batch write failed, keeping {} points buffered: {}", self.buffer.len(), e);
                false
            }
        }
    }

    /// Writes every pending point in `batch_size` chunks until the buffer is
    /// empty or a write fails. Returns the number of points written.
    pub fn flush_pending(&mut self) -> usize {
        let mut written = 0;
        while !self.buffer.is_empty() {
            let before = self.buffer.len();
            if !self.try_flush() {
                warn!("Flush stopped with {} points still pending", self.buffer.len());
                break;
            }
            written += before - self.buffer.len();
        }
        written
    }

    /// Checks the link and attempts to re-associate it when down.
    pub fn maintain_link(&mut self) -> LinkState {
        if self.sink.is_connected() {
            if self.state.link == LinkState::Disconnected {
                info!("Link connected");
            }
            self.state.link = LinkState::Connected;
            return self.state.link;
        }

        if self.state.link == LinkState::Connected {
            warn!("Link lost, {} points buffered", self.buffer.len());
        }
        self.state.link = LinkState::Disconnected;

        match self.sink.reconnect() {
            Ok(()) => {
                self.stats.reconnects += 1;
                self.state.link = LinkState::Connected;
                info!("Link re-established");
            }
            Err(e) => debug!("Reconnect attempt failed: {}", e),
        }
        self.state.link
    }

    /// Synchronizes the time source immediately. Returns whether it succeeded.
    pub fn sync_time_now(&mut self) -> bool {
        self.state.last_sync_tick = self.tick;

        let result = self.sink.sync_time(
            &self.settings.timezone,
            &self.settings.primary_server,
            &self.settings.secondary_server,
        );

        match result {
            Ok(()) => {
                self.stats.resyncs_ok += 1;
                self.state.time_synced = true;
                info!("Time synchronized ({})", self.settings.timezone);
                true
            }
            Err(e) => {
                self.stats.resyncs_failed += 1;
                self.state.time_synced = false;
                warn!("Time sync failed, keeping last time source: {}", e);
                false
            }
        }
    }

    /// Advances the tick counter and resynchronizes time when the interval elapsed.
    pub fn housekeeping(&mut self) {
        self.tick += 1;
        let interval = self.settings.resync_interval_ticks.max(1);
        if self.tick - self.state.last_sync_tick >= interval {
            self.sync_time_now();
        }
    }

    /// Pending points in send order.
    pub fn pending(&self) -> impl Iterator<Item = &Point> {
        self.buffer.iter()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    #[must_use]
    pub fn connectivity(&self) -> ConnectivityState {
        self.state
    }

    /// Delivery counters; `evicted` is read from the outbound buffer.
    #[must_use]
    pub fn stats(&self) -> BatcherStats {
        BatcherStats {
            evicted: self.buffer.evicted(),
            ..self.stats
        }
    }

    /// Ticks counted by [`Batcher::housekeeping`].
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.tick
    }
}

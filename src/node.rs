//! # Node
//!
//! One measurement-and-delivery loop: scheduler, sampler and batcher owned
//! together and driven from a single control flow.
//!
//! ## Tick Order
//!
//! 1. Check the link and reconnect if it is down
//! 2. Run one full sampling window (never interrupted)
//! 3. Stamp the result and hand it to the batcher
//! 4. Advance resync housekeeping
//!
//! Nothing happens between ticks except the caller's own yielding, so the
//! outbound buffer has exactly one writer and one flusher.

use tracing::{debug, info};

use crate::error::{NodeError, Result};
use crate::sampler::{AnalogSource, RmsEstimator};
use crate::scheduler::{Clock, Scheduler};
use crate::telemetry::{Batcher, Measurement, TelemetrySink};

/// Measurement node driven by [`Node::poll`].
#[derive(Debug)]
pub struct Node<A, S, C> {
    estimator: RmsEstimator<A>,
    batcher: Batcher<S>,
    scheduler: Scheduler,
    clock: C,
    samples_per_estimate: usize,
    last_timestamp_ms: u64,
}

impl<A, S, C> Node<A, S, C>
where
    A: AnalogSource,
    S: TelemetrySink,
    C: Clock,
{
    /// Creates a node whose first tick is due one interval from now.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::InvalidArgument`] if `samples_per_estimate` is zero.
    pub fn new(
        estimator: RmsEstimator<A>,
        batcher: Batcher<S>,
        clock: C,
        tick_interval_ms: u64,
        samples_per_estimate: usize,
    ) -> Result<Self> {
        if samples_per_estimate == 0 {
            return Err(NodeError::InvalidArgument(
                "samples_per_estimate must be at least 1".to_string(),
            ));
        }

        let scheduler = Scheduler::new(tick_interval_ms, clock.now_millis());
        Ok(Self {
            estimator,
            batcher,
            scheduler,
            clock,
            samples_per_estimate,
            last_timestamp_ms: 0,
        })
    }

    /// Associates the link and performs the initial time sync.
    ///
    /// Failures are logged and retried by regular housekeeping.
    pub fn start(&mut self) {
        let link = self.batcher.maintain_link();
        let synced = self.batcher.sync_time_now();
        info!("Node started (link: {:?}, time synced: {})", link, synced);
    }

    /// Runs one tick if due. Returns the measurement taken, if any.
    ///
    /// # Errors
    ///
    /// Only propagates sampler argument errors; delivery failures are absorbed
    /// by the batcher.
    pub fn poll(&mut self) -> Result<Option<Measurement>> {
        let now = self.clock.now_millis();
        if !self.scheduler.due(now) {
            return Ok(None);
        }

        self.batcher.maintain_link();

        let amperes = self.estimator.estimate(self.samples_per_estimate)?;

        // Keep hand-off timestamps strictly increasing even if a resync stepped
        // the clock back; equal timestamps overwrite each other in the store
        let now = self.clock.now_millis();
        let timestamp_ms = if now > self.last_timestamp_ms {
            now
        } else {
            self.last_timestamp_ms + 1
        };
        self.last_timestamp_ms = timestamp_ms;

        let measurement = Measurement::new(amperes, timestamp_ms);
        debug!("Tick {}: {:.3} mA", self.scheduler.ticks(), amperes * 1000.0);

        self.batcher.observe(measurement);
        self.batcher.housekeeping();

        Ok(Some(measurement))
    }

    /// Flushes pending points before exit. Returns the number written.
    pub fn shutdown(&mut self) -> usize {
        let written = self.batcher.flush_pending();
        info!(
            "Flushed {} points on shutdown, {} left undelivered",
            written,
            self.batcher.pending_len()
        );
        written
    }

    pub fn batcher(&self) -> &Batcher<S> {
        &self.batcher
    }

    pub fn estimator(&self) -> &RmsEstimator<A> {
        &self.estimator
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::source::mocks::ConstantSource;
    use crate::sampler::{Calibration, SineSource};
    use crate::scheduler::ManualClock;
    use crate::telemetry::sink::mocks::FakeSink;
    use crate::telemetry::{BatcherSettings, LinkState, TagSet};

    type TestNode = Node<SineSource, FakeSink, ManualClock>;

    fn build(sink: FakeSink, clock: ManualClock, batch_size: usize) -> TestNode {
        let estimator = RmsEstimator::new(
            SineSource::new(200.0, 512.0, 40.0, 10),
            Calibration::default(),
            1024.0,
        );
        let settings = BatcherSettings {
            batch_size,
            resync_interval_ticks: 3,
            ..BatcherSettings::default()
        };
        let batcher = Batcher::new(sink, TagSet::new("energy"), settings);
        Node::new(estimator, batcher, clock, 500, 400).unwrap()
    }

    #[test]
    fn test_zero_samples_rejected() {
        let estimator = RmsEstimator::new(ConstantSource(512), Calibration::default(), 1024.0);
        let batcher = Batcher::new(FakeSink::new(), TagSet::new("energy"), BatcherSettings::default());

        let result = Node::new(estimator, batcher, ManualClock::new(0), 500, 0);
        assert!(matches!(result, Err(NodeError::InvalidArgument(_))));
    }

    #[test]
    fn test_tick_gating() {
        let clock = ManualClock::new(0);
        let mut node = build(FakeSink::new(), clock.clone(), 5);

        clock.set(300);
        assert!(node.poll().unwrap().is_none());
        assert_eq!(node.batcher().stats().observed, 0);

        clock.set(600);
        let measurement = node.poll().unwrap().expect("tick should be due");
        assert_eq!(measurement.timestamp_ms, 600);
        assert_eq!(node.batcher().stats().observed, 1);

        assert!(node.poll().unwrap().is_none());
        assert_eq!(node.scheduler().ticks(), 1);
    }

    #[test]
    fn test_measurement_in_amperes() {
        let clock = ManualClock::new(0);
        let mut node = build(FakeSink::new(), clock.clone(), 5);

        clock.advance(500);
        let measurement = node.poll().unwrap().unwrap();

        let expected = 200.0 / 2f64.sqrt() * Calibration::default().ratio();
        assert!(
            ((measurement.value - expected) / expected).abs() < 0.02,
            "Expected ~{:.3} A, got {:.3} A",
            expected,
            measurement.value
        );
    }

    #[test]
    fn test_batches_delivered_through_loop() {
        let sink = FakeSink::new();
        let clock = ManualClock::new(0);
        let mut node = build(sink.clone(), clock.clone(), 5);
        node.start();

        for _ in 0..12 {
            clock.advance(500);
            node.poll().unwrap();
        }

        assert_eq!(sink.batches().len(), 2);
        assert_eq!(node.batcher().pending_len(), 2);
        assert_eq!(
            sink.written_timestamps(),
            (1..=10).map(|i| i * 500).collect::<Vec<u64>>()
        );
    }

    #[test]
    fn test_start_syncs_and_connects() {
        let sink = FakeSink::new();
        sink.set_connected(false);
        let mut node = build(sink.clone(), ManualClock::new(0), 5);

        node.start();

        let state = node.batcher().connectivity();
        assert_eq!(state.link, LinkState::Connected);
        assert!(state.time_synced);
        assert_eq!(sink.state.lock().unwrap().sync_attempts, 1);
    }

    #[test]
    fn test_resync_counted_in_ticks() {
        let sink = FakeSink::new();
        let clock = ManualClock::new(0);
        let mut node = build(sink.clone(), clock.clone(), 5);

        for _ in 0..6 {
            clock.advance(500);
            node.poll().unwrap();
        }
        assert_eq!(sink.state.lock().unwrap().sync_attempts, 2);
    }

    #[test]
    fn test_timestamps_stay_ordered_after_clock_steps_back() {
        let sink = FakeSink::new();
        let clock = ManualClock::new(10_000);
        let mut node = build(sink, clock.clone(), 5);

        clock.set(10_500);
        let first = node.poll().unwrap().unwrap();

        // Clock corrected backwards by a resync
        clock.set(9_000);
        assert!(node.poll().unwrap().is_none());
        clock.set(9_500);
        let second = node.poll().unwrap().unwrap();

        clock.set(10_000);
        let third = node.poll().unwrap().unwrap();

        assert_eq!(first.timestamp_ms, 10_500);
        assert_eq!(second.timestamp_ms, 10_501);
        assert_eq!(third.timestamp_ms, 10_502);
        assert!(first.timestamp_ms < second.timestamp_ms);
        assert!(second.timestamp_ms < third.timestamp_ms);
    }

    #[test]
    fn test_dead_sink_keeps_loop_running() {
        let sink = FakeSink::new();
        sink.set_fail_writes(true);
        sink.set_fail_sync(true);
        sink.set_connected(false);
        sink.set_reconnect_succeeds(false);
        let clock = ManualClock::new(0);
        let mut node = build(sink.clone(), clock.clone(), 5);
        node.start();

        for _ in 0..50 {
            clock.advance(500);
            assert!(node.poll().unwrap().is_some());
        }

        assert_eq!(node.batcher().pending_len(), 15);
        assert_eq!(node.batcher().stats().evicted, 35);
        assert_eq!(node.batcher().connectivity().link, LinkState::Disconnected);
    }

    #[test]
    fn test_shutdown_flushes_remainder() {
        let sink = FakeSink::new();
        let clock = ManualClock::new(0);
        let mut node = build(sink.clone(), clock.clone(), 5);

        for _ in 0..3 {
            clock.advance(500);
            node.poll().unwrap();
        }

        assert_eq!(node.shutdown(), 3);
        assert_eq!(node.batcher().pending_len(), 0);
        assert_eq!(sink.batches().len(), 1);
    }

    #[test]
    fn test_bias_persists_across_ticks() {
        let clock = ManualClock::new(0);
        let mut node = build(FakeSink::new(), clock.clone(), 5);

        clock.advance(500);
        node.poll().unwrap();
        let after_first = node.estimator().bias();
        clock.advance(500);
        node.poll().unwrap();

        assert_ne!(node.estimator().bias(), 512.0);
        assert_ne!(node.estimator().bias(), after_first);
    }
}

//! # Outbound Buffer
//!
//! Bounded FIFO of points waiting for the sink.
//!
//! Insertion order is send order. When a push would exceed capacity the oldest
//! point is evicted: bounded memory wins over completeness of history. Evictions
//! are counted so the loss stays observable.

use std::collections::VecDeque;

use super::point::Point;

/// Bounded FIFO with oldest-first eviction.
#[derive(Debug, Clone)]
pub struct OutboundBuffer {
    points: VecDeque<Point>,
    capacity: usize,
    evicted: u64,
}

impl OutboundBuffer {
    /// Creates an empty buffer holding at most `capacity` points (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Appends a point, returning the evicted oldest point if the buffer was full.
    pub fn push(&mut self, point: Point) -> Option<Point> {
        let evicted = if self.points.len() >= self.capacity {
            self.evicted += 1;
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    /// Returns up to `count` oldest points without removing them.
    ///
    /// The slice is contiguous so it can be handed to the sink as one batch.
    pub fn oldest(&mut self, count: usize) -> &[Point] {
        let count = count.min(self.points.len());
        &self.points.make_contiguous()[..count]
    }

    /// Removes up to `count` oldest points, returning how many were removed.
    pub fn remove_oldest(&mut self, count: usize) -> usize {
        let count = count.min(self.points.len());
        self.points.drain(..count);
        count
    }

    /// Iterates pending points in send order.
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total points dropped by overflow since creation.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::point::{Measurement, TagSet};

    fn point(ts: u64) -> Point {
        Point::from_measurement(&TagSet::new("energy"), Measurement::new(ts as f64, ts), 1.0)
    }

    fn timestamps(buffer: &OutboundBuffer) -> Vec<u64> {
        buffer.iter().map(|p| p.timestamp_ms).collect()
    }

    #[test]
    fn test_push_preserves_order() {
        let mut buffer = OutboundBuffer::new(4);
        for ts in 1..=3 {
            assert!(buffer.push(point(ts)).is_none());
        }
        assert_eq!(timestamps(&buffer), vec![1, 2, 3]);
        assert_eq!(buffer.evicted(), 0);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = OutboundBuffer::new(3);
        for ts in 1..=3 {
            buffer.push(point(ts));
        }

        let evicted = buffer.push(point(4)).expect("full buffer should evict");
        assert_eq!(evicted.timestamp_ms, 1);
        assert_eq!(timestamps(&buffer), vec![2, 3, 4]);
        assert_eq!(buffer.evicted(), 1);
    }

    #[test]
    fn test_bound_holds_for_long_sequences() {
        let capacity = 15;
        let mut buffer = OutboundBuffer::new(capacity);

        for ts in 1..=100u64 {
            buffer.push(point(ts));
            assert!(buffer.len() <= capacity);
        }

        let expected: Vec<u64> = (86..=100).collect();
        assert_eq!(timestamps(&buffer), expected);
        assert_eq!(buffer.evicted(), 85);
    }

    #[test]
    fn test_oldest_and_remove() {
        let mut buffer = OutboundBuffer::new(10);
        for ts in 1..=7 {
            buffer.push(point(ts));
        }

        let batch: Vec<u64> = buffer.oldest(5).iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(batch, vec![1, 2, 3, 4, 5]);
        assert_eq!(buffer.len(), 7, "Peeking must not remove points");

        assert_eq!(buffer.remove_oldest(5), 5);
        assert_eq!(timestamps(&buffer), vec![6, 7]);
    }

    #[test]
    fn test_oldest_after_wraparound_is_contiguous() {
        let mut buffer = OutboundBuffer::new(4);
        for ts in 1..=6 {
            buffer.push(point(ts));
        }

        let batch: Vec<u64> = buffer.oldest(4).iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(batch, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_requests_larger_than_len_are_clamped() {
        let mut buffer = OutboundBuffer::new(4);
        buffer.push(point(1));

        assert_eq!(buffer.oldest(10).len(), 1);
        assert_eq!(buffer.remove_oldest(10), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut buffer = OutboundBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(point(1));
        buffer.push(point(2));
        assert_eq!(timestamps(&buffer), vec![2]);
    }
}

//! # Telemetry Module
//!
//! Buffered, batched delivery of measurements to a time-series store.
//!
//! This module handles:
//! - Decorating measurements with the fixed tag set
//! - Holding pending points in a bounded FIFO with oldest-first eviction
//! - Writing batches and retrying failed ones on later ticks
//! - Link maintenance and periodic time resynchronization
//! - A JSON Lines file sink for host runs

pub mod batcher;
pub mod buffer;
pub mod jsonl;
pub mod point;
pub mod sink;

pub use batcher::{Batcher, BatcherSettings, BatcherStats, ConnectivityState, LinkState};
pub use buffer::OutboundBuffer;
pub use jsonl::JsonlSink;
pub use point::{Measurement, Point, TagSet};
pub use sink::{TelemetrySink, WriteOptions, WritePrecision};

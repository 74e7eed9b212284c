//! # Current Node Library
//!
//! Samples an analog current sensor, derives true RMS current and ships it to
//! a time-series store over an unreliable link.
//!
//! This library provides the measurement-and-delivery pipeline: an adaptive
//! bias RMS estimator, a bounded batching buffer with retry and oldest-first
//! eviction, and the fixed-period scheduler that drives them.

pub mod config;
pub mod error;
pub mod node;
pub mod sampler;
pub mod scheduler;
pub mod telemetry;

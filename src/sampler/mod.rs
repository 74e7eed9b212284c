//! # Sampler Module
//!
//! Analog current sampling and RMS estimation.
//!
//! This module handles:
//! - Reading raw ADC samples through the [`source::AnalogSource`] trait
//! - Tracking the DC bias of the sensor front end with a leaky integrator
//! - Converting the RMS of the bias-free signal from ADC counts to amperes

pub mod source;
pub mod rms;

pub use rms::{Calibration, RmsEstimator};
pub use source::{AnalogSource, SineSource};

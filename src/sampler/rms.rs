//! # RMS Estimator
//!
//! Estimates true RMS current from a DC-biased analog signal.
//!
//! ## Bias Tracking
//!
//! The sensor front end centres the AC signal around a DC level that drifts
//! with supply and temperature. Instead of a calibration phase, the estimator
//! tracks that level with a leaky integrator updated on every sample:
//!
//! `bias = bias + (raw - bias) / N`
//!
//! The bias persists across calls, so the filter settles over several
//! estimates rather than re-learning the offset each time. The first few
//! estimates after power-on carry some of the initial bias error.
//!
//! ## Conversion
//!
//! `amperes = sqrt(sum((raw - bias)²) / n) * calibration * supply_voltage / 2^B`
//!
//! ## Sampling Window
//!
//! [`RmsEstimator::estimate`] is synchronous and never yields. Suspending the
//! loop mid-window changes the effective sampling rate relative to the AC
//! period and distorts the estimate, so callers must only yield between calls.

use tracing::trace;

use super::source::AnalogSource;
use crate::error::{NodeError, Result};

/// Hardware calibration inputs for the counts-to-amperes conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Current transformer calibration constant (amperes per volt of burden).
    pub factor: f64,
    /// ADC reference voltage in volts.
    pub supply_voltage: f64,
    /// ADC resolution in bits.
    pub resolution_bits: u8,
}

impl Calibration {
    /// Number of distinct ADC codes, `2^B`.
    #[must_use]
    pub fn adc_counts(&self) -> u32 {
        1u32 << self.resolution_bits.clamp(1, 16)
    }

    /// Mid-scale count, the nominal DC level of a biased front end.
    #[must_use]
    pub fn mid_scale(&self) -> f64 {
        (self.adc_counts() / 2) as f64
    }

    /// Multiplier from RMS counts to amperes.
    ///
    /// # Examples
    ///
    /// ```
    /// use current_node::sampler::Calibration;
    ///
    /// let cal = Calibration { factor: 30.0, supply_voltage: 3.3, resolution_bits: 10 };
    /// assert!((cal.ratio() - 30.0 * 3.3 / 1024.0).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.factor * self.supply_voltage / self.adc_counts() as f64
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            factor: 30.0,
            supply_voltage: 3.3,
            resolution_bits: 10,
        }
    }
}

/// Adaptive-bias RMS estimator over an [`AnalogSource`].
#[derive(Debug)]
pub struct RmsEstimator<A> {
    source: A,
    bias: f64,
    smoothing: f64,
    ratio: f64,
}

impl<A: AnalogSource> RmsEstimator<A> {
    /// Creates an estimator whose bias starts at the ADC mid-scale.
    ///
    /// # Arguments
    ///
    /// * `source` - Raw sample input
    /// * `calibration` - Counts-to-amperes conversion inputs
    /// * `smoothing` - Leaky integrator constant N (values below 1 are clamped to 1)
    #[must_use]
    pub fn new(source: A, calibration: Calibration, smoothing: f64) -> Self {
        Self::with_initial_bias(source, calibration, smoothing, calibration.mid_scale())
    }

    /// Creates an estimator with an explicit starting bias, in ADC counts.
    #[must_use]
    pub fn with_initial_bias(
        source: A,
        calibration: Calibration,
        smoothing: f64,
        initial_bias: f64,
    ) -> Self {
        Self {
            source,
            bias: initial_bias,
            smoothing: smoothing.max(1.0),
            ratio: calibration.ratio(),
        }
    }

    /// Current bias estimate in ADC counts.
    #[must_use]
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Counts-to-amperes multiplier in use.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Samples `num_samples` readings and returns the RMS current in amperes.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::InvalidArgument`] if `num_samples` is zero. The
    /// bias estimate is left untouched in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use current_node::sampler::{Calibration, RmsEstimator, SineSource};
    ///
    /// let source = SineSource::new(0.0, 512.0, 50.0, 10);
    /// let mut estimator = RmsEstimator::new(source, Calibration::default(), 1024.0);
    ///
    /// // A flat signal at the bias point carries no current
    /// assert_eq!(estimator.estimate(100)?, 0.0);
    /// assert!(estimator.estimate(0).is_err());
    /// # Ok::<(), current_node::error::NodeError>(())
    /// ```
    pub fn estimate(&mut self, num_samples: usize) -> Result<f64> {
        if num_samples == 0 {
            return Err(NodeError::InvalidArgument(
                "num_samples must be at least 1".to_string(),
            ));
        }

        let mut sum_of_squares = 0.0;
        for _ in 0..num_samples {
            let raw = self.source.read_raw() as f64;
            self.bias += (raw - self.bias) / self.smoothing;
            let filtered = raw - self.bias;
            sum_of_squares += filtered * filtered;
        }

        let rms_counts = (sum_of_squares / num_samples as f64).sqrt();
        trace!(rms_counts, bias = self.bias, num_samples, "Sampling window complete");

        Ok(rms_counts * self.ratio)
    }
}

//! Trait abstraction for analog input to enable testing without hardware

use std::f64::consts::TAU;

/// Trait for a raw ADC input channel
///
/// Implementations must return promptly; the estimator calls this in a tight
/// loop and any blocking skews the effective sampling rate.
pub trait AnalogSource {
    /// Read one raw sample in `[0, 2^B - 1]`
    fn read_raw(&mut self) -> u16;
}

impl<T: AnalogSource + ?Sized> AnalogSource for Box<T> {
    fn read_raw(&mut self) -> u16 {
        (**self).read_raw()
    }
}

/// Simulated current transformer output
///
/// Produces `offset + amplitude * sin(2π n / samples_per_cycle)`, rounded and
/// clamped to the ADC range, so values beyond full scale saturate the same way
/// a real converter would.
#[derive(Debug, Clone)]
pub struct SineSource {
    amplitude: f64,
    offset: f64,
    samples_per_cycle: f64,
    max_count: u16,
    index: u64,
}

impl SineSource {
    /// Creates a new simulated source.
    ///
    /// # Arguments
    ///
    /// * `amplitude` - Peak deviation from `offset`, in ADC counts
    /// * `offset` - DC level of the signal, in ADC counts
    /// * `samples_per_cycle` - Samples per AC period (clamped to at least 2)
    /// * `resolution_bits` - ADC resolution (clamped to 1..=16)
    ///
    /// # Examples
    ///
    /// ```
    /// use current_node::sampler::{AnalogSource, SineSource};
    ///
    /// let mut source = SineSource::new(100.0, 512.0, 40.0, 10);
    /// assert_eq!(source.read_raw(), 512);
    /// ```
    #[must_use]
    pub fn new(amplitude: f64, offset: f64, samples_per_cycle: f64, resolution_bits: u8) -> Self {
        let bits = resolution_bits.clamp(1, 16) as u32;
        Self {
            amplitude,
            offset,
            samples_per_cycle: samples_per_cycle.max(2.0),
            max_count: ((1u32 << bits) - 1) as u16,
            index: 0,
        }
    }

    /// Highest count this source can emit.
    #[must_use]
    pub fn max_count(&self) -> u16 {
        self.max_count
    }
}

impl AnalogSource for SineSource {
    fn read_raw(&mut self) -> u16 {
        let phase = TAU * self.index as f64 / self.samples_per_cycle;
        self.index = self.index.wrapping_add(1);

        let value = self.offset + self.amplitude * phase.sin();
        value.round().clamp(0.0, self.max_count as f64) as u16
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;

    /// Source that always returns the same count
    #[derive(Debug, Clone, Copy)]
    pub struct ConstantSource(pub u16);

    impl AnalogSource for ConstantSource {
        fn read_raw(&mut self) -> u16 {
            self.0
        }
    }

    /// Source that replays a fixed sequence, wrapping around
    #[derive(Debug, Clone)]
    pub struct SequenceSource {
        samples: Vec<u16>,
        position: usize,
    }

    impl SequenceSource {
        pub fn new(samples: Vec<u16>) -> Self {
            Self { samples, position: 0 }
        }
    }

    impl AnalogSource for SequenceSource {
        fn read_raw(&mut self) -> u16 {
            let sample = self.samples[self.position % self.samples.len()];
            self.position += 1;
            sample
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_source_starts_at_offset() {
        let mut source = SineSource::new(300.0, 600.0, 20.0, 10);
        assert_eq!(source.read_raw(), 600);
    }

    #[test]
    fn test_sine_source_quarter_cycle_peak() {
        let mut source = SineSource::new(300.0, 600.0, 20.0, 10);
        let samples: Vec<u16> = (0..20).map(|_| source.read_raw()).collect();

        assert_eq!(samples[5], 900, "Quarter cycle should hit the positive peak");
        assert_eq!(samples[15], 300, "Three quarters should hit the negative peak");
    }

    #[test]
    fn test_sine_source_saturates_at_full_scale() {
        let mut source = SineSource::new(2000.0, 512.0, 8.0, 10);
        let samples: Vec<u16> = (0..8).map(|_| source.read_raw()).collect();

        assert_eq!(source.max_count(), 1023);
        assert!(samples.contains(&1023));
        assert!(samples.contains(&0));
        assert!(samples.iter().all(|&s| s <= 1023));
    }

    #[test]
    fn test_sine_source_resolution_clamped() {
        assert_eq!(SineSource::new(1.0, 1.0, 10.0, 0).max_count(), 1);
        assert_eq!(SineSource::new(1.0, 1.0, 10.0, 12).max_count(), 4095);
        assert_eq!(SineSource::new(1.0, 1.0, 10.0, 20).max_count(), u16::MAX);
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut source: Box<dyn AnalogSource> = Box::new(mocks::ConstantSource(42));
        assert_eq!(source.read_raw(), 42);
    }

    #[test]
    fn test_sequence_source_wraps() {
        let mut source = mocks::SequenceSource::new(vec![1, 2, 3]);
        let samples: Vec<u16> = (0..5).map(|_| source.read_raw()).collect();
        assert_eq!(samples, vec![1, 2, 3, 1, 2]);
    }
}

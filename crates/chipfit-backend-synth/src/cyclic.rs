//! Phase-addressable periodic sample buffers.

use crate::error::{SynthError, SynthResult};
use crate::window::Window;

/// A finite periodic waveform addressed by phase or by absolute offset.
///
/// Offsets wrap modulo the buffer length in both directions, so any integer
/// offset is valid on a non-empty array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CyclicArray {
    samples: Vec<f32>,
    sample_rate: u32,
    frequency: f64,
}

impl CyclicArray {
    /// Creates a cyclic array from a generated run.
    ///
    /// `frequency` is the realized fundamental frequency of the run.
    pub fn new(samples: Vec<f32>, sample_rate: u32, frequency: f64) -> SynthResult<Self> {
        if samples.is_empty() {
            return Err(SynthError::EmptySample);
        }
        if sample_rate == 0 {
            return Err(SynthError::invalid_param("sample_rate", "must be positive"));
        }
        if !(frequency > 0.0 && frequency.is_finite()) {
            return Err(SynthError::InvalidFrequency { freq: frequency });
        }
        Ok(Self {
            samples,
            sample_rate,
            frequency,
        })
    }

    /// Backing samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate of the buffer.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Realized fundamental frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples (only the default value).
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of one fundamental period in samples.
    pub fn period_samples(&self) -> f64 {
        self.sample_rate as f64 / self.frequency
    }

    /// Sample offset of a phase (in cycles of the fundamental).
    pub fn phase_to_offset(&self, phase: f64) -> i64 {
        if self.is_empty() {
            return 0;
        }
        (phase * self.sample_rate as f64 / self.frequency).round() as i64
    }

    /// Phase reached after `samples` samples starting from `phase`, in [0, 1).
    pub fn advance_phase(&self, phase: f64, samples: usize) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let advanced = (phase + samples as f64 * self.frequency / self.sample_rate as f64)
            .rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs.
        if advanced >= 1.0 {
            0.0
        } else {
            advanced
        }
    }

    /// Returns `length` samples starting at `offset`, wrapping around.
    ///
    /// An empty array yields an empty fragment.
    pub fn get_fragment(&self, offset: i64, length: usize) -> Vec<f32> {
        if self.samples.is_empty() {
            return Vec::new();
        }
        let len = self.samples.len();
        let mut index = offset.rem_euclid(len as i64) as usize;
        let mut fragment = Vec::with_capacity(length);
        for _ in 0..length {
            fragment.push(self.samples[index]);
            index += 1;
            if index == len {
                index = 0;
            }
        }
        fragment
    }

    /// Windowed excerpt aligned so that `phase` falls on the window's frame start.
    pub fn get_window(&self, phase: f64, window: &Window) -> Vec<f32> {
        let offset = self.phase_to_offset(phase) - window.left_offset() as i64;
        window.apply(&self.get_fragment(offset, window.size()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> CyclicArray {
        let samples = (0..len).map(|i| i as f32).collect();
        CyclicArray::new(samples, 8, 1.0).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_and_bad_frequency() {
        assert_eq!(
            CyclicArray::new(Vec::new(), 44_100, 440.0),
            Err(SynthError::EmptySample)
        );
        assert!(matches!(
            CyclicArray::new(vec![0.0], 44_100, 0.0),
            Err(SynthError::InvalidFrequency { .. })
        ));
        assert!(CyclicArray::new(vec![0.0], 44_100, f64::NAN).is_err());
    }

    #[test]
    fn test_fragment_wraps_positive_and_negative() {
        let array = ramp(8);
        assert_eq!(array.get_fragment(6, 4), vec![6.0, 7.0, 0.0, 1.0]);
        assert_eq!(array.get_fragment(-2, 3), vec![6.0, 7.0, 0.0]);
        assert_eq!(array.get_fragment(-17, 2), vec![7.0, 0.0]);
        assert_eq!(array.get_fragment(3, 0), Vec::<f32>::new());
    }

    #[test]
    fn test_fragment_length_always_exact() {
        let array = ramp(5);
        for offset in -23i64..23 {
            for length in [0usize, 1, 4, 5, 13] {
                assert_eq!(array.get_fragment(offset, length).len(), length);
            }
        }
    }

    #[test]
    fn test_empty_array_yields_empty_fragment() {
        let array = CyclicArray::default();
        assert!(array.get_fragment(-4, 16).is_empty());
        assert_eq!(array.advance_phase(0.5, 100), 0.0);
    }

    #[test]
    fn test_phase_to_offset_uses_realized_frequency() {
        // 8 samples per period
        let array = ramp(8);
        assert_eq!(array.phase_to_offset(0.0), 0);
        assert_eq!(array.phase_to_offset(0.5), 4);
        assert_eq!(array.phase_to_offset(0.25), 2);
        assert!((array.period_samples() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_advance_phase_wraps() {
        let array = ramp(8);
        assert!((array.advance_phase(0.5, 4) - 0.0).abs() < 1e-12);
        assert!((array.advance_phase(0.25, 10) - 0.5).abs() < 1e-12);
    }
}

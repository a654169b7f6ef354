//! MIDI pitch and frequency conversion.

use chipfit_spec::FrequencyConfig;

/// Convert a (possibly fractional) MIDI pitch to frequency in Hz.
///
/// Uses f = reference_frequency * 2^((pitch - reference_pitch) / 12).
///
/// # Examples
/// ```
/// use chipfit_backend_synth::note::pitch_to_frequency;
///
/// let a4 = pitch_to_frequency(69.0, 69, 440.0);
/// assert!((a4 - 440.0).abs() < 1e-9);
///
/// let c4 = pitch_to_frequency(60.0, 69, 440.0);
/// assert!((c4 - 261.626).abs() < 0.01);
/// ```
pub fn pitch_to_frequency(pitch: f64, reference_pitch: u8, reference_frequency: f64) -> f64 {
    reference_frequency * 2.0_f64.powf((pitch - reference_pitch as f64) / 12.0)
}

/// Convert a frequency in Hz to a fractional MIDI pitch.
///
/// Non-positive frequencies map to negative infinity.
pub fn frequency_to_pitch(frequency: f64, reference_pitch: u8, reference_frequency: f64) -> f64 {
    if frequency <= 0.0 {
        return f64::NEG_INFINITY;
    }
    reference_pitch as f64 + 12.0 * (frequency / reference_frequency).log2()
}

/// Convert a frequency in Hz to the nearest MIDI pitch (0-127).
pub fn nearest_pitch(frequency: f64, reference_pitch: u8, reference_frequency: f64) -> u8 {
    let pitch = frequency_to_pitch(frequency, reference_pitch, reference_frequency);
    if pitch.is_nan() {
        return 0;
    }
    pitch.round().clamp(0.0, 127.0) as u8
}

/// Tuning reference pair (A4 = 440 Hz by default).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// Reference MIDI pitch.
    pub reference_pitch: u8,
    /// Frequency of the reference pitch in Hz.
    pub reference_frequency: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            reference_pitch: 69,
            reference_frequency: 440.0,
        }
    }
}

impl Tuning {
    /// Creates a tuning from a validated frequency section.
    pub fn from_config(frequency: &FrequencyConfig) -> Self {
        Self {
            reference_pitch: frequency.reference_pitch,
            reference_frequency: frequency.reference_frequency,
        }
    }

    /// Frequency of a MIDI pitch.
    pub fn frequency(&self, pitch: u8) -> f64 {
        pitch_to_frequency(pitch as f64, self.reference_pitch, self.reference_frequency)
    }

    /// Fractional MIDI pitch of a frequency.
    pub fn pitch(&self, frequency: f64) -> f64 {
        frequency_to_pitch(frequency, self.reference_pitch, self.reference_frequency)
    }

    /// Nearest MIDI pitch of a frequency.
    pub fn nearest(&self, frequency: f64) -> u8 {
        nearest_pitch(frequency, self.reference_pitch, self.reference_frequency)
    }
}

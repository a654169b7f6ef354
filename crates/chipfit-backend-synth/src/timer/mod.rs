//! Simulated channel dividers.
//!
//! A timer turns a target frequency into the integer register value the
//! hardware divider would hold, and produces frame-sized runs of samples from
//! that quantized setting:
//! - [`PhaseTimer`] - pulse and triangle channels, carrying a phase in [0, 1)
//! - [`LfsrTimer`] - the noise channel, carrying its 15-bit shift register
//!
//! The continuation state links consecutive frames; saving and restoring it
//! lets callers synthesize speculatively without disturbing a running timer.

mod lfsr;
mod phase;


pub use lfsr::{
    noise_periods, LfsrTimer, INITIAL_REGISTER, LONG_SEQUENCE_LENGTH, NTSC_NOISE_PERIODS,
    PAL_NOISE_PERIODS, SHORT_SEQUENCE_LENGTH,
};
pub use phase::{
    frequency_to_register, register_to_frequency, PhaseTimer, Waveform, DUTY_SEQUENCES,
    PULSE_DIVIDER, TRIANGLE_DIVIDER,
};

use chipfit_spec::{ChannelKind, Clock, Config};

use crate::cyclic::CyclicArray;
use crate::error::{SynthError, SynthResult};
use crate::note::Tuning;

/// Largest value of the 11-bit period register.
pub const MAX_TIMER: u16 = 0x7FF;

/// Phase covered by one full waveform cycle.
pub const PHASE_INCREMENT: f64 = 1.0;

/// Output format shared by every timer of one configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerParams {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_length: usize,
    /// CPU clock driving the dividers.
    pub clock: Clock,
}

impl TimerParams {
    /// Timer parameters of a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.general().sample_rate,
            frame_length: config.frame_length(),
            clock: config.general().clock,
        }
    }

    /// CPU cycles elapsing per output sample.
    pub fn cycles_per_sample(&self) -> f64 {
        self.clock.cpu_hz() / self.sample_rate as f64
    }
}

/// Register value a channel uses to play `pitch`.
///
/// Pulse and triangle quantize the tuned frequency into the period register;
/// the noise channel has no pitch and takes its period index as is.
pub fn pitch_to_timer(kind: ChannelKind, clock: Clock, tuning: &Tuning, pitch: u8) -> u16 {
    let divider = match kind {
        ChannelKind::Pulse => PULSE_DIVIDER,
        ChannelKind::Triangle => TRIANGLE_DIVIDER,
        ChannelKind::Noise => return pitch as u16,
    };
    frequency_to_register(clock.cpu_hz(), divider, tuning.frequency(pitch))
}

/// State carried from one frame into the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContinuationState {
    /// Fractional position within the waveform cycle, in [0, 1).
    Phase(f64),
    /// Shift register contents and the fractional progress to the next shift.
    Lfsr {
        /// 15-bit register, never zero.
        register: u16,
        /// Progress towards the next shift, in [0, 1).
        remainder: f64,
    },
}

impl ContinuationState {
    /// Short name of the state kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ContinuationState::Phase(_) => "phase",
            ContinuationState::Lfsr { .. } => "lfsr",
        }
    }

    /// Rejects values a timer can never hold. Nothing is clamped.
    pub fn validate(&self) -> SynthResult<()> {
        match *self {
            ContinuationState::Phase(phase) => validate_phase(phase),
            ContinuationState::Lfsr {
                register,
                remainder,
            } => {
                if register == 0 || register > 0x7FFF {
                    return Err(SynthError::InvalidRegister { register });
                }
                validate_phase(remainder)
            }
        }
    }
}

fn validate_phase(phase: f64) -> SynthResult<()> {
    if (0.0..1.0).contains(&phase) {
        Ok(())
    } else {
        Err(SynthError::InvalidPhase { phase })
    }
}

/// Common interface of the channel dividers.
pub trait Timer {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Samples per generated frame.
    fn frame_length(&self) -> usize;

    /// Quantizes a target frequency to the nearest register value.
    fn frequency_to_timer(&self, frequency: f64) -> u16;

    /// Frequency realized by a register value.
    fn timer_to_frequency(&self, timer: u16) -> f64;

    /// Fundamental frequency of the generated waveform at the current setting.
    ///
    /// This is the realized value; length and offset math must use it rather
    /// than the requested frequency.
    fn cycle_frequency(&self) -> f64;

    /// State a freshly reset timer starts from.
    fn initial_state(&self) -> ContinuationState;

    /// Current continuation state.
    fn state(&self) -> ContinuationState;

    /// Replaces the continuation state after validating it.
    fn set_state(&mut self, state: ContinuationState) -> SynthResult<()>;

    /// Produces one frame and advances the continuation state.
    fn generate_frame(&mut self) -> Vec<f32>;

    /// Produces `count` frames starting from `initial` (or the current state)
    /// and restores the state the timer had before the call.
    fn generate_frames(
        &mut self,
        count: usize,
        initial: Option<ContinuationState>,
    ) -> SynthResult<Vec<f32>> {
        let saved = self.state();
        if let Some(initial) = initial {
            self.set_state(initial)?;
        }
        let mut samples = Vec::with_capacity(count * self.frame_length());
        for _ in 0..count {
            samples.extend(self.generate_frame());
        }
        self.set_state(saved)?;
        Ok(samples)
    }

    /// Synthesizes a cyclic sample from the initial state.
    ///
    /// Enough frames are generated to cover `min_duration` seconds and at
    /// least two cycles. Runs longer than `max_duration` are cropped around
    /// their centre, starting on a cycle boundary; runs longer than twice the
    /// maximum are never generated in full. The result is trimmed to a whole
    /// number of cycles when at least one fits.
    fn generate_sample(&mut self, min_duration: f64, max_duration: f64) -> SynthResult<CyclicArray> {
        if !(min_duration > 0.0 && max_duration >= min_duration) {
            return Err(SynthError::invalid_param(
                "duration",
                format!(
                    "need 0 < min_duration <= max_duration, got {} and {}",
                    min_duration, max_duration
                ),
            ));
        }
        let frequency = self.cycle_frequency();
        if !(frequency > 0.0 && frequency.is_finite()) {
            return Err(SynthError::InvalidFrequency { freq: frequency });
        }

        let sample_rate = self.sample_rate() as f64;
        let period = sample_rate / frequency;
        let max_samples = ((max_duration * sample_rate).floor() as usize).max(1);
        let needed = (min_duration * sample_rate)
            .max(2.0 * period)
            .min(2.0 * max_samples as f64)
            .ceil() as usize;
        let frame_length = self.frame_length().max(1);
        let frames = needed.div_ceil(frame_length).max(1);

        let initial = self.initial_state();
        let mut samples = self.generate_frames(frames, Some(initial))?;

        if samples.len() > max_samples {
            let excess = samples.len() - max_samples;
            let start = (((excess as f64 / 2.0) / period).floor() * period).round() as usize;
            let start = start.min(excess);
            samples.truncate(start + max_samples);
            samples.drain(..start);
        }

        let cycles = (samples.len() as f64 / period).floor();
        if cycles >= 1.0 {
            let keep = ((cycles * period).round() as usize).clamp(1, samples.len());
            samples.truncate(keep);
        }

        CyclicArray::new(samples, self.sample_rate(), frequency)
    }
}

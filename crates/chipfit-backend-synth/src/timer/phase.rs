//! Phase-accumulator timer for the pulse and triangle channels.

use super::{validate_phase, ContinuationState, Timer, TimerParams, MAX_TIMER, PHASE_INCREMENT};
use crate::error::{SynthError, SynthResult};

/// CPU cycles per pulse cycle, per unit of `timer + 1`.
pub const PULSE_DIVIDER: f64 = 16.0;

/// CPU cycles per triangle cycle, per unit of `timer + 1`.
pub const TRIANGLE_DIVIDER: f64 = 32.0;

/// The four 8-step pulse duty patterns (12.5%, 25%, 50%, 75%).
pub const DUTY_SEQUENCES: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

const TRIANGLE_STEPS: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, //
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];

/// Quantizes `frequency` into an 11-bit period register.
///
/// Non-positive or NaN frequencies map to the slowest setting, [`MAX_TIMER`].
pub fn frequency_to_register(clock_hz: f64, divider: f64, frequency: f64) -> u16 {
    if !(frequency > 0.0) {
        return MAX_TIMER;
    }
    let timer = (clock_hz / (divider * frequency) - 1.0).round();
    timer.clamp(0.0, MAX_TIMER as f64) as u16
}

/// Frequency realized by a period register.
pub fn register_to_frequency(clock_hz: f64, divider: f64, timer: u16) -> f64 {
    clock_hz / (divider * (timer.min(MAX_TIMER) as f64 + 1.0))
}

/// Waveform played by a phase timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Pulse with one of the four duty patterns.
    Pulse {
        /// Duty index 0..=3.
        duty: u8,
    },
    /// 32-step triangle.
    Triangle,
}

/// Pulse or triangle channel divider.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    params: TimerParams,
    waveform: Waveform,
    levels: Vec<f32>,
    divider: f64,
    timer: u16,
    phase: f64,
}

impl PhaseTimer {
    /// Creates a pulse timer for a duty index.
    pub fn pulse(params: TimerParams, duty: u8) -> SynthResult<Self> {
        let sequence = DUTY_SEQUENCES.get(duty as usize).ok_or_else(|| {
            SynthError::invalid_param("duty", format!("must be 0..=3, got {}", duty))
        })?;
        Ok(Self::with_levels(
            params,
            Waveform::Pulse { duty },
            pulse_levels(sequence),
            PULSE_DIVIDER,
        ))
    }

    /// Creates a triangle timer.
    pub fn triangle(params: TimerParams) -> Self {
        let levels = TRIANGLE_STEPS
            .iter()
            .map(|&step| (step as f64 / 7.5 - 1.0) as f32)
            .collect();
        Self::with_levels(params, Waveform::Triangle, levels, TRIANGLE_DIVIDER)
    }

    fn with_levels(params: TimerParams, waveform: Waveform, levels: Vec<f32>, divider: f64) -> Self {
        Self {
            params,
            waveform,
            levels,
            divider,
            timer: MAX_TIMER,
            phase: 0.0,
        }
    }

    /// Waveform this timer plays.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Current period register.
    pub fn timer(&self) -> u16 {
        self.timer
    }

    /// Sets the period register, clamped to 11 bits.
    pub fn set_timer(&mut self, timer: u16) {
        self.timer = timer.min(MAX_TIMER);
    }

    /// Quantizes and applies a target frequency; returns the register value.
    pub fn set_frequency(&mut self, frequency: f64) -> u16 {
        self.timer = self.frequency_to_timer(frequency);
        self.timer
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Output levels of one waveform cycle.
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    /// CPU cycles per waveform cycle.
    fn timer_ticks(&self) -> f64 {
        self.divider * (self.timer as f64 + 1.0)
    }

    fn phase_advance(&self) -> f64 {
        PHASE_INCREMENT / self.timer_ticks() * self.params.cycles_per_sample()
    }
}

/// AC-coupled levels of a duty pattern: zero mean, peak magnitude one.
fn pulse_levels(sequence: &[u8; 8]) -> Vec<f32> {
    let high = sequence.iter().filter(|&&bit| bit == 1).count() as f64;
    let ratio = high / sequence.len() as f64;
    let scale = ratio.max(1.0 - ratio);
    sequence
        .iter()
        .map(|&bit| ((bit as f64 - ratio) / scale) as f32)
        .collect()
}

impl Timer for PhaseTimer {
    fn sample_rate(&self) -> u32 {
        self.params.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.params.frame_length
    }

    fn frequency_to_timer(&self, frequency: f64) -> u16 {
        frequency_to_register(self.params.clock.cpu_hz(), self.divider, frequency)
    }

    fn timer_to_frequency(&self, timer: u16) -> f64 {
        register_to_frequency(self.params.clock.cpu_hz(), self.divider, timer)
    }

    fn cycle_frequency(&self) -> f64 {
        self.timer_to_frequency(self.timer)
    }

    fn initial_state(&self) -> ContinuationState {
        ContinuationState::Phase(0.0)
    }

    fn state(&self) -> ContinuationState {
        ContinuationState::Phase(self.phase)
    }

    fn set_state(&mut self, state: ContinuationState) -> SynthResult<()> {
        match state {
            ContinuationState::Phase(phase) => {
                validate_phase(phase)?;
                self.phase = phase;
                Ok(())
            }
            other => Err(SynthError::StateMismatch {
                expected: "phase",
                found: other.kind(),
            }),
        }
    }

    fn generate_frame(&mut self) -> Vec<f32> {
        let advance = self.phase_advance();
        let steps = self.levels.len();
        let mut frame = Vec::with_capacity(self.params.frame_length);
        for _ in 0..self.params.frame_length {
            let step = ((self.phase * steps as f64) as usize).min(steps - 1);
            frame.push(self.levels[step]);
            self.phase = (self.phase + advance) % PHASE_INCREMENT;
        }
        frame
    }
}

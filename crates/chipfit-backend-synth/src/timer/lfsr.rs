//! Shift-register timer for the noise channel.

use chipfit_spec::Clock;

use super::{ContinuationState, Timer, TimerParams};
use crate::error::{SynthError, SynthResult};

/// NTSC noise periods in CPU cycles, indexed by the 4-bit period register.
pub const NTSC_NOISE_PERIODS: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// PAL noise periods in CPU cycles.
pub const PAL_NOISE_PERIODS: [u16; 16] = [
    4, 8, 14, 30, 60, 88, 118, 148, 188, 236, 354, 472, 708, 944, 1890, 3778,
];

/// Shifts before the long-mode register repeats.
pub const LONG_SEQUENCE_LENGTH: u32 = 32_767;

/// Shifts before the short-mode register repeats (starting from power-up).
pub const SHORT_SEQUENCE_LENGTH: u32 = 93;

/// Register contents at power-up.
pub const INITIAL_REGISTER: u16 = 1;

/// Period table for a clock.
pub fn noise_periods(clock: Clock) -> &'static [u16; 16] {
    match clock {
        Clock::Ntsc => &NTSC_NOISE_PERIODS,
        Clock::Pal => &PAL_NOISE_PERIODS,
    }
}

/// Noise channel divider driving a 15-bit linear feedback shift register.
#[derive(Debug, Clone)]
pub struct LfsrTimer {
    params: TimerParams,
    period_index: u8,
    short: bool,
    register: u16,
    remainder: f64,
}

impl LfsrTimer {
    /// Creates a noise timer for a period index (0..=15) and feedback mode.
    pub fn new(params: TimerParams, period_index: u8, short: bool) -> SynthResult<Self> {
        check_period_index(period_index)?;
        Ok(Self {
            params,
            period_index,
            short,
            register: INITIAL_REGISTER,
            remainder: 0.0,
        })
    }

    /// Current period register.
    pub fn period_index(&self) -> u8 {
        self.period_index
    }

    /// Changes the period register.
    pub fn set_period_index(&mut self, period_index: u8) -> SynthResult<()> {
        check_period_index(period_index)?;
        self.period_index = period_index;
        Ok(())
    }

    /// Whether the short (bit 6) feedback tap is used.
    pub fn is_short(&self) -> bool {
        self.short
    }

    /// Current register contents.
    pub fn register(&self) -> u16 {
        self.register
    }

    /// Shifts until the register repeats.
    pub fn sequence_length(&self) -> u32 {
        if self.short {
            SHORT_SEQUENCE_LENGTH
        } else {
            LONG_SEQUENCE_LENGTH
        }
    }

    fn shift(&mut self) {
        let tap = if self.short { 6 } else { 1 };
        let feedback = (self.register ^ (self.register >> tap)) & 1;
        self.register = (self.register >> 1) | (feedback << 14);
    }

    fn output(&self) -> f32 {
        if self.register & 1 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

fn check_period_index(period_index: u8) -> SynthResult<()> {
    if period_index > 15 {
        return Err(SynthError::invalid_param(
            "period",
            format!("must be 0..=15, got {}", period_index),
        ));
    }
    Ok(())
}

impl Timer for LfsrTimer {
    fn sample_rate(&self) -> u32 {
        self.params.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.params.frame_length
    }

    /// Period register whose shift rate is closest to `frequency` (log scale).
    fn frequency_to_timer(&self, frequency: f64) -> u16 {
        if !(frequency > 0.0) {
            return 15;
        }
        let clock_hz = self.params.clock.cpu_hz();
        let distance = |period: u16| (clock_hz / period as f64 / frequency).ln().abs();
        noise_periods(self.params.clock)
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| distance(**a).total_cmp(&distance(**b)))
            .map(|(index, _)| index as u16)
            .unwrap_or(15)
    }

    /// Shift rate of a period register in Hz.
    fn timer_to_frequency(&self, timer: u16) -> f64 {
        let periods = noise_periods(self.params.clock);
        let period = periods[(timer as usize).min(periods.len() - 1)];
        self.params.clock.cpu_hz() / period as f64
    }

    fn cycle_frequency(&self) -> f64 {
        self.timer_to_frequency(self.period_index as u16) / self.sequence_length() as f64
    }

    fn initial_state(&self) -> ContinuationState {
        ContinuationState::Lfsr {
            register: INITIAL_REGISTER,
            remainder: 0.0,
        }
    }

    fn state(&self) -> ContinuationState {
        ContinuationState::Lfsr {
            register: self.register,
            remainder: self.remainder,
        }
    }

    fn set_state(&mut self, state: ContinuationState) -> SynthResult<()> {
        match state {
            ContinuationState::Lfsr {
                register,
                remainder,
            } => {
                state.validate()?;
                self.register = register;
                self.remainder = remainder;
                Ok(())
            }
            other => Err(SynthError::StateMismatch {
                expected: "lfsr",
                found: other.kind(),
            }),
        }
    }

    fn generate_frame(&mut self) -> Vec<f32> {
        let shifts_per_sample =
            self.timer_to_frequency(self.period_index as u16) / self.params.sample_rate as f64;
        let mut frame = Vec::with_capacity(self.params.frame_length);
        for _ in 0..self.params.frame_length {
            frame.push(self.output());
            self.remainder += shifts_per_sample;
            let shifts = self.remainder.floor();
            self.remainder -= shifts;
            for _ in 0..shifts as u64 {
                self.shift();
            }
        }
        frame
    }
}

//! Instruction sequences to instrument envelopes.
//!
//! Each channel has one [`Exporter`]. `extract_data` walks the instructions
//! into untrimmed per-frame tracks: an instruction that is off reads as
//! volume zero, and a sequence that ends sounding gets one extra silent
//! frame so the instrument stops instead of holding its last note.
//! `to_features` then trims everything past one frame after the last
//! audible one.
//!
//! Pitch is difference-coded against [`Features::initial_pitch`]: timer
//! register deltas for pulse and triangle, period deltas modulo 16 for
//! noise. Timer deltas too large for a signed byte are split into coarse
//! steps of 16 (`hi_pitch`) and a fine remainder (`pitch`).

mod noise;
mod pulse;
mod triangle;


pub use noise::NoiseExporter;
pub use pulse::PulseExporter;
pub use triangle::TriangleExporter;

use chipfit_backend_synth::{pitch_to_timer, Tuning};
use chipfit_spec::{ChannelKind, Clock, Config, Instruction};
use serde::{Deserialize, Serialize};

use crate::error::{ReconstructError, ReconstructResult};

/// Step of the coarse pitch envelope in timer units.
pub const HI_PITCH_STEP: i32 = 16;

/// Per-frame tracks before trimming.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelData {
    /// Volume, zero while off.
    pub volume: Vec<i32>,
    /// Timer register (or noise period) per frame, held while off.
    pub timer: Vec<i32>,
    /// Duty index (or noise mode) per frame, zero while off.
    pub duty: Vec<i32>,
    /// Register value the instrument starts at.
    pub initial_pitch: u16,
}

impl ChannelData {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.volume.len()
    }

    /// Whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.volume.is_empty()
    }

    fn push(&mut self, volume: i32, timer: i32, duty: i32) {
        self.volume.push(volume);
        self.timer.push(timer);
        self.duty.push(duty);
    }
}

/// Trimmed envelopes of one channel, laid out like the instrument file's
/// five sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Volume envelope.
    pub volume: Vec<i32>,
    /// Difference-coded pitch (timer deltas, or noise period deltas mod 16).
    pub arpeggio: Vec<i32>,
    /// Fine timer deltas when the deltas were split.
    pub pitch: Option<Vec<i32>>,
    /// Coarse timer deltas in steps of [`HI_PITCH_STEP`].
    pub hi_pitch: Option<Vec<i32>>,
    /// Duty (pulse) or mode (noise) envelope.
    pub duty: Option<Vec<i32>>,
    /// Register value the deltas are relative to.
    pub initial_pitch: u16,
}

/// Values the exporters need from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExportContext {
    /// Divider clock.
    pub clock: Clock,
    /// Tuning of MIDI pitches.
    pub tuning: Tuning,
}

impl ExportContext {
    /// Context of a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            clock: config.general().clock,
            tuning: Tuning::from_config(config.frequency()),
        }
    }

    /// Register value a channel uses for `pitch`.
    pub fn timer(&self, kind: ChannelKind, pitch: u8) -> i32 {
        pitch_to_timer(kind, self.clock, &self.tuning, pitch) as i32
    }
}

/// Conversion of one channel's instructions into features.
pub trait Exporter: Send + Sync {
    /// Channel handled.
    fn kind(&self) -> ChannelKind;

    /// Walks the instructions into untrimmed tracks.
    fn extract_data(
        &self,
        instructions: &[Instruction],
        context: &ExportContext,
    ) -> ReconstructResult<ChannelData>;

    /// Trims the tracks into features.
    fn to_features(&self, data: ChannelData) -> Features;

    /// Both steps.
    fn export(
        &self,
        instructions: &[Instruction],
        context: &ExportContext,
    ) -> ReconstructResult<Features> {
        Ok(self.to_features(self.extract_data(instructions, context)?))
    }
}

static PULSE: PulseExporter = PulseExporter;
static TRIANGLE: TriangleExporter = TriangleExporter;
static NOISE: NoiseExporter = NoiseExporter;

/// Exporter for a channel.
pub fn exporter_for(kind: ChannelKind) -> &'static dyn Exporter {
    match kind {
        ChannelKind::Pulse => &PULSE,
        ChannelKind::Triangle => &TRIANGLE,
        ChannelKind::Noise => &NOISE,
    }
}

/// Exports instructions with the exporter of their channel.
pub fn export(
    kind: ChannelKind,
    instructions: &[Instruction],
    config: &Config,
) -> ReconstructResult<Features> {
    exporter_for(kind).export(instructions, &ExportContext::from_config(config))
}

/// Shared walk over the instructions of one channel.
///
/// `decode` returns `(volume, timer, duty)` of a sounding instruction, or
/// `None` when the instruction is off.
pub(crate) fn walk<F>(
    kind: ChannelKind,
    instructions: &[Instruction],
    decode: F,
) -> ReconstructResult<ChannelData>
where
    F: Fn(&Instruction) -> Option<(i32, i32, i32)>,
{
    if let Some(other) = instructions.iter().find(|i| i.kind() != kind) {
        return Err(ReconstructError::ChannelMismatch {
            expected: kind,
            found: other.kind(),
        });
    }

    let initial = instructions
        .iter()
        .find_map(|i| decode(i).map(|(_, timer, _)| timer))
        .unwrap_or(0);
    let mut data = ChannelData {
        initial_pitch: initial.clamp(0, u16::MAX as i32) as u16,
        ..ChannelData::default()
    };

    let mut held = initial;
    for instruction in instructions {
        match decode(instruction) {
            Some((volume, timer, duty)) => {
                held = timer;
                data.push(volume, timer, duty);
            }
            None => data.push(0, held, 0),
        }
    }
    if instructions.last().is_some_and(Instruction::is_on) {
        data.push(0, held, 0);
    }
    Ok(data)
}

/// Length kept by trimming: one frame past the last audible one, at least one.
pub fn trimmed_length(volume: &[i32]) -> usize {
    match volume.iter().rposition(|&v| v != 0) {
        Some(last) => (last + 2).min(volume.len()),
        None => 1,
    }
}

/// Differences of consecutive values, the first taken against `initial`.
pub fn difference_code(values: &[i32], initial: i32) -> Vec<i32> {
    let mut previous = initial;
    values
        .iter()
        .map(|&value| {
            let delta = value - previous;
            previous = value;
            delta
        })
        .collect()
}

/// Drops trailing zeros, keeping at least one value.
pub fn trim_trailing_zeros(mut values: Vec<i32>) -> Vec<i32> {
    let keep = values.iter().rposition(|&v| v != 0).map_or(1, |last| last + 1);
    values.truncate(keep);
    if values.is_empty() {
        values.push(0);
    }
    values
}

/// Cuts a track to `length`, padding with zeros if it is shorter.
pub(crate) fn fit(mut values: Vec<i32>, length: usize) -> Vec<i32> {
    values.resize(length, 0);
    values
}

/// Features of a pitched channel from timer tracks.
pub(crate) fn pitched_features(data: ChannelData, with_duty: bool) -> Features {
    let keep = trimmed_length(&data.volume);
    let deltas = fit(difference_code(&data.timer, data.initial_pitch as i32), keep);

    let (arpeggio, pitch, hi_pitch) = if deltas.iter().all(|d| (-127..=127).contains(d)) {
        (trim_trailing_zeros(deltas), None, None)
    } else {
        let hi: Vec<i32> = deltas.iter().map(|d| d / HI_PITCH_STEP).collect();
        let fine: Vec<i32> = deltas
            .iter()
            .zip(&hi)
            .map(|(d, h)| d - h * HI_PITCH_STEP)
            .collect();
        (
            vec![0],
            Some(trim_trailing_zeros(fine)),
            Some(trim_trailing_zeros(hi)),
        )
    };

    Features {
        volume: fit(data.volume, keep),
        arpeggio,
        pitch,
        hi_pitch,
        duty: with_duty.then(|| fit(data.duty, keep)),
        initial_pitch: data.initial_pitch,
    }
}

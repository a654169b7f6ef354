//! Noise channel exporter.

use chipfit_spec::{ChannelKind, Instruction};

use super::{
    difference_code, fit, trim_trailing_zeros, trimmed_length, walk, ChannelData, ExportContext,
    Exporter, Features,
};
use crate::error::ReconstructResult;

/// Period values wrap at the width of the noise period register.
const PERIOD_MODULUS: i32 = 16;

/// Exports noise instructions as period deltas and the short-mode flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseExporter;

impl Exporter for NoiseExporter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Noise
    }

    fn extract_data(
        &self,
        instructions: &[Instruction],
        _context: &ExportContext,
    ) -> ReconstructResult<ChannelData> {
        walk(ChannelKind::Noise, instructions, |instruction| match instruction {
            Instruction::Noise(n) if n.on => {
                Some((n.volume as i32, n.period as i32, n.short as i32))
            }
            _ => None,
        })
    }

    fn to_features(&self, data: ChannelData) -> Features {
        let keep = trimmed_length(&data.volume);
        let deltas = difference_code(&data.timer, data.initial_pitch as i32)
            .into_iter()
            .map(|d| d.rem_euclid(PERIOD_MODULUS))
            .collect();

        Features {
            volume: fit(data.volume, keep),
            arpeggio: trim_trailing_zeros(fit(deltas, keep)),
            pitch: None,
            hi_pitch: None,
            duty: Some(fit(data.duty, keep)),
            initial_pitch: data.initial_pitch,
        }
    }
}

//! Pulse channel exporter.

use chipfit_spec::{ChannelKind, Instruction};

use super::{pitched_features, walk, ChannelData, ExportContext, Exporter, Features};
use crate::error::ReconstructResult;

/// Exports pulse instructions with volume, timer deltas and duty.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseExporter;

impl Exporter for PulseExporter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Pulse
    }

    fn extract_data(
        &self,
        instructions: &[Instruction],
        context: &ExportContext,
    ) -> ReconstructResult<ChannelData> {
        walk(ChannelKind::Pulse, instructions, |instruction| match instruction {
            Instruction::Pulse(p) if p.on => Some((
                p.volume as i32,
                context.timer(ChannelKind::Pulse, p.pitch),
                p.duty as i32,
            )),
            _ => None,
        })
    }

    fn to_features(&self, data: ChannelData) -> Features {
        pitched_features(data, true)
    }
}

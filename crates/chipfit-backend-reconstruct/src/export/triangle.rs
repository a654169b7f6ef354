//! Triangle channel exporter.

use chipfit_spec::{ChannelKind, Instruction};

use super::{pitched_features, walk, ChannelData, ExportContext, Exporter, Features};
use crate::error::ReconstructResult;

/// Exports triangle instructions; the volume is a gate and there is no duty.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriangleExporter;

impl Exporter for TriangleExporter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Triangle
    }

    fn extract_data(
        &self,
        instructions: &[Instruction],
        context: &ExportContext,
    ) -> ReconstructResult<ChannelData> {
        walk(ChannelKind::Triangle, instructions, |instruction| match instruction {
            Instruction::Triangle(t) if t.on => Some((
                t.volume as i32,
                context.timer(ChannelKind::Triangle, t.pitch),
                0,
            )),
            _ => None,
        })
    }

    fn to_features(&self, data: ChannelData) -> Features {
        pitched_features(data, false)
    }
}

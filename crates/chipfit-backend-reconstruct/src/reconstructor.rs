//! Greedy frame-by-frame search over the library.
//!
//! For every frame the reconstructor scores silence and every library entry
//! of its channel at every volume the channel supports, and keeps the
//! cheapest. Each entry starts the frame at the phase the previous frame
//! ended at; with `find_best_phase` a grid of start phases is searched as
//! well and any jump is charged to the continuity term. With `reset_phase` a note
//! that follows a silent frame restarts at phase zero without penalty.
//!
//! Frames depend on the previous winner, so one signal is strictly
//! sequential. Independent signals run in parallel through
//! [`batch`](crate::batch).

use std::sync::Arc;

use chipfit_backend_synth::{Library, LibraryData, LibraryError, LibraryParams};
use chipfit_spec::{
    ChannelKind, Config, Instruction, NoiseInstruction, PulseInstruction, TriangleInstruction,
    MAX_VOLUME,
};
use chipfit_task::CancellationToken;
use tracing::{debug, info};

use crate::criterion::{Criterion, Fragment};
use crate::error::{ReconstructError, ReconstructResult};
use crate::state::{Candidate, FragmentReconstructionState, Reconstruction, ReconstructionState};

/// Volumes a channel can be set to while sounding.
pub fn channel_volumes(kind: ChannelKind) -> Vec<u8> {
    match kind {
        ChannelKind::Triangle => vec![MAX_VOLUME],
        ChannelKind::Pulse | ChannelKind::Noise => (1..=MAX_VOLUME).collect(),
    }
}

/// Instruction that plays a library entry at `volume`.
pub fn instruction_for(params: LibraryParams, volume: u8) -> Instruction {
    match params {
        LibraryParams::Pulse { pitch, duty } => Instruction::Pulse(PulseInstruction {
            on: true,
            pitch,
            volume,
            duty,
        }),
        LibraryParams::Triangle { pitch } => Instruction::Triangle(TriangleInstruction {
            on: true,
            pitch,
            volume,
        }),
        LibraryParams::Noise { period, short } => Instruction::Noise(NoiseInstruction {
            on: true,
            period,
            volume,
            short,
        }),
    }
}

/// Reconstructs signals on one channel from a loaded library.
#[derive(Debug, Clone)]
pub struct Reconstructor {
    config: Arc<Config>,
    kind: ChannelKind,
    library: Arc<LibraryData>,
    params: Vec<LibraryParams>,
    volumes: Vec<u8>,
    criterion: Criterion,
}

impl Reconstructor {
    /// Creates a reconstructor for `kind`.
    ///
    /// The library must have been built for this configuration and hold
    /// entries for the channel.
    pub fn new(
        config: Arc<Config>,
        library: Arc<LibraryData>,
        kind: ChannelKind,
    ) -> ReconstructResult<Self> {
        let key = Library::key_for(&config)?;
        if library.key() != &key {
            return Err(ReconstructError::invalid(format!(
                "library {} was built for another configuration (expected {})",
                library.key(),
                key
            )));
        }

        let params: Vec<LibraryParams> = library.entries_for(kind).map(|(p, _)| *p).collect();
        if params.is_empty() {
            return Err(LibraryError::NoData(format!("{} entries in library {}", kind, key)).into());
        }

        let criterion = Criterion::from_config(&config)?;
        Ok(Self {
            config,
            kind,
            library,
            params,
            volumes: channel_volumes(kind),
            criterion,
        })
    }

    /// Channel reconstructed.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Cost function in use.
    pub fn criterion(&self) -> &Criterion {
        &self.criterion
    }

    /// Samples per frame.
    pub fn frame_length(&self) -> usize {
        self.config.frame_length()
    }

    /// Frames needed to cover `samples` samples.
    pub fn frame_count(&self, samples: usize) -> usize {
        samples.div_ceil(self.frame_length())
    }

    /// Reconstructs a signal at the configured sample rate.
    pub fn reconstruct(&self, audio: &[f32]) -> ReconstructResult<Reconstruction> {
        self.reconstruct_with(audio, &CancellationToken::new())
    }

    /// Reconstructs a signal, checking `cancel` between frames.
    pub fn reconstruct_with(
        &self,
        audio: &[f32],
        cancel: &CancellationToken,
    ) -> ReconstructResult<Reconstruction> {
        let frames = self.frame_count(audio.len());
        let frame_length = self.frame_length();
        let mut state = ReconstructionState::new(self.kind);

        for frame in 0..frames {
            if cancel.is_cancelled() {
                debug!(channel = %self.kind, frame, "reconstruction cancelled");
                return Err(ReconstructError::Cancelled);
            }
            let target = self
                .criterion
                .analyse(self.criterion.window().extract(audio, frame * frame_length));
            let (winner, next_phase) = self.reconstruct_frame(&state, &target, frame)?;
            state.push(winner, next_phase);
        }

        let reconstruction = state.into_reconstruction();
        info!(
            channel = %self.kind,
            frames,
            cost = reconstruction.total_cost,
            "reconstruction finished"
        );
        Ok(reconstruction)
    }

    /// Searches one frame and returns the winner with the phase the next
    /// frame continues from.
    pub fn reconstruct_frame(
        &self,
        state: &ReconstructionState,
        target: &Fragment,
        frame: usize,
    ) -> ReconstructResult<(Candidate, f64)> {
        let calculation = self.config.calculation();
        let restart = calculation.reset_phase && state.is_silent();
        let expected = if restart { 0.0 } else { state.phase() };
        let mut search = FragmentReconstructionState::new(frame, expected, calculation.tie_break);

        search.consider(Candidate {
            instruction: Instruction::off(self.kind),
            params: None,
            phase: expected,
            cost: self.criterion.silence_cost(target),
        });

        // The continued phase is always scored first; the grid only adds jumps.
        let mut phases = vec![expected];
        if calculation.find_best_phase {
            let steps = calculation.phase_steps.max(1);
            phases.extend(
                (0..steps)
                    .map(|k| k as f64 / steps as f64)
                    .filter(|&phase| phase != expected),
            );
        }

        for params in &self.params {
            let sample = self.library.get(params)?;
            for &phase in &phases {
                let candidate = self
                    .criterion
                    .analyse(sample.get_window(phase, self.criterion.window()));
                let continuity = if calculation.find_best_phase && !restart {
                    Criterion::continuity_penalty(expected, phase)
                } else {
                    0.0
                };
                for &volume in &self.volumes {
                    let gain = volume as f64 / MAX_VOLUME as f64;
                    search.consider(Candidate {
                        instruction: instruction_for(*params, volume),
                        params: Some(*params),
                        phase,
                        cost: self.criterion.cost(target, &candidate, gain, continuity),
                    });
                }
            }
        }

        let considered = search.considered();
        let winner = search
            .finish()
            .ok_or_else(|| ReconstructError::invalid("no candidate was scored"))?;
        let next_phase = match &winner.params {
            Some(params) => self
                .library
                .get(params)?
                .advance_phase(winner.phase, self.frame_length()),
            None => expected,
        };

        debug!(
            channel = %self.kind,
            frame,
            considered,
            cost = winner.cost.total,
            "frame decided"
        );
        Ok((winner, next_phase))
    }
}

//! Search state carried between and within frames.

use chipfit_backend_synth::LibraryParams;
use chipfit_spec::{ChannelKind, Instruction, TieBreak};
use serde::{Deserialize, Serialize};

use crate::criterion::Cost;

/// One scored choice for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Instruction the frame would emit.
    pub instruction: Instruction,
    /// Library entry played, `None` when silent.
    pub params: Option<LibraryParams>,
    /// Phase the entry starts the frame at.
    pub phase: f64,
    /// Cost against the target window.
    pub cost: Cost,
}

/// Transient state of one frame's search.
///
/// Holds the phase the previous frame ended at and the best candidate seen
/// so far. Only the winner and its continuation survive the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentReconstructionState {
    frame: usize,
    expected_phase: f64,
    tie_break: TieBreak,
    best: Option<Candidate>,
    considered: usize,
}

impl FragmentReconstructionState {
    /// Starts the search of `frame`, continuing from `expected_phase`.
    pub fn new(frame: usize, expected_phase: f64, tie_break: TieBreak) -> Self {
        Self {
            frame,
            expected_phase,
            tie_break,
            best: None,
            considered: 0,
        }
    }

    /// Frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Phase carried over from the previous frame.
    pub fn expected_phase(&self) -> f64 {
        self.expected_phase
    }

    /// Number of candidates scored.
    pub fn considered(&self) -> usize {
        self.considered
    }

    /// Best candidate so far.
    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// Scores a candidate, keeping it if it beats the current best.
    ///
    /// With [`TieBreak::First`] an equal cost keeps the earlier candidate;
    /// with [`TieBreak::Last`] it replaces it.
    pub fn consider(&mut self, candidate: Candidate) -> bool {
        self.considered += 1;
        let better = match &self.best {
            None => true,
            Some(best) => match self.tie_break {
                TieBreak::First => candidate.cost.total < best.cost.total,
                TieBreak::Last => candidate.cost.total <= best.cost.total,
            },
        };
        if better {
            self.best = Some(candidate);
        }
        better
    }

    /// Ends the search and yields the winner.
    pub fn finish(self) -> Option<Candidate> {
        self.best
    }
}

/// Accumulated result for one input signal on one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionState {
    kind: ChannelKind,
    instructions: Vec<Instruction>,
    frame_costs: Vec<f64>,
    total_cost: f64,
    phase: f64,
    current: Option<LibraryParams>,
}

impl ReconstructionState {
    /// Empty state for a channel.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            instructions: Vec::new(),
            frame_costs: Vec::new(),
            total_cost: 0.0,
            phase: 0.0,
            current: None,
        }
    }

    /// Channel being reconstructed.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Phase the next frame continues from.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Entry that sounded in the last frame.
    pub fn current(&self) -> Option<LibraryParams> {
        self.current
    }

    /// Whether the last frame was silent (or nothing was decided yet).
    pub fn is_silent(&self) -> bool {
        self.current.is_none()
    }

    /// Instructions decided so far.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of frames decided.
    pub fn frames(&self) -> usize {
        self.instructions.len()
    }

    /// Appends a frame's winner and the phase the next frame starts at.
    pub fn push(&mut self, winner: Candidate, next_phase: f64) {
        self.total_cost += winner.cost.total;
        self.frame_costs.push(winner.cost.total);
        self.instructions.push(winner.instruction);
        self.current = winner.params;
        self.phase = next_phase;
    }

    /// Finalizes into a reconstruction.
    pub fn into_reconstruction(self) -> Reconstruction {
        Reconstruction {
            kind: self.kind,
            instructions: self.instructions,
            frame_costs: self.frame_costs,
            total_cost: self.total_cost,
        }
    }
}

/// Instructions chosen for one signal, with their costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    /// Channel reconstructed.
    pub kind: ChannelKind,
    /// One instruction per frame.
    pub instructions: Vec<Instruction>,
    /// Winning cost of every frame.
    pub frame_costs: Vec<f64>,
    /// Sum of the frame costs.
    pub total_cost: f64,
}

impl Reconstruction {
    /// Mean cost per frame, zero for an empty reconstruction.
    pub fn mean_cost(&self) -> f64 {
        if self.instructions.is_empty() {
            0.0
        } else {
            self.total_cost / self.instructions.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipfit_spec::PulseInstruction;

    fn candidate(pitch: u8, total: f64) -> Candidate {
        Candidate {
            instruction: Instruction::Pulse(PulseInstruction {
                on: true,
                pitch,
                volume: 15,
                duty: 2,
            }),
            params: Some(LibraryParams::Pulse { pitch, duty: 2 }),
            phase: 0.0,
            cost: Cost {
                total,
                ..Cost::default()
            },
        }
    }

    #[test]
    fn test_tie_break_first_keeps_earlier() {
        let mut state = FragmentReconstructionState::new(0, 0.0, TieBreak::First);
        assert!(state.consider(candidate(60, 1.0)));
        assert!(!state.consider(candidate(61, 1.0)));
        assert!(state.consider(candidate(62, 0.5)));
        assert!(!state.consider(candidate(63, 0.7)));
        assert_eq!(state.considered(), 4);
        assert_eq!(state.finish().unwrap().params, Some(LibraryParams::Pulse { pitch: 62, duty: 2 }));
    }

    #[test]
    fn test_tie_break_last_replaces_equal() {
        let mut state = FragmentReconstructionState::new(0, 0.0, TieBreak::Last);
        state.consider(candidate(60, 1.0));
        state.consider(candidate(61, 1.0));
        assert_eq!(
            state.best().unwrap().params,
            Some(LibraryParams::Pulse { pitch: 61, duty: 2 })
        );
    }

    #[test]
    fn test_reconstruction_state_accumulates() {
        let mut state = ReconstructionState::new(ChannelKind::Pulse);
        assert!(state.is_silent());
        state.push(candidate(60, 1.5), 0.25);
        state.push(candidate(60, 0.5), 0.5);
        assert_eq!(state.frames(), 2);
        assert_eq!(state.phase(), 0.5);
        assert!(!state.is_silent());

        let reconstruction = state.into_reconstruction();
        assert_eq!(reconstruction.frame_costs, vec![1.5, 0.5]);
        assert_eq!(reconstruction.total_cost, 2.0);
        assert_eq!(reconstruction.mean_cost(), 1.0);
    }
}

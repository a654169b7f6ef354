//! Per-frame channel instructions.
//!
//! One instruction describes what a single 2A03-style channel does for one
//! frame: whether it sounds, at which pitch (or noise period), how loud, and
//! the channel-specific parameter.

use serde::{Deserialize, Serialize};

/// Highest hardware volume level.
pub const MAX_VOLUME: u8 = 15;

/// Sound generator channel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Pulse channel with four duty cycles.
    Pulse,
    /// Triangle channel (fixed volume).
    Triangle,
    /// LFSR noise channel.
    Noise,
}

impl ChannelKind {
    /// Returns the channel kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Pulse => "pulse",
            ChannelKind::Triangle => "triangle",
            ChannelKind::Noise => "noise",
        }
    }

    /// Returns all channel kinds.
    pub fn all() -> &'static [ChannelKind] {
        &[ChannelKind::Pulse, ChannelKind::Triangle, ChannelKind::Noise]
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pulse" => Ok(ChannelKind::Pulse),
            "triangle" => Ok(ChannelKind::Triangle),
            "noise" => Ok(ChannelKind::Noise),
            _ => Err(format!("unknown channel kind: {}", s)),
        }
    }
}

/// Pulse channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PulseInstruction {
    /// Whether the channel sounds.
    pub on: bool,
    /// MIDI pitch.
    pub pitch: u8,
    /// Volume (0-15).
    pub volume: u8,
    /// Duty cycle index (0-3).
    pub duty: u8,
}

/// Triangle channel frame.
///
/// The triangle has no volume control; `volume` is either 0 or [`MAX_VOLUME`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriangleInstruction {
    /// Whether the channel sounds.
    pub on: bool,
    /// MIDI pitch.
    pub pitch: u8,
    /// Gate volume.
    pub volume: u8,
}

/// Noise channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoiseInstruction {
    /// Whether the channel sounds.
    pub on: bool,
    /// Noise period index (0-15).
    pub period: u8,
    /// Volume (0-15).
    pub volume: u8,
    /// Short (93-step) LFSR mode.
    pub short: bool,
}

/// One frame of channel output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Instruction {
    /// Pulse frame.
    Pulse(PulseInstruction),
    /// Triangle frame.
    Triangle(TriangleInstruction),
    /// Noise frame.
    Noise(NoiseInstruction),
}

impl Instruction {
    /// A silent frame for the given channel.
    pub fn off(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Pulse => Instruction::Pulse(PulseInstruction::default()),
            ChannelKind::Triangle => Instruction::Triangle(TriangleInstruction::default()),
            ChannelKind::Noise => Instruction::Noise(NoiseInstruction::default()),
        }
    }

    /// The channel this instruction drives.
    pub fn kind(&self) -> ChannelKind {
        match self {
            Instruction::Pulse(_) => ChannelKind::Pulse,
            Instruction::Triangle(_) => ChannelKind::Triangle,
            Instruction::Noise(_) => ChannelKind::Noise,
        }
    }

    /// Whether the channel sounds during this frame.
    pub fn is_on(&self) -> bool {
        match self {
            Instruction::Pulse(p) => p.on,
            Instruction::Triangle(t) => t.on,
            Instruction::Noise(n) => n.on,
        }
    }

    /// Effective volume: zero when off.
    pub fn volume(&self) -> u8 {
        if !self.is_on() {
            return 0;
        }
        match self {
            Instruction::Pulse(p) => p.volume,
            Instruction::Triangle(t) => t.volume,
            Instruction::Noise(n) => n.volume,
        }
    }
}

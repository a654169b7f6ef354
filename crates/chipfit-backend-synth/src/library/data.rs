//! Library entries and their parameter tuples.

use std::collections::BTreeMap;
use std::fmt;

use chipfit_spec::{ChannelKind, Config, LibraryKey};

use crate::cyclic::CyclicArray;
use crate::error::{LibraryError, LibraryResult, SynthResult};
use crate::note::Tuning;
use crate::timer::{LfsrTimer, PhaseTimer, Timer, TimerParams};

/// Parameter tuple identifying one library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LibraryParams {
    /// Pulse channel at a MIDI pitch with a duty index.
    Pulse {
        /// MIDI pitch.
        pitch: u8,
        /// Duty index 0..=3.
        duty: u8,
    },
    /// Triangle channel at a MIDI pitch.
    Triangle {
        /// MIDI pitch.
        pitch: u8,
    },
    /// Noise channel at a period index and feedback mode.
    Noise {
        /// Period index 0..=15.
        period: u8,
        /// Short (93-step) feedback mode.
        short: bool,
    },
}

impl LibraryParams {
    /// Channel this entry belongs to.
    pub fn kind(&self) -> ChannelKind {
        match self {
            LibraryParams::Pulse { .. } => ChannelKind::Pulse,
            LibraryParams::Triangle { .. } => ChannelKind::Triangle,
            LibraryParams::Noise { .. } => ChannelKind::Noise,
        }
    }

    /// Every entry a configuration asks for, sorted.
    ///
    /// Only the configured generators contribute: pitches times duties for
    /// pulse, pitches for triangle, periods times both feedback modes for noise.
    pub fn enumerate(config: &Config) -> Vec<Self> {
        let generation = config.generation();
        let mut params = Vec::new();
        for kind in config.generators() {
            match kind {
                ChannelKind::Pulse => {
                    for pitch in config.pitches() {
                        for &duty in &generation.pulse_duties {
                            params.push(LibraryParams::Pulse { pitch, duty });
                        }
                    }
                }
                ChannelKind::Triangle => {
                    params.extend(config.pitches().map(|pitch| LibraryParams::Triangle { pitch }));
                }
                ChannelKind::Noise => {
                    for &period in &generation.noise_periods {
                        for short in [false, true] {
                            params.push(LibraryParams::Noise { period, short });
                        }
                    }
                }
            }
        }
        params.sort();
        params.dedup();
        params
    }

    /// Builds the timer that plays this entry.
    pub fn create_timer(
        &self,
        timer_params: TimerParams,
        tuning: &Tuning,
    ) -> SynthResult<Box<dyn Timer + Send>> {
        Ok(match *self {
            LibraryParams::Pulse { pitch, duty } => {
                let mut timer = PhaseTimer::pulse(timer_params, duty)?;
                timer.set_frequency(tuning.frequency(pitch));
                Box::new(timer)
            }
            LibraryParams::Triangle { pitch } => {
                let mut timer = PhaseTimer::triangle(timer_params);
                timer.set_frequency(tuning.frequency(pitch));
                Box::new(timer)
            }
            LibraryParams::Noise { period, short } => {
                Box::new(LfsrTimer::new(timer_params, period, short)?)
            }
        })
    }

    /// Synthesizes the cyclic sample for this entry.
    pub fn synthesize(&self, config: &Config) -> SynthResult<CyclicArray> {
        let generation = config.generation();
        let tuning = Tuning::from_config(config.frequency());
        let mut timer = self.create_timer(TimerParams::from_config(config), &tuning)?;
        timer.generate_sample(generation.min_duration, generation.max_duration)
    }

    /// Binary tag and two parameter bytes.
    pub(crate) fn to_parts(self) -> (u8, u8, u8) {
        match self {
            LibraryParams::Pulse { pitch, duty } => (0, pitch, duty),
            LibraryParams::Triangle { pitch } => (1, pitch, 0),
            LibraryParams::Noise { period, short } => (2, period, short as u8),
        }
    }

    /// Inverse of `to_parts`; `None` for values no entry can hold.
    pub(crate) fn from_parts(tag: u8, a: u8, b: u8) -> Option<Self> {
        match (tag, a, b) {
            (0, pitch, duty) if pitch <= 127 && duty <= 3 => Some(LibraryParams::Pulse { pitch, duty }),
            (1, pitch, 0) if pitch <= 127 => Some(LibraryParams::Triangle { pitch }),
            (2, period, short) if period <= 15 && short <= 1 => Some(LibraryParams::Noise {
                period,
                short: short == 1,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for LibraryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryParams::Pulse { pitch, duty } => write!(f, "pulse:{}:{}", pitch, duty),
            LibraryParams::Triangle { pitch } => write!(f, "triangle:{}", pitch),
            LibraryParams::Noise { period, short } => {
                write!(f, "noise:{}:{}", period, if *short { "short" } else { "long" })
            }
        }
    }
}

/// Configuration values stored alongside the entries.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryMetadata {
    /// Sample rate of every entry.
    pub sample_rate: u32,
    /// Frames per second the library was built for.
    pub change_rate: u32,
    /// Tuning reference pitch.
    pub reference_pitch: u8,
    /// Tuning reference frequency.
    pub reference_frequency: f64,
    /// Warp shape parameter.
    pub transformation_gamma: f64,
    /// Analysis window length.
    pub window_size: u32,
}

impl LibraryMetadata {
    /// Metadata describing a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.general().sample_rate,
            change_rate: config.general().change_rate,
            reference_pitch: config.frequency().reference_pitch,
            reference_frequency: config.frequency().reference_frequency,
            transformation_gamma: config.generation().transformation_gamma,
            window_size: config.generation().window_size as u32,
        }
    }
}

/// Immutable set of cyclic samples built for one library key.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryData {
    key: LibraryKey,
    metadata: LibraryMetadata,
    entries: BTreeMap<LibraryParams, CyclicArray>,
}

impl LibraryData {
    /// Assembles library data.
    pub fn new(
        key: LibraryKey,
        metadata: LibraryMetadata,
        entries: BTreeMap<LibraryParams, CyclicArray>,
    ) -> Self {
        Self {
            key,
            metadata,
            entries,
        }
    }

    /// Key the data was built under.
    pub fn key(&self) -> &LibraryKey {
        &self.key
    }

    /// Stored configuration values.
    pub fn metadata(&self) -> &LibraryMetadata {
        &self.metadata
    }

    /// Looks up one entry.
    pub fn get(&self, params: &LibraryParams) -> LibraryResult<&CyclicArray> {
        self.entries
            .get(params)
            .ok_or_else(|| LibraryError::NoData(format!("{} in library {}", params, self.key)))
    }

    /// Whether an entry exists.
    pub fn contains(&self, params: &LibraryParams) -> bool {
        self.entries.contains_key(params)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (&LibraryParams, &CyclicArray)> {
        self.entries.iter()
    }

    /// Entries of one channel in parameter order.
    pub fn entries_for(
        &self,
        kind: ChannelKind,
    ) -> impl Iterator<Item = (&LibraryParams, &CyclicArray)> {
        self.entries
            .iter()
            .filter(move |(params, _)| params.kind() == kind)
    }
}

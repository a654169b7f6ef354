//! FTI instrument writer.
//!
//! Layout (little-endian):
//!
//! ```text
//! "FTI" "2.4"  u8 type=1  u32 name_len  name
//! i8 sequence_count=5
//! per sequence [volume, arpeggio, pitch, hi_pitch, duty]:
//!   i8 enabled; if enabled: u32 length, i32 loop, i32 release, u32 setting, i8[length]
//! u32 dpcm_assignments=0  u32 dpcm_samples=0
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::export::Features;

/// File magic.
pub const FTI_MAGIC: &[u8; 3] = b"FTI";
/// Format version tag.
pub const FTI_VERSION: &[u8; 3] = b"2.4";
/// Instrument type of a 2A03 instrument.
pub const INSTRUMENT_TYPE_2A03: u8 = 1;
/// Number of sequence slots.
pub const SEQUENCE_COUNT: usize = 5;
/// Loop and release point meaning "none".
pub const NO_POINT: i32 = -1;
/// Arpeggio setting for relative (delta) values.
pub const ARPEGGIO_RELATIVE: u32 = 2;

/// Slot of a sequence in the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceSlot {
    Volume,
    Arpeggio,
    Pitch,
    HiPitch,
    Duty,
}

impl SequenceSlot {
    /// All slots in file order.
    pub const ALL: [SequenceSlot; SEQUENCE_COUNT] = [
        SequenceSlot::Volume,
        SequenceSlot::Arpeggio,
        SequenceSlot::Pitch,
        SequenceSlot::HiPitch,
        SequenceSlot::Duty,
    ];

    /// Default setting value written for the slot.
    pub fn default_setting(&self) -> u32 {
        match self {
            SequenceSlot::Arpeggio => ARPEGGIO_RELATIVE,
            _ => 0,
        }
    }
}

/// One envelope sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Values, written truncated to a signed byte.
    pub values: Vec<i32>,
    /// Loop point, [`NO_POINT`] for none.
    pub loop_point: i32,
    /// Release point, [`NO_POINT`] for none.
    pub release_point: i32,
    /// Slot-specific setting.
    pub setting: u32,
}

impl Sequence {
    /// A sequence without loop or release.
    pub fn new(values: Vec<i32>, setting: u32) -> Self {
        Self {
            values,
            loop_point: NO_POINT,
            release_point: NO_POINT,
            setting,
        }
    }

    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.values.len() as u32)?;
        writer.write_i32::<LittleEndian>(self.loop_point)?;
        writer.write_i32::<LittleEndian>(self.release_point)?;
        writer.write_u32::<LittleEndian>(self.setting)?;
        for &value in &self.values {
            writer.write_i8(value as i8)?;
        }
        Ok(())
    }
}

/// A 2A03 instrument with its five optional sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    /// Instrument name.
    pub name: String,
    /// Sequences in [`SequenceSlot::ALL`] order.
    pub sequences: [Option<Sequence>; SEQUENCE_COUNT],
}

impl Instrument {
    /// An instrument with no sequences.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequences: Default::default(),
        }
    }

    /// Instrument playing a channel's features.
    pub fn from_features(name: impl Into<String>, features: &Features) -> Self {
        let mut instrument = Self::new(name);
        let tracks = [
            Some(&features.volume),
            Some(&features.arpeggio),
            features.pitch.as_ref(),
            features.hi_pitch.as_ref(),
            features.duty.as_ref(),
        ];
        for (slot, track) in SequenceSlot::ALL.iter().zip(tracks) {
            if let Some(values) = track {
                instrument.set(*slot, Sequence::new(values.clone(), slot.default_setting()));
            }
        }
        instrument
    }

    /// Sets the sequence of a slot.
    pub fn set(&mut self, slot: SequenceSlot, sequence: Sequence) {
        self.sequences[slot as usize] = Some(sequence);
    }

    /// Sequence of a slot.
    pub fn get(&self, slot: SequenceSlot) -> Option<&Sequence> {
        self.sequences[slot as usize].as_ref()
    }

    /// Writes the instrument.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(FTI_MAGIC)?;
        writer.write_all(FTI_VERSION)?;
        writer.write_u8(INSTRUMENT_TYPE_2A03)?;

        let name = self.name.as_bytes();
        writer.write_u32::<LittleEndian>(name.len() as u32)?;
        writer.write_all(name)?;

        writer.write_i8(SEQUENCE_COUNT as i8)?;
        for sequence in &self.sequences {
            match sequence {
                Some(sequence) => {
                    writer.write_i8(1)?;
                    sequence.write(writer)?;
                }
                None => writer.write_i8(0)?,
            }
        }

        // No DPCM assignments or samples.
        writer.write_u32::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(0)?;
        Ok(())
    }

    /// Writes the instrument to a byte vector.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }
}

/// Writes features as an instrument file.
pub fn write_fti(path: &Path, name: &str, features: &Features) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    Instrument::from_features(name, features).write(&mut writer)?;
    writer.flush()
}

//! Binary library file format.
//!
//! ```text
//! bytes  "CFLB"                magic
//! u16    format version
//! u8     key length, then the key as ASCII
//! u32    sample_rate
//! u32    change_rate
//! u8     reference_pitch
//! f64    reference_frequency
//! f64    transformation_gamma
//! u32    window_size
//! u32    entry count
//! repeat entry count times:
//!   u8   channel tag (0 pulse, 1 triangle, 2 noise)
//!   u8   pitch or period
//!   u8   duty or short flag
//!   u32  sample_rate
//!   f64  frequency
//!   u32  length
//!   f32[length] samples
//! ```
//!
//! All values are little-endian.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chipfit_spec::{LibraryKey, VersionError};

use super::data::{LibraryData, LibraryMetadata, LibraryParams};
use crate::cyclic::CyclicArray;
use crate::error::{LibraryError, LibraryResult};

/// File magic.
pub const LIBRARY_MAGIC: &[u8; 4] = b"CFLB";

/// Format version written by this build; any other version is rejected.
pub const LIBRARY_FORMAT_VERSION: u16 = 1;

/// Upper bound on samples per entry (ten minutes at the highest sample rate).
const MAX_ENTRY_SAMPLES: u32 = 192_000 * 600;

/// Writes library data.
pub fn write_library<W: Write>(writer: &mut W, data: &LibraryData) -> io::Result<()> {
    writer.write_all(LIBRARY_MAGIC)?;
    writer.write_u16::<LittleEndian>(LIBRARY_FORMAT_VERSION)?;

    let key = data.key().as_str().as_bytes();
    writer.write_u8(key.len() as u8)?;
    writer.write_all(key)?;

    let metadata = data.metadata();
    writer.write_u32::<LittleEndian>(metadata.sample_rate)?;
    writer.write_u32::<LittleEndian>(metadata.change_rate)?;
    writer.write_u8(metadata.reference_pitch)?;
    writer.write_f64::<LittleEndian>(metadata.reference_frequency)?;
    writer.write_f64::<LittleEndian>(metadata.transformation_gamma)?;
    writer.write_u32::<LittleEndian>(metadata.window_size)?;

    writer.write_u32::<LittleEndian>(data.len() as u32)?;
    for (params, sample) in data.iter() {
        let (tag, a, b) = params.to_parts();
        writer.write_u8(tag)?;
        writer.write_u8(a)?;
        writer.write_u8(b)?;
        writer.write_u32::<LittleEndian>(sample.sample_rate())?;
        writer.write_f64::<LittleEndian>(sample.frequency())?;
        writer.write_u32::<LittleEndian>(sample.len() as u32)?;
        for &value in sample.samples() {
            writer.write_f32::<LittleEndian>(value)?;
        }
    }

    Ok(())
}

/// Reads library data, rejecting other format versions.
pub fn read_library<R: Read>(reader: &mut R) -> LibraryResult<LibraryData> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != LIBRARY_MAGIC {
        return Err(LibraryError::invalid("not a chipfit library file"));
    }

    let version = reader.read_u16::<LittleEndian>()?;
    if version != LIBRARY_FORMAT_VERSION {
        return Err(VersionError::new(LIBRARY_FORMAT_VERSION, version).into());
    }

    let key_length = reader.read_u8()? as usize;
    let mut key = vec![0u8; key_length];
    reader.read_exact(&mut key)?;
    let key = std::str::from_utf8(&key)
        .ok()
        .and_then(LibraryKey::parse)
        .ok_or_else(|| LibraryError::invalid("malformed library key"))?;

    let metadata = LibraryMetadata {
        sample_rate: reader.read_u32::<LittleEndian>()?,
        change_rate: reader.read_u32::<LittleEndian>()?,
        reference_pitch: reader.read_u8()?,
        reference_frequency: reader.read_f64::<LittleEndian>()?,
        transformation_gamma: reader.read_f64::<LittleEndian>()?,
        window_size: reader.read_u32::<LittleEndian>()?,
    };

    let count = reader.read_u32::<LittleEndian>()?;
    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let tag = reader.read_u8()?;
        let a = reader.read_u8()?;
        let b = reader.read_u8()?;
        let params = LibraryParams::from_parts(tag, a, b).ok_or_else(|| {
            LibraryError::invalid(format!("unknown entry parameters ({}, {}, {})", tag, a, b))
        })?;

        let sample_rate = reader.read_u32::<LittleEndian>()?;
        let frequency = reader.read_f64::<LittleEndian>()?;
        let length = reader.read_u32::<LittleEndian>()?;
        if length > MAX_ENTRY_SAMPLES {
            return Err(LibraryError::invalid(format!(
                "entry {} claims {} samples",
                params, length
            )));
        }
        let mut samples = vec![0.0f32; length as usize];
        reader.read_f32_into::<LittleEndian>(&mut samples)?;

        let sample = CyclicArray::new(samples, sample_rate, frequency)
            .map_err(|e| LibraryError::invalid(format!("entry {}: {}", params, e)))?;
        if entries.insert(params, sample).is_some() {
            return Err(LibraryError::invalid(format!("duplicate entry {}", params)));
        }
    }

    Ok(LibraryData::new(key, metadata, entries))
}

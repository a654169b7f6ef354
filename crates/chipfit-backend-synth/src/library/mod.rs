//! Content-addressed sample library.
//!
//! A library holds one [`CyclicArray`](crate::cyclic::CyclicArray) for every
//! parameter tuple a configuration can ask for. It is stored as a single
//! `<key>.chlib` file in the library directory, where the key is derived from
//! the synthesis-relevant configuration fields and the analysis window.
//! Files are written once through a temporary file and an atomic rename; a
//! rebuild under the same key replaces the whole file.

mod codec;
mod creator;
mod data;

#[cfg(test)]
mod tests;

pub use codec::{read_library, write_library, LIBRARY_FORMAT_VERSION, LIBRARY_MAGIC};
pub use creator::{outcome_to_result, LibraryCreator};
pub use data::{LibraryData, LibraryMetadata, LibraryParams};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chipfit_spec::{Config, LibraryKey};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{LibraryError, LibraryResult};
use crate::window::Window;

/// File extension of library files.
pub const LIBRARY_EXTENSION: &str = "chlib";

/// Summary of a library directory.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryInfo {
    /// Directory inspected.
    pub directory: PathBuf,
    /// Keys of the stored libraries, sorted.
    pub keys: Vec<LibraryKey>,
    /// Combined size of the library files.
    pub total_size_bytes: u64,
}

impl LibraryInfo {
    /// Number of stored libraries.
    pub fn entry_count(&self) -> usize {
        self.keys.len()
    }
}

/// Directory of persisted libraries.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    directory: PathBuf,
}

impl Library {
    /// Library store rooted at `directory`. Nothing is created until a save.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Platform cache directory for libraries.
    pub fn default_directory() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("chipfit").join("library"))
    }

    /// Store named by the configuration, or the platform default.
    pub fn from_config(config: &Config) -> LibraryResult<Self> {
        config
            .library()
            .directory
            .clone()
            .or_else(Self::default_directory)
            .map(Self::new)
            .ok_or_else(|| {
                LibraryError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    "no cache directory on this platform; set library.directory",
                ))
            })
    }

    /// Directory holding the library files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Key for a configuration analysed through `window`.
    pub fn create_key(config: &Config, window: &Window) -> LibraryKey {
        LibraryKey::derive(config, &window.fingerprint())
    }

    /// Key for a configuration using its own analysis window.
    pub fn key_for(config: &Config) -> LibraryResult<LibraryKey> {
        let window = Window::from_config(config)?;
        Ok(Self::create_key(config, &window))
    }

    /// File a key is stored in.
    pub fn path_for(&self, key: &LibraryKey) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.as_str(), LIBRARY_EXTENSION))
    }

    /// Whether a library for the configuration is stored, without loading it.
    pub fn exists(&self, config: &Config) -> LibraryResult<bool> {
        let key = Self::key_for(config)?;
        Ok(self.path_for(&key).is_file())
    }

    /// Loads the library of a configuration.
    pub fn load(&self, config: &Config) -> LibraryResult<LibraryData> {
        let key = Self::key_for(config)?;
        self.load_key(&key)
    }

    /// Loads the library stored under `key`.
    ///
    /// A missing file is reported as [`LibraryError::NoData`]; a file written
    /// under another key or format version is rejected.
    pub fn load_key(&self, key: &LibraryKey) -> LibraryResult<LibraryData> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LibraryError::NoData(format!("key {}", key)));
            }
            Err(source) => return Err(LibraryError::Load { path, source }),
        };

        let mut reader = BufReader::new(file);
        let data = read_library(&mut reader).map_err(|e| match e {
            LibraryError::Io(source) => LibraryError::Load {
                path: path.clone(),
                source,
            },
            other => other,
        })?;

        if data.key() != key {
            return Err(LibraryError::invalid(format!(
                "{} holds library {}, expected {}",
                path.display(),
                data.key(),
                key
            )));
        }

        debug!(key = %key, entries = data.len(), "library loaded");
        Ok(data)
    }

    /// Persists library data under its key and returns the file written.
    pub fn save(&self, data: &LibraryData) -> LibraryResult<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(data.key());

        let mut file = NamedTempFile::new_in(&self.directory)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            write_library(&mut writer, data)?;
            writer.flush()?;
        }
        file.persist(&path).map_err(|e| e.error)?;

        info!(key = %data.key(), entries = data.len(), path = %path.display(), "library saved");
        Ok(path)
    }

    /// Lists the stored libraries.
    pub fn info(&self) -> LibraryResult<LibraryInfo> {
        let mut info = LibraryInfo {
            directory: self.directory.clone(),
            keys: Vec::new(),
            total_size_bytes: 0,
        };
        if !self.directory.exists() {
            return Ok(info);
        }

        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if let Some(key) = library_key_of(&entry.path()) {
                info.total_size_bytes += entry.metadata()?.len();
                info.keys.push(key);
            }
        }
        info.keys.sort();
        Ok(info)
    }

    /// Removes every stored library and returns how many were removed.
    pub fn clear(&self) -> LibraryResult<u64> {
        if !self.directory.exists() {
            return Ok(0);
        }

        let mut count = 0u64;
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if library_key_of(&path).is_some() {
                fs::remove_file(&path)?;
                count += 1;
            }
        }

        info!(directory = %self.directory.display(), count, "libraries cleared");
        Ok(count)
    }
}

/// Key of a library file path, if it names one.
fn library_key_of(path: &Path) -> Option<LibraryKey> {
    if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(LIBRARY_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(LibraryKey::parse)
}

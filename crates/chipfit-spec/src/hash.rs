//! Content-addressed library keys.
//!
//! A library key is derived from the configuration fields that change what
//! the library creator synthesizes, plus the analysis window fingerprint:
//!
//! ```text
//! library_key = hex(BLAKE3(canonical_fields))[..16]
//! ```
//!
//! Fields that only steer the search (loss weights, search flags, input
//! conditioning, library directory) do not take part.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Length of a library key in hex characters.
pub const LIBRARY_KEY_LENGTH: usize = 16;

/// Short content address of one library build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryKey(String);

impl LibraryKey {
    /// Derives the key for a configuration and window fingerprint.
    ///
    /// # Example
    /// ```
    /// use chipfit_spec::{Config, LibraryKey};
    ///
    /// let config = Config::default();
    /// let a = LibraryKey::derive(&config, "hann:1024:144");
    /// let b = LibraryKey::derive(&config, "hann:1024:144");
    /// assert_eq!(a, b);
    /// ```
    pub fn derive(config: &Config, window_fingerprint: &str) -> Self {
        let canonical = canonical_key_fields(config, window_fingerprint);
        let hash = blake3::hash(canonical.as_bytes()).to_hex();
        Self(hash.as_str()[..LIBRARY_KEY_LENGTH].to_string())
    }

    /// Wraps a key read back from storage, checking its shape.
    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.len() == LIBRARY_KEY_LENGTH
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(text.to_string()))
    }

    /// The key as a lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LibraryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds the canonical field string hashed into a key.
///
/// Floats are written as their IEEE-754 bit patterns so that the key does
/// not depend on float formatting.
pub fn canonical_key_fields(config: &Config, window_fingerprint: &str) -> String {
    let general = config.general();
    let frequency = config.frequency();
    let generation = config.generation();
    let generators: Vec<&str> = config.generators().iter().map(|g| g.as_str()).collect();

    format!(
        "sample_rate:{},change_rate:{},clock:{},reference_pitch:{},reference_frequency:{:016x},\
         pitches:{}-{},min_duration:{:016x},max_duration:{:016x},gamma:{:016x},\
         duties:{:?},noise_periods:{:?},generators:{},window:{}",
        general.sample_rate,
        general.change_rate,
        general.clock.as_str(),
        frequency.reference_pitch,
        frequency.reference_frequency.to_bits(),
        frequency.min_pitch,
        frequency.max_pitch,
        generation.min_duration.to_bits(),
        generation.max_duration.to_bits(),
        generation.transformation_gamma.to_bits(),
        generation.pulse_duties,
        generation.noise_periods,
        generators.join("+"),
        window_fingerprint,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Clock;

    const WINDOW: &str = "hann:1024:144";

    fn key_of(config: &Config) -> LibraryKey {
        LibraryKey::derive(config, WINDOW)
    }

    #[test]
    fn test_key_is_short_hex() {
        let key = key_of(&Config::default());
        assert_eq!(key.as_str().len(), LIBRARY_KEY_LENGTH);
        assert!(LibraryKey::parse(key.as_str()).is_some());
    }

    #[test]
    fn test_identical_fields_identical_key() {
        let a = Config::builder().sample_rate(48_000).build().unwrap();
        let b = Config::builder().sample_rate(48_000).build().unwrap();
        assert_eq!(key_of(&a), key_of(&b));
    }

    #[test]
    fn test_key_relevant_fields_change_key() {
        let base = key_of(&Config::default());
        let variants = [
            Config::builder().sample_rate(48_000).build().unwrap(),
            Config::builder().change_rate(50).build().unwrap(),
            Config::builder().tuning(69, 432.0).build().unwrap(),
            Config::builder().tuning(57, 440.0).build().unwrap(),
            Config::builder().transformation_gamma(2.0).build().unwrap(),
            Config::builder().clock(Clock::Pal).build().unwrap(),
        ];
        for config in &variants {
            assert_ne!(key_of(config), base, "{:?}", config);
        }
    }

    #[test]
    fn test_window_changes_key() {
        let config = Config::default();
        assert_ne!(
            LibraryKey::derive(&config, "hann:1024:144"),
            LibraryKey::derive(&config, "hann:2048:656")
        );
    }

    #[test]
    fn test_search_only_fields_keep_key() {
        let base = key_of(&Config::default());
        let config = Config::builder()
            .loss_weights(3.0, 0.5, 0.0)
            .find_best_phase(true)
            .fast_difference(true)
            .normalization(false, true)
            .library_directory("/elsewhere")
            .build()
            .unwrap();
        assert_eq!(key_of(&config), base);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(LibraryKey::parse("").is_none());
        assert!(LibraryKey::parse("0123456789ABCDEF").is_none());
        assert!(LibraryKey::parse("0123456789abcdeg").is_none());
        assert!(LibraryKey::parse("0123456789abcdef").is_some());
    }
}

//! Reconstruction configuration.
//!
//! A [`Config`] only exists in validated form: it is produced by
//! [`ConfigBuilder::build`], by [`Config::from_json`], or by converting a
//! [`RawConfig`] with `TryFrom`. It is never mutated afterwards; a changed
//! configuration is a new value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ErrorCode, ValidationError, ValidationResult};
use crate::instruction::ChannelKind;

/// Lowest accepted sample rate.
pub const MIN_SAMPLE_RATE: u32 = 8_000;
/// Highest accepted sample rate.
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Highest accepted frame (change) rate.
pub const MAX_CHANGE_RATE: u32 = 1_000;
/// Smallest analysis window.
pub const MIN_WINDOW_SIZE: usize = 16;
/// Largest analysis window.
pub const MAX_WINDOW_SIZE: usize = 65_536;
/// Largest phase search resolution.
pub const MAX_PHASE_STEPS: u32 = 256;

/// CPU clock the channel dividers run from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Clock {
    /// NTSC 2A03, 1.789773 MHz.
    #[default]
    Ntsc,
    /// PAL 2A07, 1.662607 MHz.
    Pal,
}

impl Clock {
    /// CPU clock rate in Hz.
    pub fn cpu_hz(&self) -> f64 {
        match self {
            Clock::Ntsc => 1_789_773.0,
            Clock::Pal => 1_662_607.0,
        }
    }

    /// Returns the clock as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Clock::Ntsc => "ntsc",
            Clock::Pal => "pal",
        }
    }
}

/// Rule for choosing between candidates of equal cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the first candidate found in enumeration order.
    #[default]
    First,
    /// Replace with the last candidate found.
    Last,
}

/// Sampling and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// Internal audio sample rate in Hz.
    pub sample_rate: u32,
    /// Instruction frames per second.
    pub change_rate: u32,
    /// Divider clock.
    pub clock: Clock,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            change_rate: 60,
            clock: Clock::Ntsc,
        }
    }
}

/// Pitch range and tuning reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrequencyConfig {
    /// Lowest MIDI pitch in the library.
    pub min_pitch: u8,
    /// Highest MIDI pitch in the library.
    pub max_pitch: u8,
    /// Reference MIDI pitch (A4 = 69).
    pub reference_pitch: u8,
    /// Frequency of the reference pitch in Hz.
    pub reference_frequency: f64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            min_pitch: 21,
            max_pitch: 108,
            reference_pitch: 69,
            reference_frequency: 440.0,
        }
    }
}

/// Library synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Minimum length of each cyclic sample in seconds.
    pub min_duration: f64,
    /// Maximum length of each cyclic sample in seconds.
    pub max_duration: f64,
    /// Analysis window length in samples.
    pub window_size: usize,
    /// Shape parameter of the amplitude warp.
    pub transformation_gamma: f64,
    /// Pulse duty indices to precompute.
    pub pulse_duties: Vec<u8>,
    /// Noise period indices to precompute.
    pub noise_periods: Vec<u8>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_duration: 0.1,
            max_duration: 1.0,
            window_size: 1024,
            transformation_gamma: 1.5,
            pulse_duties: vec![0, 1, 2, 3],
            noise_periods: (0..16).collect(),
        }
    }
}

/// Search behaviour flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculationConfig {
    /// Search the phase of every candidate instead of continuing the previous one.
    pub find_best_phase: bool,
    /// Use the strided, approximate distance.
    pub fast_difference: bool,
    /// Restart the phase at every note start.
    pub reset_phase: bool,
    /// Phase resolution of the best-phase search.
    pub phase_steps: u32,
    /// Equal-cost rule.
    pub tie_break: TieBreak,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            find_best_phase: false,
            fast_difference: false,
            reset_phase: false,
            phase_steps: 32,
            tie_break: TieBreak::First,
        }
    }
}

/// Criterion weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LossConfig {
    /// Weight of the warped spectral distance.
    pub spectral_loss_weight: f64,
    /// Weight of the sample-domain distance.
    pub temporal_loss_weight: f64,
    /// Weight of the phase-jump penalty.
    pub continuity_loss_weight: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            spectral_loss_weight: 1.0,
            temporal_loss_weight: 1.0,
            continuity_loss_weight: 0.1,
        }
    }
}

/// Input conditioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationConfig {
    /// Scale the input so its peak is 1.0.
    pub normalize_input: bool,
    /// Round the input to the 16-level DAC grid.
    pub quantize_input: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            normalize_input: true,
            quantize_input: false,
        }
    }
}

/// Library location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    /// Library directory; the platform cache directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_generators() -> Vec<ChannelKind> {
    vec![ChannelKind::Pulse]
}

/// Unvalidated configuration, as read from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    /// Sampling and timing.
    pub general: GeneralConfig,
    /// Pitch range and tuning.
    pub frequency: FrequencyConfig,
    /// Library synthesis.
    pub generation: GenerationConfig,
    /// Search flags.
    pub calculation: CalculationConfig,
    /// Criterion weights.
    pub loss: LossConfig,
    /// Input conditioning.
    pub normalization: NormalizationConfig,
    /// Channels to build and reconstruct.
    pub generators: Vec<ChannelKind>,
    /// Library location.
    pub library: LibraryConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            frequency: FrequencyConfig::default(),
            generation: GenerationConfig::default(),
            calculation: CalculationConfig::default(),
            loss: LossConfig::default(),
            normalization: NormalizationConfig::default(),
            generators: default_generators(),
            library: LibraryConfig::default(),
        }
    }
}

impl RawConfig {
    /// Validates every bounded field.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        validate_general(&self.general, &mut result);
        validate_frequency(&self.frequency, &mut result);
        validate_generation(&self.generation, &mut result);
        validate_calculation(&self.calculation, &mut result);
        validate_loss(&self.loss, &mut result);
        if self.generators.is_empty() {
            result.add_error(ValidationError::with_path(
                ErrorCode::EmptyList,
                "at least one generator is required",
                "generators",
            ));
        }
        check_unique(&self.generators, "generators", &mut result);
        result
    }
}

/// Validated, immutable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConfig", into = "RawConfig")]
pub struct Config {
    raw: RawConfig,
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        raw.validate().into_result().map_err(ConfigError::Invalid)?;
        Ok(Self { raw })
    }
}

impl From<Config> for RawConfig {
    fn from(config: Config) -> Self {
        config.raw
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw: RawConfig::default(),
        }
    }
}

impl Config {
    /// Starts a builder from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }

    /// Sampling and timing.
    pub fn general(&self) -> &GeneralConfig {
        &self.raw.general
    }

    /// Pitch range and tuning.
    pub fn frequency(&self) -> &FrequencyConfig {
        &self.raw.frequency
    }

    /// Library synthesis.
    pub fn generation(&self) -> &GenerationConfig {
        &self.raw.generation
    }

    /// Search flags.
    pub fn calculation(&self) -> &CalculationConfig {
        &self.raw.calculation
    }

    /// Criterion weights.
    pub fn loss(&self) -> &LossConfig {
        &self.raw.loss
    }

    /// Input conditioning.
    pub fn normalization(&self) -> &NormalizationConfig {
        &self.raw.normalization
    }

    /// Channels to build and reconstruct.
    pub fn generators(&self) -> &[ChannelKind] {
        &self.raw.generators
    }

    /// Library location.
    pub fn library(&self) -> &LibraryConfig {
        &self.raw.library
    }

    /// Samples per instruction frame (rounded down).
    pub fn frame_length(&self) -> usize {
        (self.raw.general.sample_rate / self.raw.general.change_rate) as usize
    }

    /// MIDI pitches covered by the library, inclusive.
    pub fn pitches(&self) -> std::ops::RangeInclusive<u8> {
        self.raw.frequency.min_pitch..=self.raw.frequency.max_pitch
    }

    /// Whether the channel is part of the configured generator set.
    pub fn has_generator(&self, kind: ChannelKind) -> bool {
        self.raw.generators.contains(&kind)
    }

    /// Returns a builder seeded with this configuration.
    pub fn to_builder(&self) -> ConfigBuilder {
        ConfigBuilder {
            raw: self.raw.clone(),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    /// Creates a builder holding the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sample rate.
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.raw.general.sample_rate = sample_rate;
        self
    }

    /// Sets the frame rate.
    pub fn change_rate(mut self, change_rate: u32) -> Self {
        self.raw.general.change_rate = change_rate;
        self
    }

    /// Sets the divider clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.raw.general.clock = clock;
        self
    }

    /// Sets the inclusive pitch range.
    pub fn pitch_range(mut self, min_pitch: u8, max_pitch: u8) -> Self {
        self.raw.frequency.min_pitch = min_pitch;
        self.raw.frequency.max_pitch = max_pitch;
        self
    }

    /// Sets the tuning reference.
    pub fn tuning(mut self, reference_pitch: u8, reference_frequency: f64) -> Self {
        self.raw.frequency.reference_pitch = reference_pitch;
        self.raw.frequency.reference_frequency = reference_frequency;
        self
    }

    /// Sets the cyclic sample duration bounds in seconds.
    pub fn durations(mut self, min_duration: f64, max_duration: f64) -> Self {
        self.raw.generation.min_duration = min_duration;
        self.raw.generation.max_duration = max_duration;
        self
    }

    /// Sets the analysis window length.
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.raw.generation.window_size = window_size;
        self
    }

    /// Sets the amplitude warp shape.
    pub fn transformation_gamma(mut self, gamma: f64) -> Self {
        self.raw.generation.transformation_gamma = gamma;
        self
    }

    /// Sets the pulse duty indices.
    pub fn pulse_duties(mut self, duties: Vec<u8>) -> Self {
        self.raw.generation.pulse_duties = duties;
        self
    }

    /// Sets the noise period indices.
    pub fn noise_periods(mut self, periods: Vec<u8>) -> Self {
        self.raw.generation.noise_periods = periods;
        self
    }

    /// Enables the per-candidate phase search.
    pub fn find_best_phase(mut self, enabled: bool) -> Self {
        self.raw.calculation.find_best_phase = enabled;
        self
    }

    /// Enables the approximate distance.
    pub fn fast_difference(mut self, enabled: bool) -> Self {
        self.raw.calculation.fast_difference = enabled;
        self
    }

    /// Enables phase reset at note starts.
    pub fn reset_phase(mut self, enabled: bool) -> Self {
        self.raw.calculation.reset_phase = enabled;
        self
    }

    /// Sets the phase search resolution.
    pub fn phase_steps(mut self, steps: u32) -> Self {
        self.raw.calculation.phase_steps = steps;
        self
    }

    /// Sets the equal-cost rule.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.raw.calculation.tie_break = tie_break;
        self
    }

    /// Sets the three criterion weights.
    pub fn loss_weights(mut self, spectral: f64, temporal: f64, continuity: f64) -> Self {
        self.raw.loss = LossConfig {
            spectral_loss_weight: spectral,
            temporal_loss_weight: temporal,
            continuity_loss_weight: continuity,
        };
        self
    }

    /// Sets the input conditioning flags.
    pub fn normalization(mut self, normalize_input: bool, quantize_input: bool) -> Self {
        self.raw.normalization = NormalizationConfig {
            normalize_input,
            quantize_input,
        };
        self
    }

    /// Sets the generator set.
    pub fn generators(mut self, generators: Vec<ChannelKind>) -> Self {
        self.raw.generators = generators;
        self
    }

    /// Sets the library directory.
    pub fn library_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.raw.library.directory = Some(directory.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        Config::try_from(self.raw)
    }
}

fn out_of_range(message: String, path: &str) -> ValidationError {
    ValidationError::with_path(ErrorCode::OutOfRange, message, path)
}

fn check_finite(value: f64, path: &str, result: &mut ValidationResult) -> bool {
    if value.is_finite() {
        true
    } else {
        result.add_error(ValidationError::with_path(
            ErrorCode::NotFinite,
            format!("{} must be finite, got {}", path, value),
            path,
        ));
        false
    }
}

fn check_unique<T: PartialEq + std::fmt::Debug>(
    values: &[T],
    path: &str,
    result: &mut ValidationResult,
) {
    for (i, value) in values.iter().enumerate() {
        if values[..i].contains(value) {
            result.add_error(ValidationError::with_path(
                ErrorCode::DuplicateValue,
                format!("{:?} appears more than once", value),
                path,
            ));
            return;
        }
    }
}

fn validate_general(general: &GeneralConfig, result: &mut ValidationResult) {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&general.sample_rate) {
        result.add_error(out_of_range(
            format!(
                "sample_rate must be in {}..={}, got {}",
                MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, general.sample_rate
            ),
            "general.sample_rate",
        ));
    }
    if general.change_rate == 0
        || general.change_rate > MAX_CHANGE_RATE
        || general.change_rate >= general.sample_rate
    {
        result.add_error(out_of_range(
            format!(
                "change_rate must be in 1..={} and below the sample rate, got {}",
                MAX_CHANGE_RATE, general.change_rate
            ),
            "general.change_rate",
        ));
    }
}

fn validate_frequency(frequency: &FrequencyConfig, result: &mut ValidationResult) {
    for (value, path) in [
        (frequency.min_pitch, "frequency.min_pitch"),
        (frequency.max_pitch, "frequency.max_pitch"),
        (frequency.reference_pitch, "frequency.reference_pitch"),
    ] {
        if value > 127 {
            result.add_error(out_of_range(
                format!("pitch must be in 0..=127, got {}", value),
                path,
            ));
        }
    }
    if frequency.min_pitch > frequency.max_pitch {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvertedRange,
            format!(
                "min_pitch {} is above max_pitch {}",
                frequency.min_pitch, frequency.max_pitch
            ),
            "frequency",
        ));
    }
    if check_finite(
        frequency.reference_frequency,
        "frequency.reference_frequency",
        result,
    ) && frequency.reference_frequency <= 0.0
    {
        result.add_error(out_of_range(
            format!(
                "reference_frequency must be positive, got {}",
                frequency.reference_frequency
            ),
            "frequency.reference_frequency",
        ));
    }
}

fn validate_generation(generation: &GenerationConfig, result: &mut ValidationResult) {
    let min_ok = check_finite(generation.min_duration, "generation.min_duration", result);
    let max_ok = check_finite(generation.max_duration, "generation.max_duration", result);
    if min_ok && generation.min_duration <= 0.0 {
        result.add_error(out_of_range(
            format!(
                "min_duration must be positive, got {}",
                generation.min_duration
            ),
            "generation.min_duration",
        ));
    }
    if min_ok && max_ok && generation.min_duration > generation.max_duration {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvertedRange,
            format!(
                "min_duration {} is above max_duration {}",
                generation.min_duration, generation.max_duration
            ),
            "generation",
        ));
    }
    if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&generation.window_size) {
        result.add_error(out_of_range(
            format!(
                "window_size must be in {}..={}, got {}",
                MIN_WINDOW_SIZE, MAX_WINDOW_SIZE, generation.window_size
            ),
            "generation.window_size",
        ));
    }
    if check_finite(
        generation.transformation_gamma,
        "generation.transformation_gamma",
        result,
    ) && generation.transformation_gamma <= 0.0
    {
        result.add_error(out_of_range(
            format!(
                "transformation_gamma must be positive, got {}",
                generation.transformation_gamma
            ),
            "generation.transformation_gamma",
        ));
    }

    if generation.pulse_duties.is_empty() {
        result.add_error(ValidationError::with_path(
            ErrorCode::EmptyList,
            "at least one pulse duty is required",
            "generation.pulse_duties",
        ));
    }
    if let Some(duty) = generation.pulse_duties.iter().find(|d| **d > 3) {
        result.add_error(out_of_range(
            format!("pulse duty must be in 0..=3, got {}", duty),
            "generation.pulse_duties",
        ));
    }
    check_unique(&generation.pulse_duties, "generation.pulse_duties", result);

    if generation.noise_periods.is_empty() {
        result.add_error(ValidationError::with_path(
            ErrorCode::EmptyList,
            "at least one noise period is required",
            "generation.noise_periods",
        ));
    }
    if let Some(period) = generation.noise_periods.iter().find(|p| **p > 15) {
        result.add_error(out_of_range(
            format!("noise period must be in 0..=15, got {}", period),
            "generation.noise_periods",
        ));
    }
    check_unique(&generation.noise_periods, "generation.noise_periods", result);
}

fn validate_calculation(calculation: &CalculationConfig, result: &mut ValidationResult) {
    if calculation.phase_steps == 0 || calculation.phase_steps > MAX_PHASE_STEPS {
        result.add_error(out_of_range(
            format!(
                "phase_steps must be in 1..={}, got {}",
                MAX_PHASE_STEPS, calculation.phase_steps
            ),
            "calculation.phase_steps",
        ));
    }
}

fn validate_loss(loss: &LossConfig, result: &mut ValidationResult) {
    let weights = [
        (loss.spectral_loss_weight, "loss.spectral_loss_weight"),
        (loss.temporal_loss_weight, "loss.temporal_loss_weight"),
        (loss.continuity_loss_weight, "loss.continuity_loss_weight"),
    ];
    let mut all_valid = true;
    for (weight, path) in weights {
        if !check_finite(weight, path, result) {
            all_valid = false;
        } else if weight < 0.0 {
            all_valid = false;
            result.add_error(out_of_range(
                format!("loss weight must not be negative, got {}", weight),
                path,
            ));
        }
    }
    if all_valid && weights.iter().all(|(w, _)| *w == 0.0) {
        result.add_error(ValidationError::with_path(
            ErrorCode::NoLossWeight,
            "at least one loss weight must be positive",
            "loss",
        ));
    }
}

//! Pitch and frequency conversion against a configurable tuning reference.

mod frequency;


pub use frequency::{frequency_to_pitch, nearest_pitch, pitch_to_frequency, Tuning};

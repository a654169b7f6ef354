//! Analysis window: envelope, frame alignment and amplitude warp.
//!
//! Every comparison between target audio and a library entry happens on a
//! window of `size` samples whose frame starts `left_offset` samples in, so
//! that the frame being decided sits under the middle of the envelope.

mod warp;

pub use warp::{
    general_derivative, general_interpolation, general_inverse, Warp, NEWTON_ITERATIONS,
    SPECTRAL_GAIN,
};

use std::f64::consts::PI;

use chipfit_spec::Config;

use crate::error::{SynthError, SynthResult};

/// Fixed-size Hann envelope plus the amplitude warp used on spectra.
#[derive(Debug, Clone)]
pub struct Window {
    size: usize,
    left_offset: usize,
    envelope: Vec<f32>,
    warp: Warp,
}

impl Window {
    /// Creates a window of `size` samples centred on frames of `frame_length`.
    pub fn new(size: usize, frame_length: usize, gamma: f64) -> SynthResult<Self> {
        if size < 2 {
            return Err(SynthError::invalid_param(
                "window_size",
                format!("must be at least 2, got {}", size),
            ));
        }
        if frame_length == 0 {
            return Err(SynthError::invalid_param("frame_length", "must be positive"));
        }

        Ok(Self {
            size,
            left_offset: size.saturating_sub(frame_length) / 2,
            envelope: hann(size),
            warp: Warp::new(gamma)?,
        })
    }

    /// Creates the window a configuration describes.
    pub fn from_config(config: &Config) -> SynthResult<Self> {
        let generation = config.generation();
        Self::new(
            generation.window_size,
            config.frame_length(),
            generation.transformation_gamma,
        )
    }

    /// Window length in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Samples between the window start and the frame start.
    pub fn left_offset(&self) -> usize {
        self.left_offset
    }

    /// Envelope coefficients.
    pub fn envelope(&self) -> &[f32] {
        &self.envelope
    }

    /// Amplitude warp.
    pub fn warp(&self) -> &Warp {
        &self.warp
    }

    /// Shape descriptor folded into library keys.
    pub fn fingerprint(&self) -> String {
        format!("hann:{}:{}", self.size, self.left_offset)
    }

    /// Multiplies a fragment element-wise by the envelope.
    pub fn apply(&self, fragment: &[f32]) -> Vec<f32> {
        fragment
            .iter()
            .zip(&self.envelope)
            .map(|(sample, gain)| sample * gain)
            .collect()
    }

    /// Windowed excerpt of `signal` for the frame starting at `frame_start`.
    ///
    /// Positions before the start or past the end of the signal read as silence.
    pub fn extract(&self, signal: &[f32], frame_start: usize) -> Vec<f32> {
        let start = frame_start as i64 - self.left_offset as i64;
        (0..self.size)
            .map(|i| {
                let position = start + i as i64;
                let sample = if position >= 0 && (position as usize) < signal.len() {
                    signal[position as usize]
                } else {
                    0.0
                };
                sample * self.envelope[i]
            })
            .collect()
    }
}

fn hann(size: usize) -> Vec<f32> {
    let denominator = (size - 1) as f64;
    (0..size)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / denominator).cos())) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_offset_centres_frame() {
        let window = Window::new(1024, 735, 1.5).unwrap();
        assert_eq!(window.left_offset(), 144);
        assert_eq!(window.fingerprint(), "hann:1024:144");

        // Frames longer than the window start at the window start.
        let short = Window::new(256, 735, 1.5).unwrap();
        assert_eq!(short.left_offset(), 0);
    }

    #[test]
    fn test_hann_envelope_shape() {
        let window = Window::new(65, 32, 1.5).unwrap();
        let envelope = window.envelope();
        assert!(envelope[0].abs() < 1e-6);
        assert!(envelope[64].abs() < 1e-6);
        assert!((envelope[32] - 1.0).abs() < 1e-6);
        assert!((envelope[10] - envelope[54]).abs() < 1e-6);
    }

    #[test]
    fn test_extract_zero_pads_outside_signal() {
        let window = Window::new(16, 8, 1.5).unwrap();
        let signal = vec![1.0f32; 8];
        let excerpt = window.extract(&signal, 0);
        assert_eq!(excerpt.len(), 16);
        // left_offset = 4: the first 4 positions precede the signal
        assert!(excerpt[..4].iter().all(|&s| s == 0.0));
        assert!(excerpt[12..].iter().all(|&s| s == 0.0));
        assert!((excerpt[8] - window.envelope()[8]).abs() < 1e-7);
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(Window::new(1, 8, 1.5).is_err());
        assert!(Window::new(64, 0, 1.5).is_err());
        assert!(Window::new(64, 8, 0.0).is_err());
    }
}

//! Weighted cost between a target window and a candidate window.
//!
//! ```text
//! cost = spectral_loss_weight   * spectral_distance
//!      + temporal_loss_weight   * temporal_distance
//!      + continuity_loss_weight * continuity_penalty
//! ```
//!
//! Spectral distance is the mean squared difference of warped magnitude
//! spectra, temporal distance the mean squared sample difference, and the
//! continuity penalty twice the circular distance between the phase a
//! candidate starts at and the phase the previous frame ended at.
//!
//! Candidates differ from their unit-volume library window only by a gain,
//! so a [`Fragment`] is analysed once and scored at every volume.

use std::fmt;
use std::sync::Arc;

use chipfit_backend_synth::Window;
use chipfit_spec::Config;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::ReconstructResult;

/// Stride of the approximate distance mode.
pub const FAST_STRIDE: usize = 4;

/// A windowed excerpt and its spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    samples: Vec<f32>,
    magnitudes: Vec<f64>,
    warped: Vec<f64>,
}

impl Fragment {
    /// Windowed samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Normalized magnitude spectrum (bins 0 to size / 2).
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    /// Warped magnitude spectrum at unit gain.
    pub fn warped(&self) -> &[f64] {
        &self.warped
    }
}

/// Individual cost terms of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cost {
    /// Warped spectral distance.
    pub spectral: f64,
    /// Sample-domain distance.
    pub temporal: f64,
    /// Phase jump penalty.
    pub continuity: f64,
    /// Weighted sum.
    pub total: f64,
}

/// The cost function of one configuration.
#[derive(Clone)]
pub struct Criterion {
    spectral_weight: f64,
    temporal_weight: f64,
    continuity_weight: f64,
    fast: bool,
    window: Window,
    fft: Arc<dyn Fft<f64>>,
    normalization: f64,
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criterion")
            .field("spectral_weight", &self.spectral_weight)
            .field("temporal_weight", &self.temporal_weight)
            .field("continuity_weight", &self.continuity_weight)
            .field("fast", &self.fast)
            .field("window_size", &self.window.size())
            .finish()
    }
}

impl Criterion {
    /// Criterion with the weights and distance mode of `config`.
    pub fn new(config: &Config, window: Window) -> Self {
        let loss = config.loss();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window.size());
        // A full-scale sinusoid under the envelope peaks at magnitude 1.
        let normalization = window
            .envelope()
            .iter()
            .map(|&w| w as f64)
            .sum::<f64>()
            .max(f64::EPSILON)
            / 2.0;

        Self {
            spectral_weight: loss.spectral_loss_weight,
            temporal_weight: loss.temporal_loss_weight,
            continuity_weight: loss.continuity_loss_weight,
            fast: config.calculation().fast_difference,
            window,
            fft,
            normalization,
        }
    }

    /// Criterion using the configuration's own analysis window.
    pub fn from_config(config: &Config) -> ReconstructResult<Self> {
        Ok(Self::new(config, Window::from_config(config)?))
    }

    /// Analysis window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Whether the approximate distances are used.
    pub fn is_fast(&self) -> bool {
        self.fast
    }

    /// Analyses an already windowed excerpt of the window's size.
    pub fn analyse(&self, samples: Vec<f32>) -> Fragment {
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect();
        buffer.resize(self.window.size(), Complex::new(0.0, 0.0));
        self.fft.process(&mut buffer);

        let bins = self.window.size() / 2 + 1;
        let magnitudes: Vec<f64> = buffer[..bins]
            .iter()
            .map(|c| c.norm() / self.normalization)
            .collect();
        let warp = self.window.warp();
        let warped = magnitudes.iter().map(|&m| warp.apply(m)).collect();

        Fragment {
            samples,
            magnitudes,
            warped,
        }
    }

    /// Fragment of a window of silence.
    pub fn silence(&self) -> Fragment {
        self.analyse(vec![0.0; self.window.size()])
    }

    fn stride(&self) -> usize {
        if self.fast {
            FAST_STRIDE
        } else {
            1
        }
    }

    /// Mean squared difference of the warped spectra, candidate scaled by `gain`.
    pub fn spectral_distance(&self, target: &Fragment, candidate: &Fragment, gain: f64) -> f64 {
        let warp = self.window.warp();
        let mut sum = 0.0;
        let mut count = 0usize;
        for (t, &c) in target
            .warped
            .iter()
            .zip(&candidate.magnitudes)
            .step_by(self.stride())
        {
            let d = t - warp.apply(c * gain);
            sum += d * d;
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Mean squared sample difference, candidate scaled by `gain`.
    pub fn temporal_distance(&self, target: &Fragment, candidate: &Fragment, gain: f64) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (&t, &c) in target
            .samples
            .iter()
            .zip(&candidate.samples)
            .step_by(self.stride())
        {
            let d = t as f64 - c as f64 * gain;
            sum += d * d;
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Twice the circular distance between two phases, in [0, 1].
    pub fn continuity_penalty(expected: f64, phase: f64) -> f64 {
        let distance = (phase - expected).rem_euclid(1.0);
        2.0 * distance.min(1.0 - distance)
    }

    /// Weighted cost of a candidate at `gain`, given its phase penalty.
    pub fn cost(&self, target: &Fragment, candidate: &Fragment, gain: f64, continuity: f64) -> Cost {
        let spectral = if self.spectral_weight > 0.0 {
            self.spectral_distance(target, candidate, gain)
        } else {
            0.0
        };
        let temporal = if self.temporal_weight > 0.0 {
            self.temporal_distance(target, candidate, gain)
        } else {
            0.0
        };
        self.combine(spectral, temporal, continuity)
    }

    /// Cost of leaving the channel silent.
    pub fn silence_cost(&self, target: &Fragment) -> Cost {
        let stride = self.stride();
        let spectral = mean_square(target.warped.iter().copied().step_by(stride));
        let temporal = mean_square(target.samples.iter().map(|&s| s as f64).step_by(stride));
        self.combine(spectral, temporal, 0.0)
    }

    fn combine(&self, spectral: f64, temporal: f64, continuity: f64) -> Cost {
        Cost {
            spectral,
            temporal,
            continuity,
            total: self.spectral_weight * spectral
                + self.temporal_weight * temporal
                + self.continuity_weight * continuity,
        }
    }
}

fn mean_square(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn criterion(fast: bool) -> Criterion {
        let config = Config::builder()
            .window_size(256)
            .fast_difference(fast)
            .build()
            .unwrap();
        Criterion::from_config(&config).unwrap()
    }

    fn sine(criterion: &Criterion, cycles: f64, amplitude: f64) -> Fragment {
        let n = criterion.window().size();
        let raw: Vec<f32> = (0..n)
            .map(|i| (amplitude * (2.0 * PI * cycles * i as f64 / n as f64).sin()) as f32)
            .collect();
        criterion.analyse(criterion.window().apply(&raw))
    }

    #[test]
    fn test_identical_fragments_cost_nothing() {
        let criterion = criterion(false);
        let a = sine(&criterion, 8.0, 0.5);
        let cost = criterion.cost(&a, &a, 1.0, 0.0);
        assert_eq!(cost.spectral, 0.0);
        assert_eq!(cost.temporal, 0.0);
        assert_eq!(cost.total, 0.0);
    }

    #[test]
    fn test_full_scale_sine_peaks_near_unit_magnitude() {
        let criterion = criterion(false);
        let a = sine(&criterion, 16.0, 1.0);
        let peak = a.magnitudes().iter().cloned().fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 0.05, "peak {peak}");
    }

    #[test]
    fn test_gain_matches_scaled_target() {
        let criterion = criterion(false);
        let loud = sine(&criterion, 8.0, 1.0);
        let quiet = sine(&criterion, 8.0, 0.4);
        let exact = criterion.cost(&quiet, &loud, 0.4, 0.0);
        let wrong = criterion.cost(&quiet, &loud, 1.0, 0.0);
        assert!(exact.temporal < 1e-10);
        assert!(exact.spectral < 1e-6);
        assert!(wrong.total > exact.total);
    }

    #[test]
    fn test_wrong_pitch_costs_more() {
        let criterion = criterion(false);
        let target = sine(&criterion, 8.0, 1.0);
        let near = sine(&criterion, 8.0, 1.0);
        let far = sine(&criterion, 20.0, 1.0);
        assert!(criterion.cost(&target, &near, 1.0, 0.0).total
            < criterion.cost(&target, &far, 1.0, 0.0).total);
    }

    #[test]
    fn test_silence_cost_matches_zero_gain() {
        let criterion = criterion(false);
        let target = sine(&criterion, 5.0, 0.7);
        let silent = criterion.silence_cost(&target);
        let zero_gain = criterion.cost(&target, &target, 0.0, 0.0);
        assert!((silent.temporal - zero_gain.temporal).abs() < 1e-12);
        assert!((silent.spectral - zero_gain.spectral).abs() < 1e-9);
    }

    #[test]
    fn test_fast_mode_approximates_exact() {
        let exact = criterion(false);
        let fast = criterion(true);
        assert!(fast.is_fast());
        let target_e = sine(&exact, 8.0, 1.0);
        let cand_e = sine(&exact, 9.0, 0.8);
        let target_f = sine(&fast, 8.0, 1.0);
        let cand_f = sine(&fast, 9.0, 0.8);
        let e = exact.temporal_distance(&target_e, &cand_e, 1.0);
        let f = fast.temporal_distance(&target_f, &cand_f, 1.0);
        assert!((e - f).abs() / e < 0.2, "exact {e} fast {f}");
    }

    #[test]
    fn test_continuity_penalty_is_circular() {
        assert_eq!(Criterion::continuity_penalty(0.25, 0.25), 0.0);
        assert!((Criterion::continuity_penalty(0.0, 0.5) - 1.0).abs() < 1e-12);
        assert!((Criterion::continuity_penalty(0.95, 0.05) - 0.2).abs() < 1e-9);
        assert!((Criterion::continuity_penalty(0.05, 0.95) - 0.2).abs() < 1e-9);
    }
}

//! WAV input and conditioning.
//!
//! Input files may use any channel count, integer or float samples and any
//! sample rate. They are mixed to mono, scaled to [-1, 1] and linearly
//! resampled to the configured rate before the search sees them.

use std::path::Path;

use chipfit_spec::{Config, MAX_VOLUME};
use tracing::debug;

use crate::error::{ReconstructError, ReconstructResult};

/// Mono audio at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    /// Samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioSignal {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Reads a WAV file as mono samples in [-1, 1] at the file's own rate.
pub fn read_wav(path: &Path) -> ReconstructResult<AudioSignal> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| ReconstructError::load(path, e))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(ReconstructError::load(path, "WAV file declares zero channels"));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| ReconstructError::load(path, e))?,
        hound::SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(ReconstructError::load(
                    path,
                    format!("unsupported bit depth {}", spec.bits_per_sample),
                ));
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| ReconstructError::load(path, e))?
        }
    };

    let samples = to_mono(&interleaved, spec.channels as usize);
    debug!(
        path = %path.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        samples = samples.len(),
        "WAV read"
    );
    Ok(AudioSignal {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Reads a WAV file and conditions it for a configuration.
pub fn load_input(path: &Path, config: &Config) -> ReconstructResult<Vec<f32>> {
    let signal = read_wav(path)?;
    Ok(condition(signal, config))
}

/// Resamples to the configured rate and applies the configured normalization.
pub fn condition(signal: AudioSignal, config: &Config) -> Vec<f32> {
    let mut samples = resample(
        &signal.samples,
        signal.sample_rate,
        config.general().sample_rate,
    );
    let normalization = config.normalization();
    if normalization.normalize_input {
        normalize_peak(&mut samples);
    }
    if normalization.quantize_input {
        quantize(&mut samples);
    }
    samples
}

/// Writes mono samples as a 16-bit PCM WAV file, clipping to [-1, 1].
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> ReconstructResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)?;
    }
    writer.finalize()?;
    debug!(path = %path.display(), samples = samples.len(), "WAV written");
    Ok(())
}

/// Averages interleaved frames into one channel.
pub fn to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampling.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let length = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;
    (0..length)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * fraction
        })
        .collect()
}

/// Scales so the largest magnitude is 1. Silence is left alone.
pub fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for sample in samples.iter_mut() {
            *sample /= peak;
        }
    }
}

/// Rounds every sample to the 16-level DAC grid spanning [-1, 1].
pub fn quantize(samples: &mut [f32]) {
    let steps = MAX_VOLUME as f32;
    for sample in samples.iter_mut() {
        let level = ((sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * steps).round();
        *sample = level / steps * 2.0 - 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..441).map(|i| (i as f32 / 441.0) * 2.0 - 1.0).collect();
        write_wav(&path, &samples, 44_100).unwrap();

        let signal = read_wav(&path).unwrap();
        assert_eq!(signal.sample_rate, 44_100);
        assert_eq!(signal.samples.len(), samples.len());
        for (a, b) in signal.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3);
        }
        assert!((signal.duration() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_to_mono_averages_frames() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(to_mono(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_resample_length_and_endpoints() {
        let ramp: Vec<f32> = (0..100).map(|i| i as f32 / 99.0).collect();
        let down = resample(&ramp, 48_000, 24_000);
        assert_eq!(down.len(), 50);
        assert_eq!(down[0], 0.0);

        let up = resample(&ramp, 22_050, 44_100);
        assert_eq!(up.len(), 200);
        assert!((up[1] - ramp[0] / 2.0 - ramp[1] / 2.0).abs() < 1e-6);
        assert_eq!(resample(&ramp, 44_100, 44_100), ramp);
    }

    #[test]
    fn test_normalize_peak() {
        let mut samples = vec![0.25, -0.5, 0.1];
        normalize_peak(&mut samples);
        assert_eq!(samples, vec![0.5, -1.0, 0.2]);

        let mut silence = vec![0.0; 4];
        normalize_peak(&mut silence);
        assert_eq!(silence, vec![0.0; 4]);
    }

    #[test]
    fn test_quantize_snaps_to_grid() {
        let mut samples = vec![-1.0, 1.0, 0.0, 0.01, 3.0];
        quantize(&mut samples);
        assert_eq!(samples[0], -1.0);
        assert_eq!(samples[1], 1.0);
        assert_eq!(samples[4], 1.0);
        // 0 sits between levels 7 and 8 and rounds up.
        assert!((samples[2] - (8.0 / 15.0 * 2.0 - 1.0)).abs() < 1e-6);
        for s in &samples {
            let level = (s + 1.0) * 7.5;
            assert!((level - level.round()).abs() < 1e-4);
        }
    }
}

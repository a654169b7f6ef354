//! Plays instruction sequences back through the timers.
//!
//! Each channel keeps one timer alive across frames. A change of entry
//! builds a new timer but hands over the continuation state, so a pitch or
//! duty change does not reset the waveform. Silent frames hold the state,
//! unless `reset_phase` is set: then the first note after silence starts
//! from the timer's initial state, as the search assumes.

use chipfit_backend_synth::{LibraryParams, Timer, TimerParams, Tuning};
use chipfit_spec::{Config, Instruction, MAX_VOLUME};
use tracing::debug;

use crate::error::ReconstructResult;
use crate::state::Reconstruction;

/// Library entry an instruction plays, `None` when it is off.
pub fn params_of(instruction: &Instruction) -> Option<LibraryParams> {
    match *instruction {
        Instruction::Pulse(p) if p.on => Some(LibraryParams::Pulse {
            pitch: p.pitch,
            duty: p.duty,
        }),
        Instruction::Triangle(t) if t.on => Some(LibraryParams::Triangle { pitch: t.pitch }),
        Instruction::Noise(n) if n.on => Some(LibraryParams::Noise {
            period: n.period,
            short: n.short,
        }),
        _ => None,
    }
}

/// Synthesizes instructions at the configured rate.
#[derive(Debug, Clone)]
pub struct Renderer {
    timer_params: TimerParams,
    tuning: Tuning,
    reset_phase: bool,
}

impl Renderer {
    /// Renderer for a configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            timer_params: TimerParams::from_config(config),
            tuning: Tuning::from_config(config.frequency()),
            reset_phase: config.calculation().reset_phase,
        }
    }

    /// Samples per frame.
    pub fn frame_length(&self) -> usize {
        self.timer_params.frame_length
    }

    /// Renders one channel, one frame per instruction.
    pub fn render(&self, instructions: &[Instruction]) -> ReconstructResult<Vec<f32>> {
        let frame_length = self.frame_length();
        let mut output = Vec::with_capacity(instructions.len() * frame_length);
        let mut current: Option<(LibraryParams, Box<dyn Timer + Send>)> = None;
        let mut after_silence = true;

        for instruction in instructions {
            let Some(params) = params_of(instruction) else {
                output.resize(output.len() + frame_length, 0.0);
                after_silence = true;
                continue;
            };
            let restart = self.reset_phase && after_silence;
            after_silence = false;

            if !matches!(&current, Some((playing, _)) if *playing == params) {
                let mut timer = params.create_timer(self.timer_params, &self.tuning)?;
                if let Some((_, previous)) = &current {
                    let state = previous.state();
                    if !restart && state.kind() == timer.state().kind() {
                        timer.set_state(state)?;
                    }
                }
                current = Some((params, timer));
            }

            if let Some((_, timer)) = current.as_mut() {
                if restart {
                    let initial = timer.initial_state();
                    timer.set_state(initial)?;
                }
                let gain = instruction.volume() as f32 / MAX_VOLUME as f32;
                output.extend(timer.generate_frame().into_iter().map(|s| s * gain));
            }
        }

        debug!(
            frames = instructions.len(),
            samples = output.len(),
            "instructions rendered"
        );
        Ok(output)
    }

    /// Renders several channels and mixes them with equal weight.
    pub fn render_mix(&self, channels: &[Reconstruction]) -> ReconstructResult<Vec<f32>> {
        let rendered = channels
            .iter()
            .map(|r| self.render(&r.instructions))
            .collect::<ReconstructResult<Vec<_>>>()?;
        let length = rendered.iter().map(Vec::len).max().unwrap_or(0);
        let mut mix = vec![0.0f32; length];
        let weight = 1.0 / rendered.len().max(1) as f32;
        for channel in &rendered {
            for (out, &sample) in mix.iter_mut().zip(channel) {
                *out += sample * weight;
            }
        }
        Ok(mix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipfit_spec::{ChannelKind, NoiseInstruction, PulseInstruction};

    fn config() -> Config {
        Config::builder().sample_rate(22_050).build().unwrap()
    }

    fn note(pitch: u8, volume: u8, duty: u8) -> Instruction {
        Instruction::Pulse(PulseInstruction {
            on: true,
            pitch,
            volume,
            duty,
        })
    }

    #[test]
    fn test_params_of() {
        assert_eq!(
            params_of(&note(60, 15, 1)),
            Some(LibraryParams::Pulse { pitch: 60, duty: 1 })
        );
        assert_eq!(params_of(&Instruction::off(ChannelKind::Triangle)), None);
        let hiss = Instruction::Noise(NoiseInstruction {
            on: true,
            period: 4,
            volume: 3,
            short: true,
        });
        assert_eq!(
            params_of(&hiss),
            Some(LibraryParams::Noise {
                period: 4,
                short: true
            })
        );
    }

    #[test]
    fn test_render_length_and_silence() {
        let renderer = Renderer::new(&config());
        let frame = renderer.frame_length();
        let samples = renderer
            .render(&[note(69, 15, 2), Instruction::off(ChannelKind::Pulse)])
            .unwrap();
        assert_eq!(samples.len(), 2 * frame);
        assert!(samples[..frame].iter().any(|&s| s.abs() > 0.5));
        assert!(samples[frame..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_volume_scales_output() {
        let renderer = Renderer::new(&config());
        let loud = renderer.render(&[note(69, 15, 2)]).unwrap();
        let quiet = renderer.render(&[note(69, 5, 2)]).unwrap();
        for (l, q) in loud.iter().zip(&quiet) {
            assert!((l / 3.0 - q).abs() < 1e-6);
        }
    }

    #[test]
    fn test_repeated_note_is_continuous() {
        let renderer = Renderer::new(&config());
        let two = renderer.render(&[note(69, 15, 2), note(69, 15, 2)]).unwrap();
        let params = LibraryParams::Pulse { pitch: 69, duty: 2 };
        let mut timer = params
            .create_timer(renderer.timer_params, &renderer.tuning)
            .unwrap();
        let expected = timer.generate_frames(2, None).unwrap();
        assert_eq!(two, expected);
    }

    #[test]
    fn test_note_after_silence_holds_phase_by_default() {
        let renderer = Renderer::new(&config());
        let frame = renderer.frame_length();
        let off = Instruction::off(ChannelKind::Pulse);
        let gapped = renderer
            .render(&[note(69, 15, 2), off, note(69, 15, 2)])
            .unwrap();
        let straight = renderer.render(&[note(69, 15, 2), note(69, 15, 2)]).unwrap();
        assert_eq!(gapped[2 * frame..], straight[frame..]);
    }

    #[test]
    fn test_reset_phase_restarts_note_after_silence() {
        let config = Config::builder()
            .sample_rate(22_050)
            .reset_phase(true)
            .build()
            .unwrap();
        let renderer = Renderer::new(&config);
        let frame = renderer.frame_length();
        let off = Instruction::off(ChannelKind::Pulse);

        let fresh = renderer.render(&[note(69, 15, 2)]).unwrap();
        let gapped = renderer
            .render(&[note(69, 15, 2), off, note(69, 15, 2)])
            .unwrap();
        assert_eq!(gapped[2 * frame..], fresh[..]);

        // A different entry after silence restarts as well.
        let changed = renderer
            .render(&[note(60, 15, 1), off, note(69, 15, 2)])
            .unwrap();
        assert_eq!(changed[2 * frame..], fresh[..]);

        // Without silence in between the phase still carries over.
        let straight = renderer.render(&[note(69, 15, 2), note(69, 15, 2)]).unwrap();
        let mut timer = LibraryParams::Pulse { pitch: 69, duty: 2 }
            .create_timer(renderer.timer_params, &renderer.tuning)
            .unwrap();
        assert_eq!(straight, timer.generate_frames(2, None).unwrap());
    }

    #[test]
    fn test_mix_averages_channels() {
        let renderer = Renderer::new(&config());
        let channel = Reconstruction {
            kind: ChannelKind::Pulse,
            instructions: vec![note(60, 15, 2)],
            frame_costs: vec![0.0],
            total_cost: 0.0,
        };
        let silent = Reconstruction {
            instructions: vec![Instruction::off(ChannelKind::Pulse); 2],
            frame_costs: vec![0.0; 2],
            ..channel.clone()
        };
        let single = renderer.render(&channel.instructions).unwrap();
        let mix = renderer.render_mix(&[channel, silent]).unwrap();
        assert_eq!(mix.len(), 2 * renderer.frame_length());
        assert!((mix[3] - single[3] / 2.0).abs() < 1e-6);
    }
}

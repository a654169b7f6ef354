//! End-to-end tests: render instructions, reconstruct them, export them.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chipfit_backend_reconstruct::batch::{find_inputs, SUMMARY_FILE};
use chipfit_backend_reconstruct::state::ReconstructionState;
use chipfit_backend_reconstruct::{
    export, write_wav, BatchReconstruction, BatchSummary, Candidate, Cost, FileStatus,
    Instrument, ReconstructError, Reconstructor, Renderer,
};
use chipfit_backend_synth::{pitch_to_timer, Library, LibraryCreator, LibraryData, Tuning};
use chipfit_spec::{ChannelKind, Config, Instruction, PulseInstruction};
use chipfit_task::CancellationToken;
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 22_050;

fn config(dir: &Path) -> Config {
    Config::builder()
        .sample_rate(SAMPLE_RATE)
        .pitch_range(57, 81)
        .durations(0.02, 0.1)
        .window_size(512)
        .pulse_duties(vec![2])
        .generators(vec![ChannelKind::Pulse])
        .normalization(false, false)
        .library_directory(dir)
        .build()
        .unwrap()
}

fn library(config: &Config) -> Arc<LibraryData> {
    let library = Library::from_config(config).unwrap();
    let data = LibraryCreator::new(config.clone(), library)
        .with_workers(2)
        .load_or_build()
        .unwrap();
    Arc::new(data)
}

fn note(pitch: u8) -> Instruction {
    Instruction::Pulse(PulseInstruction {
        on: true,
        pitch,
        volume: 15,
        duty: 2,
    })
}

fn pitch_of(instruction: &Instruction) -> Option<u8> {
    match instruction {
        Instruction::Pulse(p) if p.on => Some(p.pitch),
        _ => None,
    }
}

// ============================================================================
// Single signals
// ============================================================================

#[test]
fn test_rendered_note_is_recovered() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let reconstructor =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Pulse).unwrap();

    let audio = Renderer::new(&config).render(&vec![note(69); 6]).unwrap();
    let reconstruction = reconstructor.reconstruct(&audio).unwrap();

    assert_eq!(reconstruction.instructions.len(), 6);
    assert_eq!(reconstruction.frame_costs.len(), 6);
    for instruction in &reconstruction.instructions[1..5] {
        assert_eq!(pitch_of(instruction), Some(69));
    }
}

#[test]
fn test_silence_stays_silent() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let reconstructor =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Pulse).unwrap();

    let frames = 4;
    let audio = vec![0.0f32; frames * config.frame_length()];
    let reconstruction = reconstructor.reconstruct(&audio).unwrap();
    assert_eq!(reconstruction.instructions.len(), frames);
    assert!(reconstruction.instructions.iter().all(|i| !i.is_on()));
    assert_eq!(reconstruction.total_cost, 0.0);
}

#[test]
fn test_noise_input_covers_every_frame() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let reconstructor =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Pulse).unwrap();

    let mut rng = Pcg32::seed_from_u64(7);
    let audio: Vec<f32> = (0..SAMPLE_RATE / 10).map(|_| rng.gen_range(-0.5..0.5)).collect();
    let reconstruction = reconstructor.reconstruct(&audio).unwrap();

    let expected = (audio.len()).div_ceil(config.frame_length());
    assert_eq!(reconstruction.instructions.len(), expected);
    assert!(reconstruction.frame_costs.iter().all(|c| c.is_finite() && *c >= 0.0));
}

#[test]
fn test_cancelled_reconstruction() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let reconstructor =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Pulse).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let audio = vec![0.1f32; 4 * config.frame_length()];
    let err = reconstructor.reconstruct_with(&audio, &cancel).unwrap_err();
    assert!(matches!(err, ReconstructError::Cancelled));
}

#[test]
fn test_library_of_other_config_rejected() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let data = library(&config);

    let other = Arc::new(config.to_builder().transformation_gamma(2.0).build().unwrap());
    let err = Reconstructor::new(other, data, ChannelKind::Pulse).unwrap_err();
    assert!(matches!(err, ReconstructError::InvalidData(_)));
}

#[test]
fn test_channel_missing_from_library() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let err =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Triangle).unwrap_err();
    assert!(matches!(err, ReconstructError::Library(_)));
}

#[test]
fn test_reconstruction_exports_to_instrument() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()));
    let reconstructor =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Pulse).unwrap();

    let audio = Renderer::new(&config).render(&vec![note(69); 6]).unwrap();
    let reconstruction = reconstructor.reconstruct(&audio).unwrap();
    let features = export::export(ChannelKind::Pulse, &reconstruction.instructions, &config).unwrap();

    // The note sounds to the end, so a silent frame closes the envelope.
    assert_eq!(features.volume.last(), Some(&0));
    assert!(features.volume.len() >= 6);
    let tuning = Tuning::from_config(config.frequency());
    let first = reconstruction
        .instructions
        .iter()
        .find_map(pitch_of)
        .unwrap();
    assert_eq!(
        features.initial_pitch,
        pitch_to_timer(ChannelKind::Pulse, config.general().clock, &tuning, first)
    );

    let bytes = Instrument::from_features("a4", &features).to_bytes().unwrap();
    assert_eq!(&bytes[..6], b"FTI2.4");
}

// ============================================================================
// Phase handling
// ============================================================================

#[test]
fn test_best_phase_search_never_loses_the_continuation() {
    let dir = TempDir::new().unwrap();
    let plain = Arc::new(config(dir.path()));
    let searching = Arc::new(
        plain
            .to_builder()
            .find_best_phase(true)
            .phase_steps(4)
            .build()
            .unwrap(),
    );
    let data = library(&plain);
    let continuing =
        Reconstructor::new(Arc::clone(&plain), Arc::clone(&data), ChannelKind::Pulse).unwrap();
    let aligning = Reconstructor::new(searching, data, ChannelKind::Pulse).unwrap();

    let audio = Renderer::new(&plain).render(&vec![note(69); 8]).unwrap();
    let criterion = continuing.criterion();
    let frame_length = plain.frame_length();

    // Both searches see the same incoming state on every frame.
    let mut state = ReconstructionState::new(ChannelKind::Pulse);
    for frame in 0..continuing.frame_count(audio.len()) {
        let target = criterion.analyse(criterion.window().extract(&audio, frame * frame_length));
        let (held, next_phase) = continuing.reconstruct_frame(&state, &target, frame).unwrap();
        let (aligned, _) = aligning.reconstruct_frame(&state, &target, frame).unwrap();

        assert!(
            aligned.cost.total <= held.cost.total,
            "frame {}: {} > {}",
            frame,
            aligned.cost.total,
            held.cost.total
        );
        if held.cost.total == 0.0 {
            assert_eq!(aligned.cost.total, 0.0);
            assert_eq!(aligned.phase, state.phase());
        }
        state.push(held, next_phase);
    }
}

#[test]
fn test_reset_phase_restarts_after_silence() {
    let dir = TempDir::new().unwrap();
    let plain = Arc::new(config(dir.path()));
    let resetting = Arc::new(plain.to_builder().reset_phase(true).build().unwrap());
    let data = library(&plain);
    let continuing =
        Reconstructor::new(Arc::clone(&plain), Arc::clone(&data), ChannelKind::Pulse).unwrap();
    let restarting =
        Reconstructor::new(Arc::clone(&resetting), data, ChannelKind::Pulse).unwrap();

    let audio = Renderer::new(&plain).render(&vec![note(69); 3]).unwrap();
    let criterion = continuing.criterion();
    let target = criterion.analyse(criterion.window().extract(&audio, plain.frame_length()));

    // A silent frame that left the phase mid-cycle.
    let mut state = ReconstructionState::new(ChannelKind::Pulse);
    state.push(
        Candidate {
            instruction: Instruction::off(ChannelKind::Pulse),
            params: None,
            phase: 0.37,
            cost: Cost::default(),
        },
        0.37,
    );

    let (held, _) = continuing.reconstruct_frame(&state, &target, 1).unwrap();
    let (restarted, _) = restarting.reconstruct_frame(&state, &target, 1).unwrap();
    assert_eq!(held.phase, 0.37);
    assert_eq!(restarted.phase, 0.0);
}

#[test]
fn test_reset_phase_round_trip_through_renderer() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(config(dir.path()).to_builder().reset_phase(true).build().unwrap());
    let reconstructor =
        Reconstructor::new(Arc::clone(&config), library(&config), ChannelKind::Pulse).unwrap();

    let off = Instruction::off(ChannelKind::Pulse);
    let mut score = vec![note(69); 3];
    score.extend([off; 3]);
    score.extend([note(69); 4]);
    let renderer = Renderer::new(&config);
    let audio = renderer.render(&score).unwrap();
    let reconstruction = reconstructor.reconstruct(&audio).unwrap();

    assert_eq!(reconstruction.instructions.len(), 10);
    assert!(!reconstruction.instructions[4].is_on());
    assert_eq!(reconstruction.frame_costs[4], 0.0);
    for instruction in &reconstruction.instructions[7..9] {
        assert_eq!(pitch_of(instruction), Some(69));
    }

    // The renderer restarts the note the same way the search did.
    let frame = renderer.frame_length();
    let replay = renderer.render(&reconstruction.instructions).unwrap();
    let first_after_silence = (1..reconstruction.instructions.len())
        .find(|&k| {
            reconstruction.instructions[k].is_on() && !reconstruction.instructions[k - 1].is_on()
        })
        .unwrap();
    let fresh = renderer
        .render(&reconstruction.instructions[first_after_silence..=first_after_silence])
        .unwrap();
    assert_eq!(
        replay[first_after_silence * frame..(first_after_silence + 1) * frame].to_vec(),
        fresh
    );
}

// ============================================================================
// Batch
// ============================================================================

#[test]
fn test_batch_directory() {
    let library_dir = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let config = Arc::new(config(library_dir.path()));

    let audio = Renderer::new(&config).render(&vec![note(64); 4]).unwrap();
    write_wav(&input.path().join("a_note.wav"), &audio, SAMPLE_RATE).unwrap();
    write_wav(
        &input.path().join("b_silence.wav"),
        &vec![0.0; 2 * config.frame_length()],
        SAMPLE_RATE,
    )
    .unwrap();
    fs::write(input.path().join("c_broken.wav"), b"not a wav file").unwrap();
    fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

    assert_eq!(find_inputs(input.path()).unwrap().len(), 3);

    let batch = BatchReconstruction::new(Arc::clone(&config), library(&config), output.path())
        .unwrap()
        .with_workers(2);
    let summary = batch.run(input.path()).unwrap();

    assert_eq!(summary.files.len(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.files[2].status, FileStatus::Failed);
    assert!(summary.files[2].error.is_some());

    assert!(output.path().join("a_note.pulse.fti").exists());
    assert!(output.path().join("b_silence.pulse.fti").exists());
    assert!(!output.path().join("c_broken.pulse.fti").exists());
    assert_eq!(summary.files[0].channels[0].frames, 4);

    let written = BatchSummary::load(&output.path().join(SUMMARY_FILE)).unwrap();
    assert_eq!(written.library_key, summary.library_key);
    let statuses: Vec<FileStatus> = written.files.iter().map(|f| f.status).collect();
    assert_eq!(
        statuses,
        vec![FileStatus::Completed, FileStatus::Completed, FileStatus::Failed]
    );
}

#[test]
fn test_batch_empty_directory() {
    let library_dir = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let config = Arc::new(config(library_dir.path()));

    let summary = BatchReconstruction::new(Arc::clone(&config), library(&config), output.path())
        .unwrap()
        .run(input.path())
        .unwrap();
    assert!(summary.files.is_empty());
    assert!(output.path().join(SUMMARY_FILE).exists());
}

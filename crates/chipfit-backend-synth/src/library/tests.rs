//! Tests for library enumeration, persistence and builds.

use std::path::Path;

use chipfit_spec::{ChannelKind, Config};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::*;
use crate::error::LibraryError;

fn pulse_config(dir: &Path) -> Config {
    Config::builder()
        .sample_rate(22_050)
        .pitch_range(21, 108)
        .durations(0.02, 0.1)
        .window_size(256)
        .pulse_duties(vec![2])
        .generators(vec![ChannelKind::Pulse])
        .library_directory(dir)
        .build()
        .unwrap()
}

fn build(config: &Config) -> LibraryData {
    let library = Library::from_config(config).unwrap();
    LibraryCreator::new(config.clone(), library)
        .with_workers(2)
        .build()
        .unwrap()
}

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn test_enumerate_one_duty_full_piano() {
    let dir = TempDir::new().unwrap();
    let params = LibraryParams::enumerate(&pulse_config(dir.path()));
    assert_eq!(params.len(), 88);
    assert_eq!(params[0], LibraryParams::Pulse { pitch: 21, duty: 2 });
    assert_eq!(params[87], LibraryParams::Pulse { pitch: 108, duty: 2 });
}

#[test]
fn test_enumerate_only_configured_generators() {
    let config = Config::builder()
        .pitch_range(60, 71)
        .noise_periods(vec![0, 1])
        .generators(vec![ChannelKind::Triangle, ChannelKind::Noise])
        .build()
        .unwrap();
    let params = LibraryParams::enumerate(&config);
    assert_eq!(params.len(), 12 + 4);
    assert!(params.iter().all(|p| p.kind() != ChannelKind::Pulse));
    assert!(params.contains(&LibraryParams::Noise {
        period: 1,
        short: true
    }));
}

#[test]
fn test_params_display() {
    assert_eq!(LibraryParams::Pulse { pitch: 60, duty: 2 }.to_string(), "pulse:60:2");
    assert_eq!(LibraryParams::Triangle { pitch: 45 }.to_string(), "triangle:45");
    assert_eq!(
        LibraryParams::Noise {
            period: 3,
            short: false
        }
        .to_string(),
        "noise:3:long"
    );
}

// ============================================================================
// Build
// ============================================================================

#[test]
fn test_build_produces_entry_per_pitch() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let data = build(&config);

    assert_eq!(data.len(), 88);
    assert_eq!(data.key(), &Library::key_for(&config).unwrap());
    assert_eq!(data.metadata(), &LibraryMetadata::from_config(&config));
    for (_, sample) in data.iter() {
        assert!(!sample.is_empty());
        assert_eq!(sample.sample_rate(), 22_050);
    }

    let library = Library::from_config(&config).unwrap();
    assert!(library.exists(&config).unwrap());
}

#[test]
fn test_out_of_range_pitch_is_no_data() {
    let dir = TempDir::new().unwrap();
    let data = build(&pulse_config(dir.path()));

    for params in [
        LibraryParams::Pulse { pitch: 20, duty: 2 },
        LibraryParams::Pulse { pitch: 109, duty: 2 },
        LibraryParams::Pulse { pitch: 60, duty: 0 },
        LibraryParams::Triangle { pitch: 60 },
    ] {
        let err = data.get(&params).unwrap_err();
        assert!(matches!(err, LibraryError::NoData(_)), "{params}");
    }
    assert!(data.get(&LibraryParams::Pulse { pitch: 60, duty: 2 }).is_ok());
}

#[test]
fn test_cancelled_build_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let creator = LibraryCreator::new(config.clone(), Library::new(dir.path()));

    let task = creator.task().unwrap();
    task.cancel();
    let err = outcome_to_result(task.run()).unwrap_err();
    assert!(matches!(err, LibraryError::Cancelled));
    assert!(!creator.library().exists(&config).unwrap());
}

#[test]
fn test_failed_save_fails_build() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"x").unwrap();

    let config = pulse_config(dir.path());
    let err = LibraryCreator::new(config, Library::new(&blocker))
        .with_workers(2)
        .build()
        .unwrap_err();
    assert!(matches!(err, LibraryError::Task(_)));
}

#[test]
fn test_load_or_build_reuses_stored_library() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let creator = LibraryCreator::new(config.clone(), Library::new(dir.path())).with_workers(2);

    let built = creator.load_or_build().unwrap();
    let path = creator.library().path_for(built.key());
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

    let loaded = creator.load_or_build().unwrap();
    assert_eq!(loaded.len(), built.len());
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_round_trip_is_bit_identical() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let built = build(&config);

    let loaded = Library::from_config(&config).unwrap().load(&config).unwrap();
    assert_eq!(loaded.key(), built.key());
    assert_eq!(loaded.metadata(), built.metadata());
    assert_eq!(loaded.len(), built.len());
    for ((params_a, a), (params_b, b)) in built.iter().zip(loaded.iter()) {
        assert_eq!(params_a, params_b);
        assert_eq!(a.frequency().to_bits(), b.frequency().to_bits());
        let bits_a: Vec<u32> = a.samples().iter().map(|s| s.to_bits()).collect();
        let bits_b: Vec<u32> = b.samples().iter().map(|s| s.to_bits()).collect();
        assert_eq!(bits_a, bits_b, "{params_a}");
    }
}

#[test]
fn test_missing_library_is_no_data() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let library = Library::from_config(&config).unwrap();
    assert!(!library.exists(&config).unwrap());
    assert!(matches!(
        library.load(&config).unwrap_err(),
        LibraryError::NoData(_)
    ));
}

#[test]
fn test_version_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    build(&config);

    let library = Library::from_config(&config).unwrap();
    let path = library.path_for(&Library::key_for(&config).unwrap());
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[4..6].copy_from_slice(&(LIBRARY_FORMAT_VERSION + 1).to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    match library.load(&config).unwrap_err() {
        LibraryError::IncompatibleVersion(err) => {
            assert_eq!(err.expected, LIBRARY_FORMAT_VERSION.to_string());
            assert_eq!(err.actual, (LIBRARY_FORMAT_VERSION + 1).to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_bad_magic_rejected() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let library = Library::from_config(&config).unwrap();
    std::fs::write(
        library.path_for(&Library::key_for(&config).unwrap()),
        b"RIFF\x01\x00",
    )
    .unwrap();
    assert!(matches!(
        library.load(&config).unwrap_err(),
        LibraryError::InvalidData(_)
    ));
}

#[test]
fn test_truncated_file_is_load_error() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    build(&config);

    let library = Library::from_config(&config).unwrap();
    let path = library.path_for(&Library::key_for(&config).unwrap());
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(
        library.load(&config).unwrap_err(),
        LibraryError::Load { .. }
    ));
}

#[test]
fn test_key_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let built = build(&config);

    let other = config.to_builder().sample_rate(44_100).build().unwrap();
    let library = Library::from_config(&config).unwrap();
    let other_key = Library::key_for(&other).unwrap();
    assert_ne!(&other_key, built.key());
    std::fs::copy(library.path_for(built.key()), library.path_for(&other_key)).unwrap();

    assert!(matches!(
        library.load(&other).unwrap_err(),
        LibraryError::InvalidData(_)
    ));
}

#[test]
fn test_info_and_clear() {
    let dir = TempDir::new().unwrap();
    let config = pulse_config(dir.path());
    let data = build(&config);
    std::fs::write(dir.path().join("notes.txt"), b"unrelated").unwrap();

    let library = Library::new(dir.path());
    let info = library.info().unwrap();
    assert_eq!(info.entry_count(), 1);
    assert_eq!(info.keys, vec![data.key().clone()]);
    assert!(info.total_size_bytes > 0);

    assert_eq!(library.clear().unwrap(), 1);
    assert_eq!(library.info().unwrap().entry_count(), 0);
    assert!(dir.path().join("notes.txt").exists());
    assert_eq!(Library::new(dir.path().join("absent")).clear().unwrap(), 0);
}

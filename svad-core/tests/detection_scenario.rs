use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use svad_core::audio::wav::write_wav_mono;
use svad_core::recording::record_reference;
use svad_core::{
    CancellationToken, DetectionOutcome, Detector, DetectorConfig, InMemoryCorpus, MatchPolicy,
    ReferenceRecording, ReplaySource, SvadError,
};

const BLOCK: usize = 1024;
const RATE: u32 = 22_050;

fn stepped(energies: &[f64]) -> Vec<f32> {
    energies
        .iter()
        .flat_map(|e| std::iter::repeat((*e / BLOCK as f64) as f32).take(BLOCK))
        .collect()
}

fn config(margin: f64) -> DetectorConfig {
    DetectorConfig {
        sample_rate: RATE,
        block_size: BLOCK,
        error_margin: margin,
        ..DetectorConfig::default()
    }
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("svad-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn five_chunk_reference_matches_perturbed_replay() {
    let reference = stepped(&[10.0, 20.0, 30.0, 20.0, 10.0]);
    assert_eq!(reference.len(), 5120);
    let corpus = InMemoryCorpus::new(vec![ReferenceRecording::new("sample-01.wav", reference, RATE)]);
    let detector = Detector::from_corpus(config(50.0), &corpus).expect("load detector");

    let registry = detector.registry();
    assert_eq!(registry.capacity(), 5);
    assert_relative_eq!(registry.match_floor(), 2.5);
    assert_relative_eq!(registry.match_ceiling(), 7.5);

    let pattern = registry.get("sample-01.wav").expect("pattern registered");
    let expected = [(5.0, 15.0), (10.0, 30.0), (15.0, 45.0), (10.0, 30.0), (5.0, 15.0)];
    for (band, (lower, upper)) in pattern.bands().iter().zip(expected) {
        assert_relative_eq!(band.lower, lower, epsilon = 1e-9);
        assert_relative_eq!(band.upper, upper, epsilon = 1e-9);
    }

    let mut live = ReplaySource::from_block_energies(&[11.0, 19.0, 31.0, 19.0, 11.0], BLOCK, RATE);
    let mut matches = detector.subscribe_matches();
    let outcome = detector
        .run(&mut live, &CancellationToken::new())
        .expect("run detector");

    let DetectionOutcome::Matched(event) = outcome else {
        panic!("expected a match, got {outcome:?}");
    };
    assert_eq!(event.hits, 5);
    assert_eq!(event.block_index, 4);
    assert_eq!(event.pattern.as_deref(), Some("sample-01.wav"));
    assert_eq!(matches.try_recv().expect("match broadcast"), event);
}

#[test]
fn pattern_found_after_leading_noise() {
    let corpus = InMemoryCorpus::new(vec![ReferenceRecording::new(
        "sample-01.wav",
        stepped(&[10.0, 20.0, 30.0, 20.0, 10.0]),
        RATE,
    )]);
    let detector = Detector::from_corpus(config(20.0), &corpus).expect("load detector");

    let mut energies = vec![200.0, 0.5, 90.0, 3.0, 60.0, 0.0, 0.0];
    energies.extend([10.5, 19.0, 29.0, 21.0, 10.0]);
    let mut live = ReplaySource::from_block_energies(&energies, BLOCK, RATE);

    let outcome = detector.run(&mut live, &CancellationToken::new()).expect("run");
    let DetectionOutcome::Matched(event) = outcome else {
        panic!("expected a match, got {outcome:?}");
    };
    assert_eq!(event.block_index, 11);
}

#[test]
fn restarted_run_starts_with_an_empty_window() {
    let corpus = InMemoryCorpus::new(vec![ReferenceRecording::new(
        "sample-01.wav",
        stepped(&[10.0, 20.0, 30.0]),
        RATE,
    )]);
    let detector = Detector::from_corpus(config(10.0), &corpus).expect("load detector");

    // First run ends two blocks into the pattern.
    let mut first = ReplaySource::from_block_energies(&[10.0, 20.0], BLOCK, RATE);
    assert_eq!(
        detector.run(&mut first, &CancellationToken::new()).unwrap(),
        DetectionOutcome::Exhausted
    );

    // The third chunk alone must not complete a match left over from run one.
    let mut second = ReplaySource::from_block_energies(&[30.0], BLOCK, RATE);
    assert_eq!(
        detector.run(&mut second, &CancellationToken::new()).unwrap(),
        DetectionOutcome::Exhausted
    );
    assert_eq!(detector.diagnostics_snapshot().evaluations, 0);
}

#[test]
fn first_reference_policy_only_consults_first_pattern() {
    let corpus = InMemoryCorpus::new(vec![
        ReferenceRecording::new("sample-01.wav", stepped(&[80.0, 80.0, 80.0, 80.0]), RATE),
        ReferenceRecording::new("sample-02.wav", stepped(&[5.0, 10.0, 5.0, 10.0]), RATE),
    ]);
    let live = [5.0, 10.0, 5.0, 10.0];

    let literal = Detector::from_corpus(
        DetectorConfig {
            match_policy: MatchPolicy::FirstReference,
            ..config(10.0)
        },
        &corpus,
    )
    .unwrap();
    let mut source = ReplaySource::from_block_energies(&live, BLOCK, RATE);
    assert_eq!(
        literal.run(&mut source, &CancellationToken::new()).unwrap(),
        DetectionOutcome::Exhausted
    );

    let any = Detector::from_corpus(config(10.0), &corpus).unwrap();
    let mut source = ReplaySource::from_block_energies(&live, BLOCK, RATE);
    let outcome = any.run(&mut source, &CancellationToken::new()).unwrap();
    let DetectionOutcome::Matched(event) = outcome else {
        panic!("expected a match, got {outcome:?}");
    };
    assert_eq!(event.pattern.as_deref(), Some("sample-02.wav"));
}

#[test]
fn references_load_from_wav_directory() {
    let dir = scratch_dir("wavdir");
    write_wav_mono(&dir.join("sample-01.wav"), &stepped(&[10.0, 20.0, 30.0]), RATE).unwrap();
    write_wav_mono(&dir.join("sample-02.wav"), &stepped(&[5.0; 6]), RATE).unwrap();
    write_wav_mono(&dir.join("ignored.wav"), &stepped(&[1.0; 9]), RATE).unwrap();

    let detector = Detector::load(DetectorConfig {
        reference_dir: dir.clone(),
        ..config(50.0)
    })
    .expect("load from directory");
    assert_eq!(detector.registry().len(), 2);
    assert_eq!(detector.registry().capacity(), 6);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn empty_reference_directory_refuses_to_start() {
    let dir = scratch_dir("empty");
    let err = Detector::load(DetectorConfig {
        reference_dir: dir.clone(),
        ..config(50.0)
    })
    .err()
    .expect("empty corpus must fail");
    assert!(matches!(err, SvadError::NoReferencesFound { .. }));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn recorded_reference_is_detected_on_replay() {
    let dir = scratch_dir("record");
    let energies = [4.0, 40.0, 12.0, 70.0, 25.0, 8.0];
    let mut mic = ReplaySource::from_block_energies(&energies, BLOCK, RATE);
    let seconds = energies.len() as f64 * BLOCK as f64 / RATE as f64;
    let summary = record_reference(
        &mut mic,
        &dir.join("sample-recorded.wav"),
        seconds + 1e-6,
        &CancellationToken::new(),
    )
    .expect("record");
    assert!(summary.complete);
    assert_eq!(summary.blocks, energies.len());

    let detector = Detector::load(DetectorConfig {
        reference_dir: dir.clone(),
        ..config(5.0)
    })
    .expect("load recorded reference");
    assert_eq!(detector.registry().capacity(), energies.len());

    let mut live = ReplaySource::from_block_energies(&energies, BLOCK, RATE);
    assert!(detector
        .run(&mut live, &CancellationToken::new())
        .unwrap()
        .is_match());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn cancellation_from_another_thread_stops_an_endless_stream() {
    struct Endless;

    impl svad_core::BlockSource for Endless {
        fn next_block(&mut self) -> svad_core::Result<Option<svad_core::buffering::chunk::AudioChunk>> {
            thread::sleep(Duration::from_millis(1));
            Ok(Some(svad_core::buffering::chunk::AudioChunk::new(
                vec![0.0; BLOCK],
                RATE,
            )))
        }

        fn block_size(&self) -> usize {
            BLOCK
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }
    }

    let corpus = InMemoryCorpus::new(vec![ReferenceRecording::new(
        "sample-01.wav",
        stepped(&[10.0, 20.0]),
        RATE,
    )]);
    let detector = Detector::from_corpus(config(50.0), &corpus).unwrap();

    let token = CancellationToken::new();
    let remote = token.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.cancel();
    });

    let outcome = detector.run(&mut Endless, &token).unwrap();
    stopper.join().expect("stopper thread panicked");
    assert_eq!(outcome, DetectionOutcome::Cancelled);
    assert!(detector.diagnostics_snapshot().blocks_in > 0);
}

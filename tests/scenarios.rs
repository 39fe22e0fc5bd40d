//! The concrete scenario table, run against the production `Hybrid`
//! aligner rather than against one algorithm in isolation, since callers
//! only ever invoke `Hybrid` directly.

use piano_align::model::{PerformanceNote, PerformanceNoteId, RhythmicValue, Score, ScoreNote, ScoreNoteId};
use piano_align::{AlignmentOptions, AlignmentStrategy, Hybrid};
use rstest::rstest;

fn score_note(id: u32, pitch: u8, start_ms: f64) -> ScoreNote {
    ScoreNote {
        id: ScoreNoteId::from(id as usize),
        pitch,
        velocity: 80,
        start_tick: (start_ms * 0.96) as u32,
        duration_ticks: 480,
        start_time_ms: start_ms,
        duration_ms: 500.0,
        measure: 1,
        beat: 1.0,
        voice: 0,
        is_grace_note: false,
        rhythmic_value: RhythmicValue::Quarter,
    }
}

fn perf_note(id: u32, pitch: u8, start_ms: f64) -> PerformanceNote {
    PerformanceNote {
        id: PerformanceNoteId::from(id as usize),
        pitch,
        velocity: 80,
        start_time_ms: start_ms,
        duration_ms: 480.0,
        start_tick: None,
    }
}

fn five_note_score() -> Score {
    Score::new(
        vec![
            score_note(0, 60, 0.0),
            score_note(1, 62, 500.0),
            score_note(2, 64, 1000.0),
            score_note(3, 65, 1500.0),
            score_note(4, 67, 2000.0),
        ],
        480,
        vec![],
        vec![],
        1,
    )
}

fn performance_of(notes: Vec<PerformanceNote>) -> piano_align::Performance {
    piano_align::Performance {
        notes,
        pedal_events: vec![],
        capture_start_ms: 0.0,
    }
}

#[rstest]
#[case::identical(vec![60, 62, 64, 65, 67], vec![0.0, 500.0, 1000.0, 1500.0, 2000.0], 5, 0, 0)]
#[case::dropped_note(vec![60, 62, 65, 67], vec![0.0, 500.0, 1500.0, 2000.0], 4, 1, 0)]
#[case::extra_note(vec![60, 62, 63, 64, 65, 67], vec![0.0, 500.0, 750.0, 1000.0, 1500.0, 2000.0], 5, 0, 1)]
fn scenario_table_matches_expected_counts(
    #[case] pitches: Vec<u8>,
    #[case] timings: Vec<f64>,
    #[case] expected_pairs: usize,
    #[case] expected_missed: usize,
    #[case] expected_extra: usize,
) {
    let score = five_note_score();
    let perf_notes: Vec<PerformanceNote> = pitches
        .into_iter()
        .zip(timings)
        .enumerate()
        .map(|(i, (pitch, start_ms))| perf_note(i as u32, pitch, start_ms))
        .collect();

    let result = Hybrid::new()
        .align(&score, &performance_of(perf_notes), &AlignmentOptions::default())
        .unwrap();

    assert_eq!(result.pairs.len(), expected_pairs);
    assert_eq!(result.missed.len(), expected_missed);
    assert_eq!(result.extra.len(), expected_extra);
}

#[test]
fn scenario_4_octave_error_is_flagged() {
    let score = five_note_score();
    let perf_notes = vec![
        perf_note(0, 60, 0.0),
        perf_note(1, 62, 500.0),
        perf_note(2, 76, 1000.0),
        perf_note(3, 65, 1500.0),
        perf_note(4, 67, 2000.0),
    ];
    let result = Hybrid::new()
        .align(&score, &performance_of(perf_notes), &AlignmentOptions::default())
        .unwrap();
    assert_eq!(result.pairs.len(), 5);
    assert_eq!(result.pairs.iter().filter(|p| p.is_octave_error()).count(), 1);
}

#[test]
fn scenario_6_chord_with_realistic_spread_all_match() {
    let score = Score::new(
        vec![score_note(0, 60, 0.0), score_note(1, 64, 0.0), score_note(2, 67, 0.0)],
        480,
        vec![],
        vec![],
        1,
    );
    let perf_notes = vec![perf_note(0, 60, 0.0), perf_note(1, 64, 5.0), perf_note(2, 67, 10.0)];
    let result = Hybrid::new()
        .align(&score, &performance_of(perf_notes), &AlignmentOptions::default())
        .unwrap();
    assert_eq!(result.pairs.len(), 3);
    assert!(result.pairs.iter().all(|p| p.is_exact_pitch_match()));
}

#[test]
fn scenario_8_empty_performance_is_degenerate_not_error() {
    let score = five_note_score();
    let result = Hybrid::new()
        .align(&score, &performance_of(vec![]), &AlignmentOptions::default())
        .unwrap();
    assert_eq!(result.pairs.len(), 0);
    assert_eq!(result.missed.len(), score.notes.len());
    assert_eq!(result.normalized_score, 0.0);
}

#[test]
fn invariant_8_tempo_robustness_under_uniform_scaling() {
    let score = five_note_score();
    for ratio in [0.7, 1.0, 1.2, 1.5] {
        let perf_notes: Vec<PerformanceNote> = score
            .notes
            .iter()
            .enumerate()
            .map(|(i, n)| perf_note(i as u32, n.pitch, n.start_time_ms * ratio))
            .collect();
        let result = Hybrid::new()
            .align(&score, &performance_of(perf_notes), &AlignmentOptions::default())
            .unwrap();
        assert_eq!(result.pairs.len(), 5, "ratio {ratio} should still match every note");
        assert!(
            (result.estimated_tempo_ratio - ratio).abs() <= ratio * 0.1,
            "ratio {ratio} estimated as {}",
            result.estimated_tempo_ratio
        );
    }
}

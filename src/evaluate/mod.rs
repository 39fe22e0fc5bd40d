//! Pure evaluators over an `AlignmentResult` (spec.md §4.5). None of these
//! re-run alignment; each consumes pairs/missed/extra counts only, the way
//! `xstraven-trumpet-rs::scoring::analyzer::analyze_performance` consumes a
//! pre-computed note-matching instead of re-matching itself.

pub mod note_accuracy;
pub mod rhythm;
pub mod tempo;

pub use note_accuracy::{Grade, NoteAccuracy, NoteAccuracyWeights};
pub use rhythm::{Rhythm, RhythmBias};
pub use tempo::{DriftDirection, Tempo};

use crate::model::{AlignedPair, MissedNote};

/// One measure's worth of evaluator detail: how many expected notes landed
/// correctly and how far off the ones that sounded were, timing-wise.
/// Shared by `NoteAccuracy` and `Rhythm` (spec.md §4.5's `per_measure_breakdown`
/// field, typed per the expanded spec's per-measure section).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeasureBreakdown {
    pub measure: u32,
    pub correct: u32,
    pub total: u32,
    pub mean_abs_timing_error_ms: f64,
}

pub type MeasureScores = Vec<MeasureBreakdown>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    pub measure: Option<u32>,
}

/// Groups pairs (and, for completeness, misses) by `ScoreNote::measure` and
/// folds each group into a `MeasureBreakdown`. `is_correct` lets callers
/// decide what "correct" means for their metric (exact pitch match for
/// note accuracy, on-time for rhythm) while sharing the grouping and timing
/// arithmetic.
pub(crate) fn per_measure_breakdown(
    pairs: &[AlignedPair],
    missed: &[MissedNote],
    is_correct: impl Fn(&AlignedPair) -> bool,
) -> MeasureScores {
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Acc {
        correct: u32,
        total: u32,
        paired: u32,
        abs_err_sum: f64,
    }

    let mut groups: BTreeMap<u32, Acc> = BTreeMap::new();
    for pair in pairs {
        let acc = groups.entry(pair.score_note.measure).or_default();
        acc.total += 1;
        acc.paired += 1;
        acc.abs_err_sum += pair.timing_dev_ms.abs();
        if is_correct(pair) {
            acc.correct += 1;
        }
    }
    for miss in missed {
        groups.entry(miss.score_note.measure).or_default().total += 1;
    }

    groups
        .into_iter()
        .map(|(measure, acc)| MeasureBreakdown {
            measure,
            correct: acc.correct,
            total: acc.total,
            mean_abs_timing_error_ms: if acc.paired == 0 { 0.0 } else { acc.abs_err_sum / acc.paired as f64 },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MissReason, PerformanceNote, PerformanceNoteId, RhythmicValue, ScoreNote, ScoreNoteId};

    fn score_note(id: u32, measure: u32) -> ScoreNote {
        ScoreNote {
            id: ScoreNoteId::from(id as usize),
            pitch: 60,
            velocity: 80,
            start_tick: 0,
            duration_ticks: 480,
            start_time_ms: 0.0,
            duration_ms: 500.0,
            measure,
            beat: 1.0,
            voice: 0,
            is_grace_note: false,
            rhythmic_value: RhythmicValue::Quarter,
        }
    }

    fn pair(id: u32, measure: u32, timing_dev_ms: f64) -> AlignedPair {
        AlignedPair {
            score_note: score_note(id, measure),
            performance_note: PerformanceNote {
                id: PerformanceNoteId::from(id as usize),
                pitch: 60,
                velocity: 80,
                start_time_ms: timing_dev_ms,
                duration_ms: 480.0,
                start_tick: None,
            },
            confidence: 1.0,
            timing_dev_ms,
            timing_dev_beats: timing_dev_ms / 60_000.0,
        }
    }

    #[test]
    fn groups_by_measure_and_averages_timing_within_group() {
        let pairs = vec![pair(0, 1, 10.0), pair(1, 1, -30.0), pair(2, 2, 0.0)];
        let breakdown = per_measure_breakdown(&pairs, &[], |_| true);
        assert_eq!(breakdown.len(), 2);
        let measure1 = breakdown.iter().find(|b| b.measure == 1).unwrap();
        assert_eq!(measure1.total, 2);
        assert_eq!(measure1.correct, 2);
        assert!((measure1.mean_abs_timing_error_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn missed_notes_count_toward_total_but_not_correct() {
        let pairs = vec![pair(0, 1, 0.0)];
        let missed = vec![MissedNote {
            score_note: score_note(1, 1),
            reason: MissReason::Skipped,
        }];
        let breakdown = per_measure_breakdown(&pairs, &missed, |_| true);
        let measure1 = breakdown.iter().find(|b| b.measure == 1).unwrap();
        assert_eq!(measure1.total, 2);
        assert_eq!(measure1.correct, 1);
    }
}

//! Rhythm evaluator (spec.md §4.5): timing-deviation statistics over
//! aligned pairs, grounded in the same percentage-banded style
//! `xstraven-trumpet-rs::scoring::analyzer` uses for its timing tendency,
//! adapted from beats to the millisecond deviations `AlignedPair` carries.

use crate::evaluate::{per_measure_breakdown, Issue, MeasureScores, Severity};
use crate::model::AlignmentResult;

/// A performance note within this many milliseconds of its expected time
/// counts as "on time".
pub const ON_TIME_TOLERANCE_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RhythmBias {
    Rushing,
    Dragging,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rhythm {
    pub score: f64,
    pub mean_abs_timing_error_ms: f64,
    pub std_dev_ms: f64,
    pub on_time_percent: f64,
    pub bias: RhythmBias,
    pub per_measure_breakdown: MeasureScores,
    pub issues: Vec<Issue>,
}

pub fn evaluate(alignment: &AlignmentResult) -> Rhythm {
    if alignment.pairs.is_empty() {
        return Rhythm {
            score: 0.0,
            mean_abs_timing_error_ms: 0.0,
            std_dev_ms: 0.0,
            on_time_percent: 0.0,
            bias: RhythmBias::Balanced,
            per_measure_breakdown: vec![],
            issues: vec![Issue {
                severity: Severity::Critical,
                message: "no matched notes to measure timing on".into(),
                measure: None,
            }],
        };
    }

    let deviations: Vec<f64> = alignment.pairs.iter().map(|p| p.timing_dev_ms).collect();
    let n = deviations.len() as f64;
    let mean_signed = deviations.iter().sum::<f64>() / n;
    let mean_abs_timing_error_ms = deviations.iter().map(|d| d.abs()).sum::<f64>() / n;
    let variance = deviations.iter().map(|d| (d - mean_signed).powi(2)).sum::<f64>() / n;
    let std_dev_ms = variance.sqrt();

    let on_time = deviations.iter().filter(|d| d.abs() <= ON_TIME_TOLERANCE_MS).count();
    let on_time_percent = 100.0 * on_time as f64 / n;

    let bias = if mean_signed < -10.0 {
        RhythmBias::Rushing
    } else if mean_signed > 10.0 {
        RhythmBias::Dragging
    } else {
        RhythmBias::Balanced
    };

    let score = (100.0 - mean_abs_timing_error_ms / 5.0).clamp(0.0, 100.0);

    let measure_breakdown = per_measure_breakdown(&alignment.pairs, &[], |p| p.timing_dev_ms.abs() <= ON_TIME_TOLERANCE_MS);

    let mut issues = vec![];
    if on_time_percent < 60.0 {
        issues.push(Issue {
            severity: Severity::Warning,
            message: format!("only {on_time_percent:.0}% of notes landed within {ON_TIME_TOLERANCE_MS:.0}ms of the beat"),
            measure: None,
        });
    }
    match bias {
        RhythmBias::Rushing => issues.push(Issue {
            severity: Severity::Info,
            message: "tends to rush ahead of the beat".into(),
            measure: None,
        }),
        RhythmBias::Dragging => issues.push(Issue {
            severity: Severity::Info,
            message: "tends to drag behind the beat".into(),
            measure: None,
        }),
        RhythmBias::Balanced => {}
    }

    Rhythm {
        score,
        mean_abs_timing_error_ms,
        std_dev_ms,
        on_time_percent,
        bias,
        per_measure_breakdown: measure_breakdown,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlignedPair, PerformanceNote, PerformanceNoteId, RhythmicValue, ScoreNote, ScoreNoteId};

    fn pair(timing_dev_ms: f64, measure: u32) -> AlignedPair {
        AlignedPair {
            score_note: ScoreNote {
                id: ScoreNoteId::from(0usize),
                pitch: 60,
                velocity: 80,
                start_tick: 0,
                duration_ticks: 480,
                start_time_ms: 1000.0,
                duration_ms: 500.0,
                measure,
                beat: 1.0,
                voice: 0,
                is_grace_note: false,
                rhythmic_value: RhythmicValue::Quarter,
            },
            performance_note: PerformanceNote {
                id: PerformanceNoteId::from(0usize),
                pitch: 60,
                velocity: 80,
                start_time_ms: 1000.0 + timing_dev_ms,
                duration_ms: 480.0,
                start_tick: None,
            },
            confidence: 1.0,
            timing_dev_ms,
            timing_dev_beats: timing_dev_ms / 60_000.0,
        }
    }

    fn alignment(pairs: Vec<AlignedPair>) -> AlignmentResult {
        AlignmentResult {
            pairs,
            missed: vec![],
            extra: vec![],
            total_cost: 0.0,
            normalized_score: 1.0,
            warping_path: None,
            estimated_tempo_ratio: 1.0,
            time_offset_ms: 0.0,
            algorithm_name: "test".to_string(),
            compute_time: std::time::Duration::default(),
        }
    }

    #[test]
    fn perfectly_on_time_scores_high() {
        let result = evaluate(&alignment(vec![pair(0.0, 1), pair(0.0, 1), pair(0.0, 1)]));
        assert_eq!(result.on_time_percent, 100.0);
        assert_eq!(result.bias, RhythmBias::Balanced);
        assert!(result.score >= 99.0);
    }

    #[test]
    fn consistently_early_is_flagged_rushing() {
        let result = evaluate(&alignment(vec![pair(-50.0, 1), pair(-60.0, 1), pair(-55.0, 1)]));
        assert_eq!(result.bias, RhythmBias::Rushing);
    }

    #[test]
    fn consistently_late_is_flagged_dragging() {
        let result = evaluate(&alignment(vec![pair(50.0, 1), pair(60.0, 1), pair(55.0, 1)]));
        assert_eq!(result.bias, RhythmBias::Dragging);
    }

    #[test]
    fn no_pairs_is_zero_not_panicking() {
        let result = evaluate(&alignment(vec![]));
        assert_eq!(result.score, 0.0);
        assert!(!result.issues.is_empty());
    }

    #[test]
    fn mean_abs_error_matches_hand_computed_value() {
        use assert_approx_eq::assert_approx_eq;
        // |-30| + |20| + |10| = 60, over 3 pairs = 20.0 ms average.
        let result = evaluate(&alignment(vec![pair(-30.0, 1), pair(20.0, 1), pair(10.0, 1)]));
        assert_approx_eq!(result.mean_abs_timing_error_ms, 20.0, 0.001);
    }
}

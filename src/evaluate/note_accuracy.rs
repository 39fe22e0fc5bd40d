//! NoteAccuracy evaluator (spec.md §4.5): weighted correctness ratio over
//! correct/wrong/missed/extra/octave-error counts, grounded in
//! `xstraven-trumpet-rs::scoring::analyzer`'s `notes_correct`/`notes_wrong_pitch`/
//! `notes_missed` tallying, adapted from pitch-cents matching to the
//! alignment-derived counts already produced upstream.

use crate::evaluate::{per_measure_breakdown, Issue, MeasureScores, Severity};
use crate::model::AlignmentResult;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NoteAccuracyWeights {
    pub wrong_penalty: f64,
    pub missed_penalty: f64,
    pub extra_penalty: f64,
    pub octave_credit: f64,
}

impl Default for NoteAccuracyWeights {
    fn default() -> Self {
        NoteAccuracyWeights {
            wrong_penalty: 1.0,
            missed_penalty: 1.0,
            extra_penalty: 0.5,
            octave_credit: 0.5,
        }
    }
}

impl NoteAccuracyWeights {
    /// Octave errors earn no partial credit, extras cost as much as wrongs.
    pub fn strict() -> Self {
        NoteAccuracyWeights {
            wrong_penalty: 1.0,
            missed_penalty: 1.2,
            extra_penalty: 1.0,
            octave_credit: 0.0,
        }
    }

    /// Octave errors are nearly free, extras barely matter.
    pub fn lenient() -> Self {
        NoteAccuracyWeights {
            wrong_penalty: 0.7,
            missed_penalty: 0.8,
            extra_penalty: 0.2,
            octave_credit: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NoteAccuracy {
    pub score: f64,
    pub grade: Grade,
    pub total_expected: usize,
    pub correct: usize,
    pub wrong: usize,
    pub missed: usize,
    pub extra: usize,
    pub octave_errors: usize,
    pub per_measure_breakdown: MeasureScores,
    pub issues: Vec<Issue>,
}

pub fn evaluate(alignment: &AlignmentResult, weights: &NoteAccuracyWeights) -> NoteAccuracy {
    let octave_errors = alignment.pairs.iter().filter(|p| p.is_octave_error()).count();
    let correct = alignment.pairs.iter().filter(|p| p.is_exact_pitch_match()).count();
    let wrong = alignment.pairs.len() - correct - octave_errors;
    let missed = alignment.missed.len();
    let extra = alignment.extra.len();
    let total_expected = alignment.pairs.len() + missed;

    let score = if total_expected == 0 {
        0.0
    } else {
        let raw = (correct as f64 + octave_errors as f64 * weights.octave_credit
            - wrong as f64 * weights.wrong_penalty
            - missed as f64 * weights.missed_penalty
            - extra as f64 * weights.extra_penalty)
            / total_expected as f64;
        (raw * 100.0).clamp(0.0, 100.0)
    };

    let measure_breakdown = per_measure_breakdown(&alignment.pairs, &alignment.missed, |p| p.is_exact_pitch_match());

    let mut issues = vec![];
    if missed > 0 {
        issues.push(Issue {
            severity: if missed as f64 / total_expected.max(1) as f64 > 0.2 {
                Severity::Critical
            } else {
                Severity::Warning
            },
            message: format!("{missed} note{} missed", if missed == 1 { "" } else { "s" }),
            measure: None,
        });
    }
    if octave_errors > 0 {
        issues.push(Issue {
            severity: Severity::Warning,
            message: format!("{octave_errors} octave error{}", if octave_errors == 1 { "" } else { "s" }),
            measure: None,
        });
    }
    if wrong > 0 {
        issues.push(Issue {
            severity: Severity::Warning,
            message: format!("{wrong} wrong pitch{}", if wrong == 1 { "" } else { "es" }),
            measure: None,
        });
    }
    if extra > 0 {
        issues.push(Issue {
            severity: Severity::Info,
            message: format!("{extra} extra note{} played", if extra == 1 { "" } else { "s" }),
            measure: None,
        });
    }

    NoteAccuracy {
        score,
        grade: Grade::from_score(score),
        total_expected,
        correct,
        wrong,
        missed,
        extra,
        octave_errors,
        per_measure_breakdown: measure_breakdown,
        issues,
    }
}

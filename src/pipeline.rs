//! Top-level entry points (spec.md §6): `evaluate_pipeline` runs alignment
//! plus all three evaluators and feedback synthesis; `evaluate_notes_only`
//! is a cheap alignment-only summary for callers that don't need the full
//! report.

use std::time::Instant;

use crate::align::{AlignmentStrategy, Hybrid};
use crate::error::Result;
use crate::evaluate::{note_accuracy, rhythm, tempo, Issue, NoteAccuracy, NoteAccuracyWeights, Rhythm, Tempo};
use crate::feedback::{FeedbackGenerator, FeedbackReport};
use crate::model::{AlignmentResult, Performance, Score};
use crate::options::AlignmentOptions;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FullResult {
    pub alignment: AlignmentResult,
    pub note_accuracy: NoteAccuracy,
    pub rhythm: Rhythm,
    pub tempo: Tempo,
    pub feedback: FeedbackReport,
    pub total_processing_time: std::time::Duration,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuickResult {
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    pub top_issues: Vec<Issue>,
}

/// Runs the Hybrid aligner, all three evaluators, and feedback synthesis.
pub fn evaluate_pipeline(score: &Score, performance: &Performance, options: &AlignmentOptions) -> Result<FullResult> {
    let start = Instant::now();
    let alignment = Hybrid::new().align(score, performance, options)?;
    let note_accuracy = note_accuracy::evaluate(&alignment, &NoteAccuracyWeights::default());
    let rhythm = rhythm::evaluate(&alignment);
    let tempo = tempo::evaluate(&alignment, score);
    let feedback = FeedbackGenerator::new().generate(&note_accuracy, &rhythm, &tempo);

    Ok(FullResult {
        alignment,
        note_accuracy,
        rhythm,
        tempo,
        feedback,
        total_processing_time: start.elapsed(),
    })
}

/// Runs alignment and the NoteAccuracy evaluator only, for callers that
/// need a quick correctness summary without rhythm/tempo/feedback.
pub fn evaluate_notes_only(score: &Score, performance: &Performance) -> Result<QuickResult> {
    let options = AlignmentOptions::default();
    let alignment = Hybrid::new().align(score, performance, &options)?;
    let note_accuracy = note_accuracy::evaluate(&alignment, &NoteAccuracyWeights::default());

    let mut top_issues = note_accuracy.issues.clone();
    top_issues.truncate(3);

    Ok(QuickResult {
        score: note_accuracy.score,
        correct: note_accuracy.correct,
        total: note_accuracy.total_expected,
        top_issues,
    })
}

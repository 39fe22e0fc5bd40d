//! Feedback synthesis (spec.md §4.5 cont'd): folds the three evaluator
//! outputs into a single report, following the percentage-banded
//! encouragement style `xstraven-trumpet-rs::scoring::analyzer` generates
//! ("Excellent!"/"Good job!"/"Keep practicing!"/"This one's tough!"),
//! translated from brass-playing cues to piano-coaching ones.

use crate::evaluate::{Issue, NoteAccuracy, Rhythm, Severity, Tempo};

const MAX_TOP_ISSUES: usize = 5;
const MEASURE_ATTENTION_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeedbackReport {
    pub overall_score: f64,
    pub summary: String,
    pub top_issues: Vec<Issue>,
    pub measures_needing_attention: Vec<(u32, String)>,
}

pub struct FeedbackGenerator;

impl FeedbackGenerator {
    pub fn new() -> Self {
        FeedbackGenerator
    }

    pub fn generate(&self, note_accuracy: &NoteAccuracy, rhythm: &Rhythm, tempo: &Tempo) -> FeedbackReport {
        let overall_score = 0.5 * note_accuracy.score + 0.3 * rhythm.score + 0.2 * tempo.score;

        let summary = if overall_score >= 90.0 {
            format!("Excellent! {:.0}% overall accuracy.", overall_score)
        } else if overall_score >= 70.0 {
            format!("Good job! {:.0}% overall accuracy.", overall_score)
        } else if overall_score >= 50.0 {
            format!("Keep practicing! {:.0}% overall accuracy.", overall_score)
        } else {
            format!("This one's tough! {:.0}% overall accuracy. Try slowing the tempo down.", overall_score)
        };

        let mut top_issues: Vec<Issue> = note_accuracy
            .issues
            .iter()
            .chain(rhythm.issues.iter())
            .chain(tempo.issues.iter())
            .cloned()
            .collect();
        top_issues.sort_by_key(|i| match i.severity {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        });
        top_issues.truncate(MAX_TOP_ISSUES);

        let mut measures_needing_attention: Vec<(u32, String)> = note_accuracy
            .per_measure_breakdown
            .iter()
            .filter(|b| b.total > 0 && (b.correct as f64 / b.total as f64) < MEASURE_ATTENTION_THRESHOLD)
            .map(|b| {
                (
                    b.measure,
                    format!("note accuracy dipped to {:.0}%", 100.0 * b.correct as f64 / b.total as f64),
                )
            })
            .collect();
        for b in &rhythm.per_measure_breakdown {
            if b.total > 0 && (b.correct as f64 / b.total as f64) < MEASURE_ATTENTION_THRESHOLD {
                measures_needing_attention.push((
                    b.measure,
                    format!("timing slipped, only {:.0}% on time", 100.0 * b.correct as f64 / b.total as f64),
                ));
            }
        }
        measures_needing_attention.sort_by_key(|(m, _)| *m);

        FeedbackReport {
            overall_score,
            summary,
            top_issues,
            measures_needing_attention,
        }
    }
}

impl Default for FeedbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{note_accuracy, rhythm, tempo, NoteAccuracyWeights};
    use crate::model::AlignmentResult;

    fn perfect_alignment() -> AlignmentResult {
        AlignmentResult {
            pairs: vec![],
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
    fn empty_everything_produces_tough_summary_not_panic() {
        let score = crate::model::Score::new(vec![], 480, vec![], vec![], 1);
        let alignment = perfect_alignment();
        let na = note_accuracy::evaluate(&alignment, &NoteAccuracyWeights::default());
        let r = rhythm::evaluate(&alignment);
        let t = tempo::evaluate(&alignment, &score);
        let report = FeedbackGenerator::new().generate(&na, &r, &t);
        assert!(!report.summary.is_empty());
        assert!(report.top_issues.len() <= MAX_TOP_ISSUES);
    }

    #[test]
    fn critical_issues_sort_first() {
        let issues = vec![
            Issue {
                severity: Severity::Info,
                message: "info".into(),
                measure: None,
            },
            Issue {
                severity: Severity::Critical,
                message: "critical".into(),
                measure: None,
            },
        ];
        let mut sorted = issues;
        sorted.sort_by_key(|i| match i.severity {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        });
        assert_eq!(sorted[0].message, "critical");
    }
}

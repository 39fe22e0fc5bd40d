//! Tempo evaluator (spec.md §4.5): compares the detected tempo ratio against
//! the score's own tempo map and reports drift/stability, reusing the
//! windowed-ratio idea `align::median_tempo_ratio` already implements.

use crate::evaluate::Issue;
use crate::model::{AlignmentResult, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DriftDirection {
    Speeding,
    Slowing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tempo {
    pub score: f64,
    pub detected_bpm: f64,
    pub expected_bpm: f64,
    pub tempo_deviation: f64,
    pub tempo_stability: f64,
    pub drift_direction: DriftDirection,
    pub issues: Vec<Issue>,
}

fn bpm_from_us_per_quarter(us_per_quarter: u32) -> f64 {
    60_000_000.0 / us_per_quarter as f64
}

/// Local tempo ratios between consecutive paired notes, same filter
/// `align::median_tempo_ratio` uses (score interval > 10ms to avoid noise
/// from near-simultaneous notes), but returning the whole series rather
/// than collapsing to a single median.
fn local_tempo_ratios(alignment: &AlignmentResult) -> Vec<f64> {
    alignment
        .pairs
        .windows(2)
        .filter_map(|w| {
            let score_interval = w[1].score_note.start_time_ms - w[0].score_note.start_time_ms;
            if score_interval > 10.0 {
                let perf_interval = w[1].performance_note.start_time_ms - w[0].performance_note.start_time_ms;
                Some(perf_interval / score_interval)
            } else {
                None
            }
        })
        .collect()
}

pub fn evaluate(alignment: &AlignmentResult, score: &Score) -> Tempo {
    let expected_bpm = bpm_from_us_per_quarter(score.get_tempo_at(0));
    let ratio = alignment.estimated_tempo_ratio;
    let detected_bpm = expected_bpm / ratio;
    let tempo_deviation = ratio;

    let ratios = local_tempo_ratios(alignment);
    let tempo_stability = if ratios.len() < 2 {
        1.0
    } else {
        let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let variance = ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / ratios.len() as f64;
        (1.0 - variance.sqrt()).clamp(0.0, 1.0)
    };

    let drift_direction = if ratios.len() < 2 {
        DriftDirection::Stable
    } else {
        let half = ratios.len() / 2;
        let first_half = ratios[..half.max(1)].iter().sum::<f64>() / half.max(1) as f64;
        let second_half = ratios[ratios.len() - half.max(1)..].iter().sum::<f64>() / half.max(1) as f64;
        if second_half - first_half > 0.05 {
            DriftDirection::Slowing
        } else if first_half - second_half > 0.05 {
            DriftDirection::Speeding
        } else {
            DriftDirection::Stable
        }
    };

    let deviation_penalty = (tempo_deviation - 1.0).abs() * 200.0;
    let score_value = (100.0 - deviation_penalty).clamp(0.0, 100.0) * (0.5 + 0.5 * tempo_stability);

    let mut issues = vec![];
    if (tempo_deviation - 1.0).abs() > 0.15 {
        issues.push(Issue {
            severity: crate::evaluate::Severity::Warning,
            message: format!("overall tempo is {:.0}% off the marked tempo", (tempo_deviation - 1.0) * 100.0),
            measure: None,
        });
    }
    match drift_direction {
        DriftDirection::Speeding => issues.push(Issue {
            severity: crate::evaluate::Severity::Info,
            message: "tempo speeds up over the course of the performance".into(),
            measure: None,
        }),
        DriftDirection::Slowing => issues.push(Issue {
            severity: crate::evaluate::Severity::Info,
            message: "tempo slows down over the course of the performance".into(),
            measure: None,
        }),
        DriftDirection::Stable => {}
    }

    Tempo {
        score: score_value,
        detected_bpm,
        expected_bpm,
        tempo_deviation,
        tempo_stability,
        drift_direction,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlignedPair, PerformanceNote, PerformanceNoteId, RhythmicValue, ScoreNote, ScoreNoteId};

    fn pair(id: u32, score_ms: f64, perf_ms: f64) -> AlignedPair {
        AlignedPair {
            score_note: ScoreNote {
                id: ScoreNoteId::from(id as usize),
                pitch: 60,
                velocity: 80,
                start_tick: 0,
                duration_ticks: 480,
                start_time_ms: score_ms,
                duration_ms: 500.0,
                measure: 1,
                beat: 1.0,
                voice: 0,
                is_grace_note: false,
                rhythmic_value: RhythmicValue::Quarter,
            },
            performance_note: PerformanceNote {
                id: PerformanceNoteId::from(id as usize),
                pitch: 60,
                velocity: 80,
                start_time_ms: perf_ms,
                duration_ms: 480.0,
                start_tick: None,
            },
            confidence: 1.0,
            timing_dev_ms: perf_ms - score_ms,
            timing_dev_beats: (perf_ms - score_ms) / 60_000.0,
        }
    }

    fn alignment(pairs: Vec<AlignedPair>, ratio: f64) -> AlignmentResult {
        AlignmentResult {
            pairs,
            missed: vec![],
            extra: vec![],
            total_cost: 0.0,
            normalized_score: 1.0,
            warping_path: None,
            estimated_tempo_ratio: ratio,
            time_offset_ms: 0.0,
            algorithm_name: "test".to_string(),
            compute_time: std::time::Duration::default(),
        }
    }

    #[test]
    fn steady_tempo_is_stable_and_scores_high() {
        let score = Score::new(vec![], 480, vec![], vec![], 1);
        let pairs = vec![pair(0, 0.0, 0.0), pair(1, 500.0, 500.0), pair(2, 1000.0, 1000.0)];
        let result = evaluate(&alignment(pairs, 1.0), &score);
        assert!(result.score >= 95.0);
        assert_eq!(result.drift_direction, DriftDirection::Stable);
        assert_eq!(result.tempo_deviation, 1.0);
    }

    #[test]
    fn uniform_slowdown_is_detected_as_deviation() {
        let score = Score::new(vec![], 480, vec![], vec![], 1);
        let pairs = vec![pair(0, 0.0, 0.0), pair(1, 500.0, 600.0), pair(2, 1000.0, 1200.0)];
        let result = evaluate(&alignment(pairs, 1.2), &score);
        assert!(result.tempo_deviation > 1.0);
        assert!(result.score < 100.0);
    }

    #[test]
    fn expected_bpm_reads_from_tempo_map() {
        use crate::model::TempoChange;
        let score = Score::new(
            vec![],
            480,
            vec![TempoChange {
                tick: 0,
                us_per_quarter: 500_000,
            }],
            vec![],
            1,
        );
        let result = evaluate(&alignment(vec![], 1.0), &score);
        assert_eq!(result.expected_bpm, 120.0);
    }
}

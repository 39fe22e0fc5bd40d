//! Alignment strategies: DTW, GSA (affine-gap Needleman-Wunsch), and the
//! Hybrid strategy that composes them. Every strategy is a pure function of
//! its inputs (spec.md §4.1, §5) and is safe to call concurrently on
//! disjoint `Score`/`Performance` pairs.

pub mod dtw;
pub mod gsa;
pub mod hybrid;

use crate::error::{AlignError, Result};
use crate::model::{AlignmentResult, Performance, Score};
use crate::options::AlignmentOptions;

pub use dtw::Dtw;
pub use gsa::Gsa;
pub use hybrid::Hybrid;

/// Capability interface every alignment algorithm implements. Hybrid
/// composes `Dtw` and `Gsa` by owned/borrowed reference, not inheritance
/// (spec.md §9).
pub trait AlignmentStrategy {
    fn align(&self, score: &Score, performance: &Performance, options: &AlignmentOptions) -> Result<AlignmentResult>;
    fn name(&self) -> &'static str;
}

/// Eager input validation shared by every strategy (spec.md §7). Degenerate
/// inputs (either side empty) are intentionally not rejected here — callers
/// detect emptiness themselves and return the degenerate `AlignmentResult`.
pub fn validate_inputs(score: &Score, performance: &Performance) -> Result<()> {
    if score.ppq == 0 {
        return Err(AlignError::InvalidScore("PPQ must be > 0".into()));
    }
    for note in &score.notes {
        if note.duration_ticks == 0 {
            return Err(AlignError::InvalidScore(format!(
                "score note {:?} has non-positive duration_ticks",
                note.id
            )));
        }
        if note.duration_ms <= 0.0 {
            return Err(AlignError::InvalidScore(format!(
                "score note {:?} has non-positive duration_ms",
                note.id
            )));
        }
        if note.start_time_ms < 0.0 {
            return Err(AlignError::InvalidScore(format!(
                "score note {:?} has negative start_time_ms",
                note.id
            )));
        }
    }
    let mut prev_time = f64::NEG_INFINITY;
    for note in &performance.notes {
        if note.start_time_ms < prev_time {
            return Err(AlignError::InvalidPerformance(
                "performance note timestamps must be monotone non-decreasing".into(),
            ));
        }
        prev_time = note.start_time_ms;
    }
    Ok(())
}

/// Checks the (N+1)x(M+1) matrix a DTW/GSA pass would allocate against the
/// configured cell budget, failing fast before any allocation (spec.md §7).
pub fn check_matrix_budget(n: usize, m: usize, options: &AlignmentOptions) -> Result<()> {
    let cells = (n as u64 + 1) * (m as u64 + 1);
    if cells > options.max_matrix_cells {
        return Err(AlignError::TooLarge {
            cells,
            budget: options.max_matrix_cells,
        });
    }
    Ok(())
}

/// Builds the well-formed `AlignmentResult` for a degenerate input (either
/// side empty). Not an error per spec.md §7: every score note becomes a
/// miss, every performance note becomes extra, and `normalized_score` is 0.
pub fn degenerate_result(
    score: &Score,
    performance: &Performance,
    algorithm_name: &str,
    compute_time: std::time::Duration,
) -> AlignmentResult {
    use crate::model::{MissReason, MissedNote};

    let missed = score
        .notes
        .iter()
        .map(|n| MissedNote {
            score_note: *n,
            reason: if n.is_grace_note {
                MissReason::OptionalOrnament
            } else {
                MissReason::Skipped
            },
        })
        .collect();
    AlignmentResult {
        pairs: vec![],
        missed,
        extra: performance.notes.clone(),
        total_cost: f64::INFINITY,
        normalized_score: 0.0,
        warping_path: None,
        estimated_tempo_ratio: 1.0,
        time_offset_ms: 0.0,
        algorithm_name: algorithm_name.to_string(),
        compute_time,
    }
}

/// Median tempo ratio across consecutive diagonal pairs, robust to
/// outliers (spec.md §4.2). Defaults to 1.0 when fewer than two pairs
/// exist, or when every score interval is too small (<= 10ms) to trust.
pub fn median_tempo_ratio(pairs: &[crate::model::AlignedPair]) -> f64 {
    if pairs.len() < 2 {
        return 1.0;
    }
    let mut ratios: Vec<f64> = pairs
        .windows(2)
        .filter_map(|w| {
            let score_interval = w[1].score_note.start_time_ms - w[0].score_note.start_time_ms;
            if score_interval > 10.0 {
                let perf_interval =
                    w[1].performance_note.start_time_ms - w[0].performance_note.start_time_ms;
                Some(perf_interval / score_interval)
            } else {
                None
            }
        })
        .collect();
    if ratios.is_empty() {
        return 1.0;
    }
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = ratios.len() / 2;
    if ratios.len() % 2 == 0 {
        (ratios[mid - 1] + ratios[mid]) / 2.0
    } else {
        ratios[mid]
    }
}

/// Infers why a score note went unplayed by looking at nearby performance
/// notes (spec.md §4.2). `nearby` must be restricted to notes within
/// +/-500ms of the missed note's expected time.
pub fn infer_miss_reason(
    score_note: &crate::model::ScoreNote,
    nearby: &[crate::model::PerformanceNote],
) -> crate::model::MissReason {
    use crate::model::MissReason;

    if score_note.is_grace_note {
        return MissReason::OptionalOrnament;
    }
    if nearby.is_empty() {
        return MissReason::Skipped;
    }
    let shares_pitch_class = nearby
        .iter()
        .any(|n| same_pitch_class(n.pitch, score_note.pitch));
    let very_close_in_time = nearby
        .iter()
        .any(|n| (n.start_time_ms - score_note.start_time_ms).abs() <= 100.0);
    if shares_pitch_class || very_close_in_time {
        MissReason::Substituted
    } else {
        MissReason::TimingMismatch
    }
}

/// Absolute semitone distance between two pitches.
pub fn semitone_distance(a: u8, b: u8) -> u32 {
    (a as i32 - b as i32).unsigned_abs()
}

pub fn same_pitch_class(a: u8, b: u8) -> bool {
    a % 12 == b % 12
}

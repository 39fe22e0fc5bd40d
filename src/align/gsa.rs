//! Global Sequence Alignment: Needleman-Wunsch with an affine-gap
//! approximation (spec.md §4.3). Maximization variant — higher is better,
//! unlike DTW's minimization.
//!
//! Grounded in `apcamargo-needleman-wunsch-typst::algorithm`'s matrix +
//! direction-bitmask traceback shape, adapted from character scoring to the
//! pitch/timing match score spec.md §4.3 defines, and from linear to the
//! affine-gap approximation the spec calls for (consult only the immediate
//! predecessor's direction, not Gotoh's three matrices — an accepted
//! approximation per the Open Questions in spec.md §9).

use std::time::Instant;

use crate::align::{
    check_matrix_budget, degenerate_result, infer_miss_reason, median_tempo_ratio,
    validate_inputs, AlignmentStrategy,
};
use crate::error::Result;
use crate::model::{
    AlignedPair, AlignmentResult, MissedNote, PerformanceNote, Performance, Score, ScoreNote,
};
use crate::options::AlignmentOptions;

const MATCH: f64 = 2.0;
const MISMATCH: f64 = -1.0;
const GAP_OPEN: f64 = -2.0;
const GAP_EXTEND: f64 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Done,
    Diagonal,
    Up,   // missed score note
    Left, // extra performance note
}

pub struct Gsa;

impl Gsa {
    pub fn new() -> Self {
        Gsa
    }
}

impl Default for Gsa {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentStrategy for Gsa {
    fn align(&self, score: &Score, performance: &Performance, options: &AlignmentOptions) -> Result<AlignmentResult> {
        let start = Instant::now();
        validate_inputs(score, performance)?;
        if score.is_empty() || performance.is_empty() {
            return Ok(degenerate_result(score, performance, self.name(), start.elapsed()));
        }
        check_matrix_budget(score.notes.len(), performance.notes.len(), options)?;

        let n = score.notes.len();
        let m = performance.notes.len();
        let mut best = vec![vec![0.0f64; m + 1]; n + 1];
        let mut mv = vec![vec![Move::Done; m + 1]; n + 1];

        for i in 1..=n {
            best[i][0] = gap_score(i, false);
            mv[i][0] = Move::Up;
        }
        for j in 1..=m {
            best[0][j] = gap_score(j, true);
            mv[0][j] = Move::Left;
        }

        for i in 1..=n {
            for j in 1..=m {
                let diag = best[i - 1][j - 1] + match_score(&score.notes[i - 1], &performance.notes[j - 1], options);

                let up_extend_from_up = mv[i - 1][j] == Move::Up;
                let up = best[i - 1][j] + gap_step(up_extend_from_up, false);

                let left_extend_from_left = mv[i][j - 1] == Move::Left;
                let left = best[i][j - 1] + gap_step(left_extend_from_left, true);

                // Tie order: Diagonal >= Up >= Left.
                let (value, direction) = if diag >= up && diag >= left {
                    (diag, Move::Diagonal)
                } else if up >= left {
                    (up, Move::Up)
                } else {
                    (left, Move::Left)
                };
                best[i][j] = value;
                mv[i][j] = direction;
            }
        }

        let (pairs_idx, missed_idx, extra_idx) = traceback(&mv, score, performance, options, n, m);

        let mut pairs: Vec<AlignedPair> = pairs_idx
            .into_iter()
            .map(|(si, pi)| {
                let score_note = &score.notes[si];
                let perf_note = &performance.notes[pi];
                let raw = match_score(score_note, perf_note, options);
                let confidence = ((raw + 1.0) / (MATCH + 1.0)).clamp(0.0, 1.0);
                let timing_dev_ms = perf_note.start_time_ms - score_note.start_time_ms;
                AlignedPair {
                    score_note: *score_note,
                    performance_note: *perf_note,
                    confidence,
                    timing_dev_ms,
                    timing_dev_beats: timing_dev_ms / 60_000.0,
                }
            })
            .collect();
        pairs.sort_by(|a, b| {
            a.score_note
                .start_tick
                .cmp(&b.score_note.start_tick)
                .then(a.score_note.id.cmp(&b.score_note.id))
        });

        let mut missed: Vec<MissedNote> = missed_idx
            .into_iter()
            .map(|si| {
                let note = &score.notes[si];
                let nearby: Vec<PerformanceNote> = performance
                    .notes
                    .iter()
                    .filter(|p| (p.start_time_ms - note.start_time_ms).abs() <= 500.0)
                    .copied()
                    .collect();
                MissedNote {
                    score_note: *note,
                    reason: infer_miss_reason(note, &nearby),
                }
            })
            .collect();
        missed.sort_by_key(|m| m.score_note.id);

        let mut extra: Vec<PerformanceNote> = extra_idx.into_iter().map(|pi| performance.notes[pi]).collect();
        extra.sort_by_key(|p| p.id);

        let exact = pairs.iter().filter(|p| p.is_exact_pitch_match()).count() as f64;
        let octave = pairs.iter().filter(|p| p.is_octave_error()).count() as f64;
        let denom = pairs.len() + missed.len();
        let normalized_score = if denom == 0 {
            0.0
        } else {
            ((exact + 0.5 * octave - 0.1 * extra.len() as f64) / denom as f64).clamp(0.0, 1.0)
        };
        let estimated_tempo_ratio = median_tempo_ratio(&pairs);
        let total_cost = pairs.iter().map(|p| 1.0 - p.confidence).sum::<f64>()
            + missed.len() as f64
            + 0.5 * extra.len() as f64;

        Ok(AlignmentResult {
            pairs,
            missed,
            extra,
            total_cost,
            normalized_score,
            warping_path: None,
            estimated_tempo_ratio,
            time_offset_ms: 0.0,
            algorithm_name: self.name().to_string(),
            compute_time: start.elapsed(),
        })
    }

    fn name(&self) -> &'static str {
        "gsa"
    }
}

/// Gap cost in the score dimension (performance dimension, i.e. extra
/// notes) uses half the penalty, preserving the same asymmetric bias DTW
/// uses (spec.md §4.3).
fn gap_step(extending: bool, is_score_gap: bool) -> f64 {
    let base = if extending { GAP_EXTEND } else { GAP_OPEN };
    if is_score_gap {
        base * 0.5
    } else {
        base
    }
}

fn gap_score(length: usize, is_score_gap: bool) -> f64 {
    if length == 0 {
        return 0.0;
    }
    let raw = GAP_OPEN + GAP_EXTEND * (length as f64 - 1.0);
    if is_score_gap {
        raw * 0.5
    } else {
        raw
    }
}

/// Combined pitch + timing match score (spec.md §4.3). Positive is better.
pub fn match_score(score_note: &ScoreNote, perf_note: &PerformanceNote, options: &AlignmentOptions) -> f64 {
    let semitones = (score_note.pitch as i32 - perf_note.pitch as i32).unsigned_abs() as f64;
    let pitch = if score_note.pitch == perf_note.pitch {
        MATCH
    } else if options.allow_octave_errors && score_note.pitch_class() == perf_note.pitch % 12 {
        MATCH * 0.5
    } else {
        MISMATCH * (semitones / 6.0).min(2.0)
    };

    let delta = (perf_note.start_time_ms - score_note.start_time_ms).abs();
    let mut timing = if delta <= 30.0 {
        0.5
    } else if delta <= options.max_timing_deviation_ms {
        0.3 * (1.0 - delta / options.max_timing_deviation_ms)
    } else {
        -0.5
    };
    if score_note.is_grace_note {
        timing = (timing + 0.3).max(0.0);
    }

    pitch * options.pitch_weight + timing * (1.0 - options.pitch_weight)
}

/// Traces back from (N,M) to (0,0). A diagonal step with a positive match
/// score becomes a pair; a diagonal step with a non-positive match score is
/// split into a miss and an extra rather than forced into a pair (spec.md
/// §4.3).
fn traceback(
    mv: &[Vec<Move>],
    score: &Score,
    performance: &Performance,
    options: &AlignmentOptions,
    n: usize,
    m: usize,
) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
    let mut pairs = vec![];
    let mut missed = vec![];
    let mut extra = vec![];
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        match mv[i][j] {
            Move::Diagonal => {
                let si = i - 1;
                let pi = j - 1;
                let raw = match_score(&score.notes[si], &performance.notes[pi], options);
                if raw > 0.0 {
                    pairs.push((si, pi));
                } else {
                    missed.push(si);
                    extra.push(pi);
                }
                i -= 1;
                j -= 1;
            }
            Move::Up => {
                missed.push(i - 1);
                i -= 1;
            }
            Move::Left => {
                extra.push(j - 1);
                j -= 1;
            }
            Move::Done => break,
        }
    }
    pairs.reverse();
    missed.reverse();
    extra.reverse();
    (pairs, missed, extra)
}

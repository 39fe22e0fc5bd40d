//! Dynamic Time Warping (spec.md §4.2).
//!
//! Cost-matrix DP grounded in the corpus's own DTW/Needleman-Wunsch
//! implementations (`apcamargo-needleman-wunsch-typst::algorithm`,
//! `sreenathkrishnan-smith_waterman::semiglobal`): a `Vec<Vec<f64>>` cost
//! matrix paired with a parallel predecessor-direction matrix, filled
//! row-major, traced back from the bottom-right corner.

use std::time::Instant;

use crate::align::{
    check_matrix_budget, degenerate_result, infer_miss_reason, median_tempo_ratio,
    same_pitch_class, validate_inputs, AlignmentStrategy,
};
use crate::error::Result;
use crate::model::{
    AlignedPair, AlignmentResult, MissedNote, PerformanceNote, Performance, Score, ScoreNote,
    WarpingPoint,
};
use crate::options::AlignmentOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Start,
    Diagonal,
    Left, // extra performance note
    Up,   // missed score note
}

pub struct Dtw;

impl Dtw {
    pub fn new() -> Self {
        Dtw
    }
}

impl Default for Dtw {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentStrategy for Dtw {
    fn align(&self, score: &Score, performance: &Performance, options: &AlignmentOptions) -> Result<AlignmentResult> {
        let start = Instant::now();
        validate_inputs(score, performance)?;
        if score.is_empty() || performance.is_empty() {
            return Ok(degenerate_result(score, performance, self.name(), start.elapsed()));
        }
        check_matrix_budget(score.notes.len(), performance.notes.len(), options)?;

        let n = score.notes.len();
        let m = performance.notes.len();
        let mut cost = vec![vec![0.0f64; m + 1]; n + 1];
        let mut dir = vec![vec![Direction::Start; m + 1]; n + 1];

        for i in 1..=n {
            cost[i][0] = i as f64 * options.gap_penalty;
            dir[i][0] = Direction::Up;
        }
        for j in 1..=m {
            cost[0][j] = j as f64 * options.gap_penalty * 0.5;
            dir[0][j] = Direction::Left;
        }

        for i in 1..=n {
            for j in 1..=m {
                let diag = cost[i - 1][j - 1] + match_cost(&score.notes[i - 1], &performance.notes[j - 1], options);
                let left = cost[i][j - 1] + options.gap_penalty * 0.5;
                let up = cost[i - 1][j] + options.gap_penalty;

                // Tie order: diagonal > left > up.
                let (best, best_dir) = if diag <= left && diag <= up {
                    (diag, Direction::Diagonal)
                } else if left <= up {
                    (left, Direction::Left)
                } else {
                    (up, Direction::Up)
                };
                cost[i][j] = best;
                dir[i][j] = best_dir;
            }
        }

        let path = backtrack(&dir, &cost, n, m);
        let (pairs_idx, used_score, used_perf) = extract_pairs(&path, score, performance, options);

        let mut pairs: Vec<AlignedPair> = pairs_idx
            .into_iter()
            .map(|(si, pi)| build_pair(&score.notes[si], &performance.notes[pi], options))
            .collect();
        pairs.sort_by(|a, b| {
            a.score_note
                .start_tick
                .cmp(&b.score_note.start_tick)
                .then(a.score_note.id.cmp(&b.score_note.id))
        });

        let missed: Vec<MissedNote> = score
            .notes
            .iter()
            .enumerate()
            .filter(|(i, _)| !used_score[*i])
            .map(|(_, note)| {
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

        let extra: Vec<PerformanceNote> = performance
            .notes
            .iter()
            .enumerate()
            .filter(|(i, _)| !used_perf[*i])
            .map(|(_, note)| *note)
            .collect();

        let warping_path: Vec<WarpingPoint> = path
            .iter()
            .filter(|p| p.i > 0 && p.j > 0)
            .map(|p| WarpingPoint {
                score_index: p.i - 1,
                performance_index: p.j - 1,
                cumulative_cost: cost[p.i][p.j],
            })
            .collect();

        let total_cost = cost[n][m];
        let exact = pairs.iter().filter(|p| p.is_exact_pitch_match()).count() as f64;
        let octave = pairs.iter().filter(|p| p.is_octave_error()).count() as f64;
        let denom = pairs.len() + missed.len();
        let normalized_score = if denom == 0 {
            0.0
        } else {
            ((exact + 0.5 * octave - 0.1 * extra.len() as f64) / denom as f64).clamp(0.0, 1.0)
        };
        let estimated_tempo_ratio = median_tempo_ratio(&pairs);

        Ok(AlignmentResult {
            pairs,
            missed,
            extra,
            total_cost,
            normalized_score,
            warping_path: Some(warping_path),
            estimated_tempo_ratio,
            time_offset_ms: 0.0,
            algorithm_name: self.name().to_string(),
            compute_time: start.elapsed(),
        })
    }

    fn name(&self) -> &'static str {
        "dtw"
    }
}

/// Weighted sum of pitch/timing/velocity terms, each normalized to [0,1]
/// before weighting (spec.md §4.2).
pub fn match_cost(score_note: &ScoreNote, perf_note: &PerformanceNote, options: &AlignmentOptions) -> f64 {
    let pitch_cost = if score_note.pitch == perf_note.pitch {
        0.0
    } else if same_pitch_class(score_note.pitch, perf_note.pitch) {
        options.wrong_octave_penalty * options.pitch_weight
    } else {
        let semitones = (score_note.pitch as i32 - perf_note.pitch as i32).unsigned_abs() as f64;
        (semitones / 12.0).min(1.0) * options.pitch_weight
    };

    let delta_ms = (perf_note.start_time_ms - score_note.start_time_ms).abs();
    let mut timing_cost = (delta_ms / options.max_timing_deviation_ms).min(1.0) * options.timing_weight;
    if score_note.is_grace_note && options.relax_grace_note_timing {
        timing_cost *= 0.3;
    }

    let velocity_cost =
        (score_note.velocity as f64 - perf_note.velocity as f64).abs() / 127.0 * options.velocity_weight;

    pitch_cost + timing_cost + velocity_cost
}

fn build_pair(score_note: &ScoreNote, perf_note: &PerformanceNote, options: &AlignmentOptions) -> AlignedPair {
    let cost = match_cost(score_note, perf_note, options);
    let confidence = (1.0 - cost).clamp(0.0, 1.0);
    let timing_dev_ms = perf_note.start_time_ms - score_note.start_time_ms;
    let ms_per_beat = 60_000.0; // beats are abstract here; callers scale via tempo map if needed
    AlignedPair {
        score_note: *score_note,
        performance_note: *perf_note,
        confidence,
        timing_dev_ms,
        timing_dev_beats: timing_dev_ms / ms_per_beat,
    }
}

struct PathPoint {
    i: usize,
    j: usize,
}

fn backtrack(dir: &[Vec<Direction>], _cost: &[Vec<f64>], n: usize, m: usize) -> Vec<PathPoint> {
    let mut points = vec![];
    let (mut i, mut j) = (n, m);
    loop {
        points.push(PathPoint { i, j });
        match dir[i][j] {
            Direction::Diagonal => {
                i -= 1;
                j -= 1;
            }
            Direction::Left => j -= 1,
            Direction::Up => i -= 1,
            Direction::Start => break,
        }
        if i == 0 && j == 0 {
            points.push(PathPoint { i, j });
            break;
        }
    }
    points.reverse();
    points
}

/// Walks the backtracked path, emitting a pair for each diagonal step whose
/// match cost is strictly less than the gap penalty; dedicated indices are
/// tracked so unused notes can be classified as missed/extra afterward.
fn extract_pairs(
    path: &[PathPoint],
    score: &Score,
    performance: &Performance,
    options: &AlignmentOptions,
) -> (Vec<(usize, usize)>, Vec<bool>, Vec<bool>) {
    let mut used_score = vec![false; score.notes.len()];
    let mut used_perf = vec![false; performance.notes.len()];
    let mut pairs = vec![];

    for w in path.windows(2) {
        let (prev, cur) = (&w[0], &w[1]);
        let is_diagonal = cur.i == prev.i + 1 && cur.j == prev.j + 1;
        if !is_diagonal {
            continue;
        }
        let si = cur.i - 1;
        let pi = cur.j - 1;
        let cost = match_cost(&score.notes[si], &performance.notes[pi], options);
        if cost < options.gap_penalty {
            pairs.push((si, pi));
            used_score[si] = true;
            used_perf[pi] = true;
        }
    }
    (pairs, used_score, used_perf)
}

//! The Hybrid strategy: the production aligner (spec.md §4.4). Dispatches
//! to one of three regimes depending on input shape, and composes `Dtw` and
//! `Gsa` by owned value rather than inheritance (spec.md §9).

use std::collections::HashMap;
use std::time::Instant;

use crate::align::dtw::Dtw;
use crate::align::gsa::Gsa;
use crate::align::{degenerate_result, median_tempo_ratio, validate_inputs, AlignmentStrategy};
use crate::error::Result;
use crate::model::{
    AlignedPair, AlignmentResult, MissedNote, PerformanceNote, PerformanceNoteId, Performance,
    Score, ScoreNote,
};
use crate::options::{AlignmentMode, AlignmentOptions};

const SMALL_SEQUENCE_THRESHOLD: usize = 20;
const SIMULTANEITY_WINDOW_TICKS: u32 = 10;

pub struct Hybrid {
    dtw: Dtw,
    gsa: Gsa,
}

impl Hybrid {
    pub fn new() -> Self {
        Hybrid {
            dtw: Dtw::new(),
            gsa: Gsa::new(),
        }
    }
}

impl Default for Hybrid {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentStrategy for Hybrid {
    fn align(&self, score: &Score, performance: &Performance, options: &AlignmentOptions) -> Result<AlignmentResult> {
        let start = Instant::now();
        validate_inputs(score, performance)?;
        if score.is_empty() || performance.is_empty() {
            return Ok(degenerate_result(score, performance, self.name(), start.elapsed()));
        }

        let n = score.notes.len();
        let m = performance.notes.len();

        if options.mode == AlignmentMode::Local {
            log::debug!("hybrid: Local mode requested, aligning in {}ms windows", options.local_window_ms);
            let mut result = align_local_windowed(&self.gsa, score, performance, options)?;
            result.algorithm_name = "hybrid:gsa-local-windowed".to_string();
            result.compute_time = start.elapsed();
            return Ok(result);
        }

        if n <= SMALL_SEQUENCE_THRESHOLD && m <= SMALL_SEQUENCE_THRESHOLD {
            log::debug!("hybrid: routing {n}x{m} input to GSA (small-sequence regime)");
            let mut result = self.gsa.align(score, performance, options)?;
            result.algorithm_name = "hybrid:gsa-small".to_string();
            result.compute_time = start.elapsed();
            return Ok(result);
        }

        let voices = assign_voices(&score.notes);
        let voice_count = voices.iter().map(|v| *v).collect::<std::collections::BTreeSet<_>>().len();

        if voice_count > 1 {
            log::debug!("hybrid: {voice_count} voices detected, routing to per-voice GSA");
            let mut result = align_polyphonic(&self.gsa, score, performance, &voices, options)?;
            result.algorithm_name = "hybrid:gsa-polyphonic".to_string();
            result.compute_time = start.elapsed();
            Ok(result)
        } else {
            log::debug!("hybrid: single voice, {n}x{m} input, routing through DTW tempo estimate + warped GSA");
            let mut result = align_single_voice_large(&self.dtw, &self.gsa, score, performance, options)?;
            result.algorithm_name = "hybrid:dtw+gsa".to_string();
            result.compute_time = start.elapsed();
            Ok(result)
        }
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}

/// Assigns each score note to a 1-based voice number. Trusts the note's own
/// `voice` field when any note carries an explicit assignment (`voice >=
/// 1`); otherwise auto-detects via simultaneity clustering (spec.md §4.4).
///
/// Resolves the Open Question in spec.md §9 about "voice V-i": within each
/// cluster the divisor is that cluster's own member count (not the global
/// maximum), which is the only reading consistent with both "the highest
/// pitch in each cluster goes to voice 1" and "a note without cluster peers
/// is assigned voice 1" holding simultaneously. See DESIGN.md.
fn assign_voices(notes: &[ScoreNote]) -> Vec<u32> {
    if notes.iter().any(|n| n.voice >= 1) {
        return notes.iter().map(|n| n.voice.max(1)).collect();
    }

    let mut order: Vec<usize> = (0..notes.len()).collect();
    order.sort_by_key(|&i| notes[i].start_tick);

    let mut clusters: Vec<Vec<usize>> = vec![];
    for &i in &order {
        match clusters.last_mut() {
            Some(cluster) if notes[i].start_tick - notes[cluster[0]].start_tick <= SIMULTANEITY_WINDOW_TICKS => {
                cluster.push(i);
            }
            _ => clusters.push(vec![i]),
        }
    }

    let mut voice_of = vec![0u32; notes.len()];
    for cluster in &clusters {
        let mut by_pitch = cluster.clone();
        by_pitch.sort_by_key(|&i| notes[i].pitch);
        let size = by_pitch.len() as u32;
        for (rank, &i) in by_pitch.iter().enumerate() {
            voice_of[i] = size - rank as u32;
        }
    }
    voice_of
}

/// Aligns each voice independently with GSA and recombines, per spec.md
/// §4.4. The performance is partitioned by pitch-range proximity to each
/// voice's score range before per-voice alignment runs.
fn align_polyphonic(
    gsa: &Gsa,
    score: &Score,
    performance: &Performance,
    voices: &[u32],
    options: &AlignmentOptions,
) -> Result<AlignmentResult> {
    let mut voice_numbers: Vec<u32> = voices.iter().copied().collect::<std::collections::BTreeSet<_>>().into_iter().collect();
    voice_numbers.sort_unstable();

    let mut voice_ranges: Vec<(u32, u8, u8)> = vec![];
    for &v in &voice_numbers {
        let pitches: Vec<u8> = score
            .notes
            .iter()
            .zip(voices)
            .filter(|(_, &nv)| nv == v)
            .map(|(n, _)| n.pitch)
            .collect();
        let min = *pitches.iter().min().unwrap();
        let max = *pitches.iter().max().unwrap();
        voice_ranges.push((v, min, max));
    }

    let mut perf_by_voice: HashMap<u32, Vec<PerformanceNote>> = voice_numbers.iter().map(|&v| (v, vec![])).collect();
    for note in &performance.notes {
        let mut best_voice = voice_ranges[0].0;
        let mut best_dist = u32::MAX;
        for &(v, min, max) in &voice_ranges {
            let dist = (note.pitch as i32 - min as i32)
                .unsigned_abs()
                .min((note.pitch as i32 - max as i32).unsigned_abs());
            if dist < best_dist {
                best_dist = dist;
                best_voice = v;
            }
        }
        perf_by_voice.get_mut(&best_voice).unwrap().push(*note);
    }

    let mut all_pairs: Vec<AlignedPair> = vec![];
    let mut all_missed: Vec<MissedNote> = vec![];

    for &v in &voice_numbers {
        let voice_score_notes: Vec<ScoreNote> = score
            .notes
            .iter()
            .zip(voices)
            .filter(|(_, &nv)| nv == v)
            .map(|(n, _)| *n)
            .collect();
        if voice_score_notes.is_empty() {
            continue;
        }
        let voice_score = Score::new(voice_score_notes, score.ppq, vec![], vec![], score.total_measures);
        let voice_perf = Performance {
            notes: perf_by_voice.remove(&v).unwrap_or_default(),
            pedal_events: vec![],
            capture_start_ms: performance.capture_start_ms,
        };
        let voice_result = gsa.align(&voice_score, &voice_perf, options)?;
        all_pairs.extend(voice_result.pairs);
        all_missed.extend(voice_result.missed);
    }

    all_pairs.sort_by(|a, b| {
        a.score_note
            .start_tick
            .cmp(&b.score_note.start_tick)
            .then(a.score_note.id.cmp(&b.score_note.id))
    });
    all_missed.sort_by_key(|m| m.score_note.id);

    let used_perf_ids: std::collections::HashSet<PerformanceNoteId> =
        all_pairs.iter().map(|p| p.performance_note.id).collect();
    let extra: Vec<PerformanceNote> = performance
        .notes
        .iter()
        .filter(|n| !used_perf_ids.contains(&n.id))
        .copied()
        .collect();

    Ok(aggregate(all_pairs, all_missed, extra))
}

/// Single-voice, large-input regime: DTW estimates tempo and warping, GSA
/// refines on a tempo-warped copy of the performance, and pairs/extras are
/// restored to reference the original `PerformanceNote`s by id lookup
/// (spec.md §4.4, §9 — never retain pointers into throwaway warped
/// collections).
fn align_single_voice_large(
    dtw: &Dtw,
    gsa: &Gsa,
    score: &Score,
    performance: &Performance,
    options: &AlignmentOptions,
) -> Result<AlignmentResult> {
    let dtw_result = dtw.align(score, performance, options)?;
    let ratio = dtw_result.estimated_tempo_ratio;

    let warped_performance = if (ratio - 1.0).abs() >= 0.01 && ratio > 0.0 {
        Performance {
            notes: performance
                .notes
                .iter()
                .map(|n| PerformanceNote {
                    start_time_ms: n.start_time_ms / ratio,
                    ..*n
                })
                .collect(),
            pedal_events: performance.pedal_events.clone(),
            capture_start_ms: performance.capture_start_ms,
        }
    } else {
        performance.clone()
    };

    let gsa_options = AlignmentOptions {
        allow_tempo_flexibility: false,
        ..options.clone()
    };
    let gsa_result = gsa.align(score, &warped_performance, &gsa_options)?;

    let original_by_id: HashMap<PerformanceNoteId, PerformanceNote> =
        performance.notes.iter().map(|n| (n.id, *n)).collect();

    let pairs: Vec<AlignedPair> = gsa_result
        .pairs
        .into_iter()
        .map(|mut pair| {
            let original = original_by_id[&pair.performance_note.id];
            pair.timing_dev_ms = original.start_time_ms - pair.score_note.start_time_ms;
            pair.timing_dev_beats = pair.timing_dev_ms / 60_000.0;
            pair.performance_note = original;
            pair
        })
        .collect();
    let extra: Vec<PerformanceNote> = gsa_result
        .extra
        .into_iter()
        .map(|n| original_by_id[&n.id])
        .collect();

    let mut result = aggregate(pairs, gsa_result.missed, extra);
    result.estimated_tempo_ratio = ratio;
    Ok(result)
}

/// `AlignmentMode::Local` regime: the caller's retry path after a `TooLarge`
/// error (spec.md §7). Splits the score into chronological chunks spanning
/// at most `local_window_ms` each, aligns each chunk against the
/// performance notes falling in its time span with GSA, and concatenates
/// the results. Bounds matrix size by construction rather than by the
/// global cell budget.
fn align_local_windowed(gsa: &Gsa, score: &Score, performance: &Performance, options: &AlignmentOptions) -> Result<AlignmentResult> {
    let mut chunks: Vec<Vec<ScoreNote>> = vec![];
    let mut current: Vec<ScoreNote> = vec![];
    for &note in &score.notes {
        if let Some(first) = current.first() {
            if note.start_time_ms - first.start_time_ms > options.local_window_ms {
                chunks.push(std::mem::take(&mut current));
            }
        }
        current.push(note);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let mut all_pairs: Vec<AlignedPair> = vec![];
    let mut all_missed: Vec<MissedNote> = vec![];
    let mut used_perf_ids: std::collections::HashSet<PerformanceNoteId> = std::collections::HashSet::new();

    for chunk in chunks {
        let window_start = chunk.first().unwrap().start_time_ms;
        let window_end = chunk.last().unwrap().start_time_ms;
        let chunk_perf: Vec<PerformanceNote> = performance
            .notes
            .iter()
            .filter(|n| n.start_time_ms >= window_start - options.local_window_ms * 0.5 && n.start_time_ms <= window_end + options.local_window_ms * 0.5)
            .copied()
            .collect();
        let chunk_score = Score::new(chunk, score.ppq, vec![], vec![], score.total_measures);
        let chunk_performance = Performance {
            notes: chunk_perf,
            pedal_events: vec![],
            capture_start_ms: performance.capture_start_ms,
        };
        let result = gsa.align(&chunk_score, &chunk_performance, options)?;
        for pair in result.pairs {
            used_perf_ids.insert(pair.performance_note.id);
            all_pairs.push(pair);
        }
        all_missed.extend(result.missed);
    }

    let extra: Vec<PerformanceNote> = performance
        .notes
        .iter()
        .filter(|n| !used_perf_ids.contains(&n.id))
        .copied()
        .collect();

    Ok(aggregate(all_pairs, all_missed, extra))
}

/// Aggregate metrics for Hybrid output (spec.md §4.4).
fn aggregate(mut pairs: Vec<AlignedPair>, missed: Vec<MissedNote>, extra: Vec<PerformanceNote>) -> AlignmentResult {
    pairs.sort_by(|a, b| {
        a.score_note
            .start_tick
            .cmp(&b.score_note.start_tick)
            .then(a.score_note.id.cmp(&b.score_note.id))
    });
    let total_cost =
        pairs.iter().map(|p| 1.0 - p.confidence).sum::<f64>() + missed.len() as f64 + 0.5 * extra.len() as f64;
    let exact = pairs.iter().filter(|p| p.is_exact_pitch_match()).count() as f64;
    let octave = pairs.iter().filter(|p| p.is_octave_error()).count() as f64;
    let denom = pairs.len() + missed.len();
    let normalized_score = if denom == 0 {
        0.0
    } else {
        ((exact + 0.5 * octave - 0.1 * extra.len() as f64) / denom as f64).clamp(0.0, 1.0)
    };
    let estimated_tempo_ratio = median_tempo_ratio(&pairs);

    AlignmentResult {
        pairs,
        missed,
        extra,
        total_cost,
        normalized_score,
        warping_path: None,
        estimated_tempo_ratio,
        time_offset_ms: 0.0,
        algorithm_name: "hybrid".to_string(),
        compute_time: std::time::Duration::default(),
    }
}

//! Immutable score and performance records, plus alignment result types.
//!
//! Mirrors the teacher's `selim::score::ScoreNote` (a bare `(time, pitch)`
//! pair) generalized to the full attribute set a piano-coaching evaluation
//! needs: velocity, durations, measure/beat placement, voice, grace-note
//! flags, and rhythmic value. Ids are typed indices (`index_vec`) so score-
//! space and performance-space indices can never be mixed up by accident —
//! the same discipline `algo02_polyphonoflex.rs` uses for `PitchIdx` /
//! `ScoreOffsetIdx` / `MatchOffsetIdx`.

use index_vec::define_index_type;
use serde::{Deserialize, Serialize};

define_index_type! {
    pub struct ScoreNoteId = u32;
}

define_index_type! {
    pub struct PerformanceNoteId = u32;
}

/// A note in a musical score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreNote {
    pub id: ScoreNoteId,
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u32,
    pub duration_ticks: u32,
    pub start_time_ms: f64,
    pub duration_ms: f64,
    pub measure: u32,
    pub beat: f64,
    /// 0 = unassigned; voice separation (§4.4) fills this in when absent.
    pub voice: u32,
    pub is_grace_note: bool,
    pub rhythmic_value: RhythmicValue,
}

impl ScoreNote {
    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

/// Flattened rather than a recursive `Dotted(Box<RhythmicValue>)` /
/// `Triplet(Box<RhythmicValue>)` wrapper so the type stays `Copy` — scores
/// only ever nest a dot or a triplet one level deep in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RhythmicValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    DottedWhole,
    DottedHalf,
    DottedQuarter,
    DottedEighth,
    DottedSixteenth,
    TripletQuarter,
    TripletEighth,
    TripletSixteenth,
}

/// A note captured from a live keyboard performance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceNote {
    pub id: PerformanceNoteId,
    pub pitch: u8,
    pub velocity: u8,
    pub start_time_ms: f64,
    pub duration_ms: f64,
    pub start_tick: Option<u32>,
}

/// A tick-indexed tempo change: at `tick`, the active tempo becomes
/// `us_per_quarter` microseconds per quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u32,
    pub us_per_quarter: u32,
}

/// A tick-indexed time-signature change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureChange {
    pub tick: u32,
    pub numerator: u8,
    pub denominator: u8,
}

/// A complete ground-truth score: notes plus the tempo/time-signature maps
/// needed to resolve a tick to wall-clock time. Immutable once constructed.
///
/// Adapted from `scorelib::timemap`'s walk-in-score-order approach: changes
/// apply from their tick forward, and `get_tempo_at` binary-searches the
/// sorted change list for the entry in effect at a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub notes: Vec<ScoreNote>,
    pub ppq: u32,
    tempo_map: Vec<TempoChange>,
    time_signature_map: Vec<TimeSignatureChange>,
    pub total_measures: u32,
}

const DEFAULT_US_PER_QUARTER: u32 = 500_000; // 120 BPM

impl Score {
    pub fn new(
        notes: Vec<ScoreNote>,
        ppq: u32,
        mut tempo_map: Vec<TempoChange>,
        mut time_signature_map: Vec<TimeSignatureChange>,
        total_measures: u32,
    ) -> Self {
        tempo_map.sort_by_key(|t| t.tick);
        time_signature_map.sort_by_key(|t| t.tick);
        Score {
            notes,
            ppq,
            tempo_map,
            time_signature_map,
            total_measures,
        }
    }

    /// The active tempo (microseconds per quarter note) at `tick`.
    /// Defined for all ticks: before the first recorded change, the default
    /// of 120 BPM applies.
    pub fn get_tempo_at(&self, tick: u32) -> u32 {
        match self.tempo_map.partition_point(|t| t.tick <= tick) {
            0 => DEFAULT_US_PER_QUARTER,
            i => self.tempo_map[i - 1].us_per_quarter,
        }
    }

    pub fn get_time_signature_at(&self, tick: u32) -> (u8, u8) {
        match self.time_signature_map.partition_point(|t| t.tick <= tick) {
            0 => (4, 4),
            i => (
                self.time_signature_map[i - 1].numerator,
                self.time_signature_map[i - 1].denominator,
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// A pedal event captured during a performance (sustain, sostenuto, soft).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedalEvent {
    pub kind: PedalKind,
    pub time_ms: f64,
    pub depressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PedalKind {
    Sustain,
    Sostenuto,
    Soft,
}

/// A captured keyboard performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub notes: Vec<PerformanceNote>,
    #[serde(default)]
    pub pedal_events: Vec<PedalEvent>,
    pub capture_start_ms: f64,
}

impl Performance {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Why a score note went unplayed, inferred from nearby performance notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissReason {
    /// No performance note anywhere near the expected time.
    Skipped,
    /// A performance note was played nearby with a different pitch.
    Substituted,
    /// A performance note shares the pitch class or occurs very close in
    /// time, but not close enough to count as a match.
    TimingMismatch,
    /// The score note is a grace note; its absence is not penalized the
    /// same way a structural note's would be.
    OptionalOrnament,
}

/// A score note that went unplayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissedNote {
    pub score_note: ScoreNote,
    pub reason: MissReason,
}

/// A successfully matched (score note, performance note) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub score_note: ScoreNote,
    pub performance_note: PerformanceNote,
    pub confidence: f64,
    /// Signed; positive means the performance note was played late.
    pub timing_dev_ms: f64,
    pub timing_dev_beats: f64,
}

impl AlignedPair {
    pub fn is_exact_pitch_match(&self) -> bool {
        self.score_note.pitch == self.performance_note.pitch
    }

    pub fn is_octave_error(&self) -> bool {
        self.score_note.pitch != self.performance_note.pitch
            && self.score_note.pitch_class() == self.performance_note.pitch % 12
    }

    pub fn pitch_diff_semitones(&self) -> i32 {
        self.performance_note.pitch as i32 - self.score_note.pitch as i32
    }
}

/// A single point along a DTW warping path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpingPoint {
    pub score_index: usize,
    pub performance_index: usize,
    pub cumulative_cost: f64,
}

/// The result of aligning a `Performance` against a `Score`.
///
/// Invariants (tested in `align` submodules):
/// `pairs.len() + missed.len() == score.notes.len()`,
/// `pairs.len() + extra.len() == performance.notes.len()`, and pairs/missed/
/// extra partition the score and performance note sets with no id appearing
/// twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub pairs: Vec<AlignedPair>,
    pub missed: Vec<MissedNote>,
    pub extra: Vec<PerformanceNote>,
    pub total_cost: f64,
    pub normalized_score: f64,
    pub warping_path: Option<Vec<WarpingPoint>>,
    pub estimated_tempo_ratio: f64,
    pub time_offset_ms: f64,
    pub algorithm_name: String,
    pub compute_time: std::time::Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempo_map() -> Score {
        Score::new(
            vec![],
            480,
            vec![
                TempoChange {
                    tick: 0,
                    us_per_quarter: 500_000,
                },
                TempoChange {
                    tick: 1920,
                    us_per_quarter: 400_000,
                },
            ],
            vec![],
            1,
        )
    }

    #[test]
    fn tempo_lookup_before_first_change_uses_default() {
        let score = Score::new(vec![], 480, vec![], vec![], 1);
        assert_eq!(score.get_tempo_at(0), DEFAULT_US_PER_QUARTER);
    }

    #[test]
    fn tempo_lookup_is_defined_everywhere() {
        let score = tempo_map();
        assert_eq!(score.get_tempo_at(0), 500_000);
        assert_eq!(score.get_tempo_at(1919), 500_000);
        assert_eq!(score.get_tempo_at(1920), 400_000);
        assert_eq!(score.get_tempo_at(999_999), 400_000);
    }

    #[test]
    fn pitch_class_wraps_octave() {
        let note = ScoreNote {
            id: ScoreNoteId::from(0usize),
            pitch: 72,
            velocity: 80,
            start_tick: 0,
            duration_ticks: 480,
            start_time_ms: 0.0,
            duration_ms: 500.0,
            measure: 1,
            beat: 1.0,
            voice: 0,
            is_grace_note: false,
            rhythmic_value: RhythmicValue::Quarter,
        };
        assert_eq!(note.pitch_class(), 0);
    }
}

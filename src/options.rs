//! `AlignmentOptions`: an explicit record of cost-function weights and
//! algorithm knobs, plus the `Strict`/`Beginner` presets. Per Design Notes
//! (spec.md §9), this stays a plain struct with named constructors rather
//! than an ad-hoc key-value bag.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMode {
    Global,
    Local,
    SemiGlobal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOptions {
    pub max_timing_deviation_ms: f64,
    pub pitch_weight: f64,
    pub timing_weight: f64,
    pub velocity_weight: f64,
    pub gap_penalty: f64,
    pub wrong_octave_penalty: f64,
    pub allow_tempo_flexibility: bool,
    pub max_tempo_deviation: f64,
    pub mode: AlignmentMode,
    pub local_window_ms: f64,
    pub relax_grace_note_timing: bool,
    pub allow_octave_errors: bool,
    /// Cell budget for DTW/GSA matrices (score.len() * performance.len());
    /// exceeding it returns `AlignError::TooLarge` before allocation.
    pub max_matrix_cells: u64,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        AlignmentOptions {
            max_timing_deviation_ms: 500.0,
            pitch_weight: 0.6,
            timing_weight: 0.3,
            velocity_weight: 0.1,
            gap_penalty: 1.0,
            wrong_octave_penalty: 0.3,
            allow_tempo_flexibility: true,
            max_tempo_deviation: 0.3,
            mode: AlignmentMode::Global,
            local_window_ms: 5000.0,
            relax_grace_note_timing: true,
            allow_octave_errors: true,
            max_matrix_cells: 1_000_000,
        }
    }
}

impl AlignmentOptions {
    /// Tight tolerances for advanced players: little timing slack, no
    /// octave-error forgiveness, a heavier gap penalty.
    pub fn strict() -> Self {
        AlignmentOptions {
            max_timing_deviation_ms: 100.0,
            gap_penalty: 1.5,
            allow_octave_errors: false,
            wrong_octave_penalty: 1.0,
            ..AlignmentOptions::default()
        }
    }

    /// Loose tolerances for beginners: generous timing window, cheap gaps,
    /// octave errors barely penalized.
    pub fn beginner() -> Self {
        AlignmentOptions {
            max_timing_deviation_ms: 1000.0,
            gap_penalty: 0.5,
            wrong_octave_penalty: 0.1,
            ..AlignmentOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let opts = AlignmentOptions::default();
        assert_eq!(opts.max_timing_deviation_ms, 500.0);
        assert_eq!(opts.pitch_weight, 0.6);
        assert_eq!(opts.timing_weight, 0.3);
        assert_eq!(opts.velocity_weight, 0.1);
        assert_eq!(opts.gap_penalty, 1.0);
        assert_eq!(opts.mode, AlignmentMode::Global);
    }

    #[test]
    fn strict_is_tighter_than_beginner() {
        let strict = AlignmentOptions::strict();
        let beginner = AlignmentOptions::beginner();
        assert!(strict.max_timing_deviation_ms < beginner.max_timing_deviation_ms);
        assert!(strict.gap_penalty > beginner.gap_penalty);
        assert!(!strict.allow_octave_errors);
    }
}

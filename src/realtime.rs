//! The real-time evaluator (spec.md §4.6): wraps Hybrid alignment for a
//! streaming note-on/note-off input, using a bounded `crossbeam_channel` as
//! the ring buffer the way the teacher's `device.rs::MInput` owns the
//! receiving end of a bounded MIDI event channel, and the `main.rs` event
//! loop recomputes on a trigger instead of blocking forever on one event.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::align::{AlignmentStrategy, Hybrid};
use crate::error::{AlignError, Result};
use crate::evaluate::{note_accuracy, Issue, NoteAccuracyWeights, Severity};
use crate::model::{PerformanceNote, PerformanceNoteId, Score, ScoreNote};
use crate::options::AlignmentOptions;
use crate::pipeline::{evaluate_pipeline, FullResult};

const RING_BUFFER_CAPACITY: usize = 1024;
const DEFAULT_TRIGGER_NOTE_COUNT: u32 = 4;
const DEFAULT_TRIGGER_INTERVAL_MS: u64 = 200;

struct RawNoteOn {
    pitch: u8,
    velocity: u8,
    elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RealTimeFeedback {
    pub current_measure: u32,
    pub local_accuracy_pct: f64,
    pub issues: Vec<Issue>,
}

/// Streaming counterpart to [`crate::pipeline::evaluate_pipeline`].
/// Lifecycle: `new -> start -> (on_note_on | on_note_off)* -> stop`, with a
/// single owned ring buffer (spec.md §9 — no global mutable state).
pub struct RealTimeEvaluator {
    score: Score,
    options: AlignmentOptions,
    tx: Sender<RawNoteOn>,
    rx: Receiver<RawNoteOn>,
    window: VecDeque<PerformanceNote>,
    captured: Vec<PerformanceNote>,
    next_id: u32,
    notes_since_trigger: u32,
    last_trigger_at: Instant,
    start_instant: Instant,
    running: bool,
    on_feedback: Option<Box<dyn FnMut(&RealTimeFeedback)>>,
    on_error_detected: Option<Box<dyn FnMut(&Issue)>>,
}

impl RealTimeEvaluator {
    pub fn new(score: Score, options: AlignmentOptions) -> Self {
        let (tx, rx) = bounded(RING_BUFFER_CAPACITY);
        RealTimeEvaluator {
            score,
            options,
            tx,
            rx,
            window: VecDeque::new(),
            captured: vec![],
            next_id: 0,
            notes_since_trigger: 0,
            last_trigger_at: Instant::now(),
            start_instant: Instant::now(),
            running: false,
            on_feedback: None,
            on_error_detected: None,
        }
    }

    pub fn on_feedback(&mut self, callback: impl FnMut(&RealTimeFeedback) + 'static) {
        self.on_feedback = Some(Box::new(callback));
    }

    pub fn on_error_detected(&mut self, callback: impl FnMut(&Issue) + 'static) {
        self.on_error_detected = Some(Box::new(callback));
    }

    pub fn start(&mut self) {
        self.start_instant = Instant::now();
        self.last_trigger_at = self.start_instant;
        self.running = true;
    }

    /// Enqueues a note-on event. Must never block (spec.md §5): a full ring
    /// buffer tail-drops the event and raises a non-fatal diagnostic rather
    /// than waiting for room.
    pub fn on_note_on(&mut self, pitch: u8, velocity: u8) {
        if !self.running {
            return;
        }
        let elapsed_ms = self.start_instant.elapsed().as_secs_f64() * 1000.0;
        match self.tx.try_send(RawNoteOn { pitch, velocity, elapsed_ms }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let issue = Issue {
                    severity: Severity::Warning,
                    message: AlignError::RingBufferFull.to_string(),
                    measure: None,
                };
                if let Some(cb) = self.on_error_detected.as_mut() {
                    cb(&issue);
                }
                return;
            }
        }
        self.drain_and_maybe_trigger();
    }

    /// Best-effort duration fill-in: finds the most recent unfinished note
    /// at this pitch and closes it. A note-off with no matching note-on
    /// (e.g. arriving after the window aged it out) is silently ignored.
    pub fn on_note_off(&mut self, pitch: u8) {
        if !self.running {
            return;
        }
        let now_ms = self.start_instant.elapsed().as_secs_f64() * 1000.0;
        if let Some(note) = self.captured.iter_mut().rev().find(|n| n.pitch == pitch && n.duration_ms == 0.0) {
            note.duration_ms = (now_ms - note.start_time_ms).max(1.0);
            if let Some(windowed) = self.window.iter_mut().find(|n| n.id == note.id) {
                windowed.duration_ms = note.duration_ms;
            }
        }
    }

    fn drain_and_maybe_trigger(&mut self) {
        while let Ok(raw) = self.rx.try_recv() {
            let note = PerformanceNote {
                id: PerformanceNoteId::from(self.next_id as usize),
                pitch: raw.pitch,
                velocity: raw.velocity,
                start_time_ms: raw.elapsed_ms,
                duration_ms: 0.0,
                start_tick: None,
            };
            self.next_id += 1;
            self.captured.push(note);
            self.window.push_back(note);
            self.notes_since_trigger += 1;
        }

        let horizon = self.window.back().map(|n| n.start_time_ms).unwrap_or(0.0) - self.options.local_window_ms;
        while self.window.front().map(|n| n.start_time_ms < horizon).unwrap_or(false) {
            self.window.pop_front();
        }

        let elapsed_since_trigger = self.last_trigger_at.elapsed();
        let note_trigger = self.notes_since_trigger >= DEFAULT_TRIGGER_NOTE_COUNT;
        let time_trigger = elapsed_since_trigger >= Duration::from_millis(DEFAULT_TRIGGER_INTERVAL_MS);
        if (note_trigger || time_trigger) && !self.window.is_empty() {
            self.recompute_and_emit();
            self.notes_since_trigger = 0;
            self.last_trigger_at = Instant::now();
        }
    }

    fn recompute_and_emit(&mut self) {
        let window_start_ms = self.window.front().unwrap().start_time_ms;
        let window_end_ms = self.window.back().unwrap().start_time_ms;
        let score_window: Vec<ScoreNote> = self
            .score
            .notes
            .iter()
            .filter(|n| n.start_time_ms >= window_start_ms - self.options.local_window_ms && n.start_time_ms <= window_end_ms)
            .copied()
            .collect();
        let current_measure = score_window.iter().map(|n| n.measure).max().unwrap_or(1);
        let windowed_score = Score::new(score_window, self.score.ppq, vec![], vec![], self.score.total_measures);
        let windowed_performance = crate::model::Performance {
            notes: self.window.iter().copied().collect(),
            pedal_events: vec![],
            capture_start_ms: 0.0,
        };

        let alignment = match Hybrid::new().align(&windowed_score, &windowed_performance, &self.options) {
            Ok(a) => a,
            Err(_) => return,
        };
        let accuracy = note_accuracy::evaluate(&alignment, &NoteAccuracyWeights::default());

        let feedback = RealTimeFeedback {
            current_measure,
            local_accuracy_pct: accuracy.score,
            issues: accuracy.issues.clone(),
        };
        if let Some(cb) = self.on_feedback.as_mut() {
            cb(&feedback);
        }
    }

    /// Runs one full-piece alignment over every captured event so far.
    pub fn get_final_evaluation(&self) -> Result<FullResult> {
        let performance = crate::model::Performance {
            notes: self.captured.clone(),
            pedal_events: vec![],
            capture_start_ms: 0.0,
        };
        evaluate_pipeline(&self.score, &performance, &self.options)
    }

    /// Drains any pending ring-buffer events, emits one final feedback
    /// trigger, and stops accepting new notes.
    pub fn stop(&mut self) {
        self.drain_and_maybe_trigger();
        if !self.window.is_empty() {
            self.recompute_and_emit();
        }
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RhythmicValue, ScoreNoteId};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn note(id: u32, pitch: u8, start_ms: f64) -> ScoreNote {
        ScoreNote {
            id: ScoreNoteId::from(id as usize),
            pitch,
            velocity: 80,
            start_tick: (start_ms * 0.96) as u32,
            duration_ticks: 480,
            start_time_ms: start_ms,
            duration_ms: 500.0,
            measure: 1 + (id / 4),
            beat: 1.0,
            voice: 0,
            is_grace_note: false,
            rhythmic_value: RhythmicValue::Quarter,
        }
    }

    fn test_score() -> Score {
        Score::new(
            (0..8).map(|i| note(i, 60 + (i % 12) as u8, 0.0)).collect(),
            480,
            vec![],
            vec![],
            2,
        )
    }

    #[test]
    fn note_count_trigger_fires_feedback() {
        let feedback_log: Rc<RefCell<Vec<RealTimeFeedback>>> = Rc::new(RefCell::new(vec![]));
        let log_handle = feedback_log.clone();

        let mut evaluator = RealTimeEvaluator::new(test_score(), AlignmentOptions::default());
        evaluator.on_feedback(move |fb| log_handle.borrow_mut().push(fb.clone()));
        evaluator.start();

        for pitch in [60u8, 61, 62, 63] {
            evaluator.on_note_on(pitch, 80);
            evaluator.on_note_off(pitch);
        }

        assert!(!feedback_log.borrow().is_empty());
    }

    #[test]
    fn stop_drains_and_get_final_evaluation_covers_everything() {
        let mut evaluator = RealTimeEvaluator::new(test_score(), AlignmentOptions::default());
        evaluator.start();
        for pitch in [60u8, 61] {
            evaluator.on_note_on(pitch, 80);
            evaluator.on_note_off(pitch);
        }
        evaluator.stop();
        let result = evaluator.get_final_evaluation().unwrap();
        assert_eq!(result.alignment.pairs.len() + result.alignment.missed.len(), 8);
    }

    #[test]
    fn ignored_before_start_does_not_panic() {
        let mut evaluator = RealTimeEvaluator::new(test_score(), AlignmentOptions::default());
        evaluator.on_note_on(60, 80); // not started yet, should be a no-op
        assert!(evaluator.captured.is_empty());
    }
}

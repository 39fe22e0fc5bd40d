//! Alignment and evaluation core for a piano-coaching engine: matches a
//! captured performance against a score (DTW, GSA, or the Hybrid strategy
//! that composes them) and scores note accuracy, rhythm, and tempo.
//!
//! Descended from a real-time MIDI score-follower: the typed-index
//! discipline, the crossbeam-channel producer/consumer shape of the
//! real-time path, and the overall module layout all carry forward from
//! that lineage, generalized from "did the performer follow the score" to
//! "how well did the performer play it".

pub mod align;
pub mod cli;
pub mod error;
pub mod evaluate;
pub mod feedback;
pub mod model;
pub mod options;
pub mod pipeline;
pub mod realtime;

pub use align::{AlignmentStrategy, Dtw, Gsa, Hybrid};
pub use error::{AlignError, Result};
pub use model::{AlignedPair, AlignmentResult, MissedNote, Performance, Score};
pub use options::{AlignmentMode, AlignmentOptions};
pub use pipeline::{evaluate_notes_only, evaluate_pipeline, FullResult, QuickResult};

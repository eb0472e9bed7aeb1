//! Core library for the Motion Coach engine.
//!
//! The engine turns a per-frame stream of body landmarks into counted
//! repetitions, per-rep quality scores and a small stream of coaching
//! instructions. Each module owns one stage of the frame pipeline:
//! geometry, side selection, elevation calibration, rep counting, scoring
//! and coaching. [`ExerciseSession`] wires them together for one exercise.
//!
//! Everything is synchronous and single-threaded. The host drives the engine
//! by calling [`ExerciseSession::process_frame`] with a timestamp in
//! milliseconds; no stage performs I/O or reads the clock on its own.

pub mod coaching;
pub mod config;
pub mod counter;
pub mod elevation;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod pose;
pub mod profile;
pub mod selector;
pub mod session;

pub use coaching::{CoachingFsm, CoachingStep};
pub use config::{
    CoachingConfig, CounterConfig, ElevationConfig, EngineConfig, ScoringConfig, SelectorConfig,
};
pub use counter::{Phase, RepCounter, RepTelemetry, RepUpdate};
pub use elevation::{ElevationReading, ElevationState, ElevationTracker};
pub use error::{MotionError, Result};
pub use feedback::{
    score_rep, CompletedRep, FeedbackScorer, FormCheck, FormStatus, RepEvent, RepFeedback,
};
pub use pose::{BodyPoint, Landmark, PoseSnapshot};
pub use profile::{
    AlignmentCheck, CoachingScript, DepthCheck, DepthDirection, ExerciseProfile, FormMessages,
    Measurement, ProfileCatalog, Side, SidePair, TempoClass, TempoProfile, TempoRange,
};
pub use selector::{MeasurementSample, MeasurementSelector};
pub use session::{ExerciseSession, FrameReport};

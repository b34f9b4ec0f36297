pub mod analytics;
pub mod clock;
pub mod engine;
pub mod error;
pub mod flowing;
pub mod input;
pub mod log;
pub mod midi;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod steps;
pub mod stepwise;

pub use analytics::SessionAnalytics;
pub use engine::PracticeEngine;
pub use error::PracticeError;
pub use input::{HeldPitchSet, InputEvent, InputKind, InputTracker, RawMidiMessage};
pub use log::{SessionLog, SessionLogEntry};
pub use midi::{MidiDevice, MidiInputHub, MidiManager};
pub use scoring::{PerformanceReport, Rating, RatingCounts, ScoringEngine};
pub use session::{PracticeMode, PracticeSessionState, SessionStatus};
pub use steps::{PracticeStep, StepBuilder};

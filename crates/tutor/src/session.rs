use std::fmt;

use serde::{Deserialize, Serialize};

use pianola_domain::Pitch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    /// Each chord advances as soon as it is played.
    #[default]
    Discrete,
    /// Chords must be held while the clock runs through their duration.
    Continuous,
    /// The clock runs freely and presses are matched against a time window.
    Flowing,
}

impl PracticeMode {
    pub fn is_stepwise(self) -> bool {
        !matches!(self, PracticeMode::Flowing)
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PracticeMode::Discrete => "discrete",
            PracticeMode::Continuous => "continuous",
            PracticeMode::Flowing => "flowing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    /// Waiting for the current step's pitches.
    Playing,
    /// A wrong key was pressed; clears itself.
    Waiting,
    /// Continuous mode: the step is held and the clock runs.
    Sustaining,
    /// Flowing mode: the clock runs.
    Flowing,
    Paused,
    Complete,
}

impl SessionStatus {
    pub fn is_active(self) -> bool {
        !matches!(self, SessionStatus::Idle | SessionStatus::Complete)
    }
}

/// Read-only view of the engine for renderers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticeSessionState {
    pub status: SessionStatus,
    pub mode: PracticeMode,
    /// Position in the score, seconds.
    pub practice_clock: f64,
    pub current_step: Option<usize>,
    pub total_steps: usize,
    pub expected_pitches: Vec<Pitch>,
    pub satisfied_pitches: Vec<Pitch>,
    pub rearticulation_pending: Vec<Pitch>,
    pub held_pitches: Vec<Pitch>,
    pub last_wrong_pitch: Option<Pitch>,
    pub skip_available: bool,
    /// Flowing mode: reference notes matched / missed so far.
    pub notes_matched: usize,
    pub notes_missed: usize,
    pub active_device: Option<String>,
    pub error: Option<String>,
}

impl PracticeSessionState {
    pub fn idle(mode: PracticeMode) -> Self {
        Self {
            status: SessionStatus::Idle,
            mode,
            practice_clock: 0.0,
            current_step: None,
            total_steps: 0,
            expected_pitches: Vec::new(),
            satisfied_pitches: Vec::new(),
            rearticulation_pending: Vec::new(),
            held_pitches: Vec::new(),
            last_wrong_pitch: None,
            skip_available: false,
            notes_matched: 0,
            notes_missed: 0,
            active_device: None,
            error: None,
        }
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Rating thresholds for flowing mode, in milliseconds of absolute offset.
/// Each bound is inclusive.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingWindows {
    pub perfect_ms: f64,
    pub great_ms: f64,
    pub okay_ms: f64,
    /// Widest offset at which a press still matches a reference note.
    pub match_ms: f64,
}

impl Default for TimingWindows {
    fn default() -> Self {
        Self {
            perfect_ms: 50.0,
            great_ms: 150.0,
            okay_ms: 300.0,
            match_ms: 500.0,
        }
    }
}

impl TimingWindows {
    pub fn match_secs(&self) -> f64 {
        self.match_ms / 1000.0
    }
}

/// Tuning parameters of the practice engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PracticeConfig {
    /// Notes starting within this distance of a step's first note join that step.
    pub chord_tolerance_ms: f64,
    /// How long a wrong press stays highlighted before readiness is re-checked.
    pub wrong_display_ms: u64,
    /// Time stuck on one step before skipping is offered.
    pub skip_after_ms: u64,
    /// Continuous mode resets a step held longer than
    /// `max(step duration, gap to next step) * over_hold_factor`.
    pub over_hold_factor: f64,
    /// Flowing mode starts this long before the first note.
    pub lead_in_secs: f64,
    /// Flowing mode completes this long after the last note ends.
    pub tail_secs: f64,
    /// Practice clock seconds per wall-clock second.
    pub playback_speed: f64,
    pub windows: TimingWindows,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            chord_tolerance_ms: 30.0,
            wrong_display_ms: 800,
            skip_after_ms: 3000,
            over_hold_factor: 1.5,
            lead_in_secs: 2.0,
            tail_secs: 1.0,
            playback_speed: 1.0,
            windows: TimingWindows::default(),
        }
    }
}

impl PracticeConfig {
    pub fn chord_tolerance_secs(&self) -> f64 {
        self.chord_tolerance_ms / 1000.0
    }

    pub fn with_playback_speed(mut self, speed: f64) -> Self {
        self.playback_speed = speed;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.playback_speed > 0.0 && self.playback_speed.is_finite()) {
            return Err(DomainError::config("playback speed must be positive"));
        }
        if !(self.over_hold_factor > 0.0) {
            return Err(DomainError::config("over-hold factor must be positive"));
        }
        if self.chord_tolerance_ms < 0.0 || self.lead_in_secs < 0.0 || self.tail_secs < 0.0 {
            return Err(DomainError::config(
                "chord tolerance, lead-in and tail cannot be negative",
            ));
        }
        let w = &self.windows;
        if !(0.0 <= w.perfect_ms
            && w.perfect_ms <= w.great_ms
            && w.great_ms <= w.okay_ms
            && w.okay_ms <= w.match_ms)
        {
            return Err(DomainError::config(
                "timing windows must satisfy perfect <= great <= okay <= match",
            ));
        }
        Ok(())
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, DomainError> {
        let config: Self = serde_yaml::from_str(source)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(source: &str) -> Result<Self, DomainError> {
        let config: Self = serde_json::from_str(source)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a `.json` file as JSON and anything else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("read practice config {:?}", path))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&source)
        } else {
            Self::from_yaml_str(&source)
        };
        config.with_context(|| format!("parse practice config {:?}", path))
    }
}

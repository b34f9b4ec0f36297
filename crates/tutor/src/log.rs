//! Append-only record of every judged input, handed to the feedback summarizer.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use pianola_domain::Pitch;

use crate::scoring::Rating;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionLogEntry {
    /// Step index in discrete/continuous mode, reference note index in
    /// flowing mode. `None` for flowing presses that matched nothing.
    pub index: Option<usize>,
    pub expected_pitches: Vec<Pitch>,
    /// `None` for misses.
    pub played_pitch: Option<Pitch>,
    pub correct: bool,
    /// Milliseconds since the session started.
    pub timestamp_ms: u64,
    /// Signed, negative is early. Flowing matches only.
    pub timing_offset_ms: Option<f64>,
    pub rating: Option<Rating>,
}

impl SessionLogEntry {
    pub fn step(
        index: usize,
        expected_pitches: Vec<Pitch>,
        played: Pitch,
        correct: bool,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            index: Some(index),
            expected_pitches,
            played_pitch: Some(played),
            correct,
            timestamp_ms,
            timing_offset_ms: None,
            rating: None,
        }
    }

    pub fn matched(note: usize, pitch: Pitch, offset_ms: f64, rating: Rating, timestamp_ms: u64) -> Self {
        Self {
            index: Some(note),
            expected_pitches: vec![pitch],
            played_pitch: Some(pitch),
            correct: true,
            timestamp_ms,
            timing_offset_ms: Some(offset_ms),
            rating: Some(rating),
        }
    }

    pub fn extra(expected_pitches: Vec<Pitch>, played: Pitch, timestamp_ms: u64) -> Self {
        Self {
            index: None,
            expected_pitches,
            played_pitch: Some(played),
            correct: false,
            timestamp_ms,
            timing_offset_ms: None,
            rating: None,
        }
    }

    pub fn missed(note: usize, pitch: Pitch, timestamp_ms: u64) -> Self {
        Self {
            index: Some(note),
            expected_pitches: vec![pitch],
            played_pitch: None,
            correct: false,
            timestamp_ms,
            timing_offset_ms: None,
            rating: Some(Rating::Miss),
        }
    }

    /// Matched or missed reference note in flowing mode.
    pub fn is_terminal(&self) -> bool {
        self.index.is_some() && self.rating.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionLog {
    pub started_at: Option<OffsetDateTime>,
    entries: Vec<SessionLogEntry>,
    #[serde(skip)]
    origin: Option<Instant>,
}

impl SessionLog {
    /// Clears the log and starts timestamps from `origin`.
    pub fn begin(&mut self, origin: Instant) {
        self.entries.clear();
        self.origin = Some(origin);
        self.started_at = Some(OffsetDateTime::now_utc());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.origin = None;
        self.started_at = None;
    }

    pub fn timestamp_ms(&self, at: Instant) -> u64 {
        self.origin
            .map(|origin| at.saturating_duration_since(origin).as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn push(&mut self, entry: SessionLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[SessionLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}

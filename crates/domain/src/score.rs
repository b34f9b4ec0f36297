use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{events::NoteEvent, DomainError};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PracticeStatistics {
    pub sessions: u32,
    pub average_accuracy: f32,
    pub highest_streak: u32,
    pub current_streak: u32,
    pub last_practiced: Option<OffsetDateTime>,
}

impl PracticeStatistics {
    pub fn new() -> Self {
        Self {
            sessions: 0,
            average_accuracy: 0.0,
            highest_streak: 0,
            current_streak: 0,
            last_practiced: None,
        }
    }
}

impl Default for PracticeStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of a score's notes, sorted by `(start_time, pitch)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Score {
    pub id: String,
    pub title: String,
    pub notes: Vec<NoteEvent>,
    #[serde(default)]
    pub stats: PracticeStatistics,
}

impl Score {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        notes: Vec<NoteEvent>,
    ) -> Result<Self, DomainError> {
        let mut score = Self {
            id: id.into(),
            title: title.into(),
            notes,
            stats: PracticeStatistics::new(),
        };
        score.normalize()?;
        Ok(score)
    }

    /// Validates every note and restores the sort order. Decoders call this
    /// since serialized scores may arrive unsorted.
    pub fn normalize(&mut self) -> Result<(), DomainError> {
        for note in &self.notes {
            note.validate()?;
        }
        sort_notes(&mut self.notes);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Time at which the last note stops sounding.
    pub fn end_time(&self) -> f64 {
        self.notes
            .iter()
            .map(NoteEvent::end_time)
            .fold(0.0, f64::max)
    }

    pub fn tracks(&self) -> Vec<u32> {
        let mut tracks: Vec<u32> = self.notes.iter().map(|n| n.track_id).collect();
        tracks.sort_unstable();
        tracks.dedup();
        tracks
    }

    /// Copy of the score restricted to the given tracks, e.g. one hand.
    /// An empty filter keeps every track.
    pub fn filter_tracks(&self, tracks: &[u32]) -> Score {
        if tracks.is_empty() {
            return self.clone();
        }
        Score {
            notes: self
                .notes
                .iter()
                .filter(|n| tracks.contains(&n.track_id))
                .copied()
                .collect(),
            ..self.clone()
        }
    }
}

pub fn sort_notes(notes: &mut [NoteEvent]) {
    notes.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_constructor_sorts_notes() {
        let score = Score::new(
            "id",
            "title",
            vec![
                NoteEvent::new(64, 1.0, 0.5, 0.8, 0),
                NoteEvent::new(67, 0.0, 0.5, 0.8, 1),
                NoteEvent::new(60, 0.0, 2.0, 0.8, 0),
            ],
        )
        .unwrap();
        let pitches: Vec<_> = score.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 67, 64]);
        assert_eq!(score.end_time(), 2.0);
        assert_eq!(score.tracks(), vec![0, 1]);
        assert_eq!(score.stats.sessions, 0);
    }

    #[test]
    fn score_rejects_invalid_notes() {
        let result = Score::new("id", "title", vec![NoteEvent::new(60, 0.0, -1.0, 0.8, 0)]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn filter_tracks_keeps_one_hand() {
        let score = Score::new(
            "id",
            "title",
            vec![
                NoteEvent::new(40, 0.0, 1.0, 0.8, 1),
                NoteEvent::new(72, 0.0, 1.0, 0.8, 0),
            ],
        )
        .unwrap();
        let right = score.filter_tracks(&[0]);
        assert_eq!(right.notes.len(), 1);
        assert_eq!(right.notes[0].pitch, 72);
        assert_eq!(score.filter_tracks(&[]).notes.len(), 2);
    }
}

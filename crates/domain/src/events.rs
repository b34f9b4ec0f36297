use serde::{Deserialize, Serialize};

use crate::DomainError;

/// MIDI semitone number, 0-127 (middle C = 60).
pub type Pitch = u8;

pub const MAX_PITCH: Pitch = 127;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name, e.g. `60 -> "C4"`.
pub fn pitch_name(pitch: Pitch) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Frequency of a pitch in equal temperament (A4 = 440 Hz).
pub fn pitch_frequency(pitch: Pitch) -> f32 {
    440.0 * 2f32.powf((pitch as f32 - 69.0) / 12.0)
}

/// One sounded note of a score. Times are seconds from the start of the score.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct NoteEvent {
    pub pitch: Pitch,
    pub start_time: f64,
    pub duration: f64,
    /// Normalized 0-1.
    pub velocity: f32,
    /// Groups notes by hand/staff. The practice engine does not read it.
    #[serde(default)]
    pub track_id: u32,
}

impl NoteEvent {
    pub fn new(pitch: Pitch, start_time: f64, duration: f64, velocity: f32, track_id: u32) -> Self {
        Self {
            pitch,
            start_time,
            duration,
            velocity,
            track_id,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// True when the note is still sounding strictly after `time`.
    pub fn sounds_past(&self, time: f64) -> bool {
        self.start_time < time && self.end_time() > time
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.pitch > MAX_PITCH {
            return Err(DomainError::validation(format!(
                "pitch {} is outside 0-127",
                self.pitch
            )));
        }
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(DomainError::validation(
                "notes cannot start before the score",
            ));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(DomainError::validation("note duration must be positive"));
        }
        if !(0.0..=1.0).contains(&self.velocity) {
            return Err(DomainError::validation(
                "note velocity must be normalized to 0-1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(21), "A0");
        assert_eq!(pitch_name(127), "G9");
    }

    #[test]
    fn a4_is_440() {
        assert!((pitch_frequency(69) - 440.0).abs() < 1e-3);
        assert!((pitch_frequency(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn note_validation() {
        assert!(NoteEvent::new(60, 0.0, 0.5, 0.8, 0).validate().is_ok());
        assert!(NoteEvent::new(128, 0.0, 0.5, 0.8, 0).validate().is_err());
        assert!(NoteEvent::new(60, -0.1, 0.5, 0.8, 0).validate().is_err());
        assert!(NoteEvent::new(60, 0.0, 0.0, 0.8, 0).validate().is_err());
        assert!(NoteEvent::new(60, 0.0, 0.5, 1.5, 0).validate().is_err());
    }

    #[test]
    fn sounds_past_is_strict() {
        let note = NoteEvent::new(60, 1.0, 1.0, 0.8, 0);
        assert!(note.sounds_past(1.5));
        assert!(!note.sounds_past(1.0));
        assert!(!note.sounds_past(2.0));
    }
}

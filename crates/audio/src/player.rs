use serde::{Deserialize, Serialize};
use tracing::debug;

use pianola_domain::{NoteEvent, Pitch};

/// A request to sound one reference note.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct NoteCue {
    pub pitch: Pitch,
    pub duration_secs: f64,
    /// Normalized 0-1.
    pub velocity: f32,
}

impl NoteCue {
    pub fn new(pitch: Pitch, duration_secs: f64, velocity: f32) -> Self {
        Self {
            pitch,
            duration_secs,
            velocity,
        }
    }
}

impl From<&NoteEvent> for NoteCue {
    fn from(note: &NoteEvent) -> Self {
        Self::new(note.pitch, note.duration, note.velocity)
    }
}

/// Anything that can sound reference notes for the practice engine.
pub trait AudioPlayer {
    fn start(&mut self, cue: NoteCue);
    /// Silences every sounding cue.
    fn stop(&mut self);
}

impl<P: AudioPlayer + ?Sized> AudioPlayer for Box<P> {
    fn start(&mut self, cue: NoteCue) {
        (**self).start(cue)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

pub struct NullPlayer;

impl AudioPlayer for NullPlayer {
    fn start(&mut self, cue: NoteCue) {
        debug!(?cue, "null player ignoring cue");
    }

    fn stop(&mut self) {}
}

/// Remembers every cue it was asked to play.
#[derive(Debug, Default, Clone)]
pub struct RecordingPlayer {
    pub cues: Vec<NoteCue>,
    pub stops: usize,
}

impl RecordingPlayer {
    pub fn pitches(&self) -> Vec<Pitch> {
        self.cues.iter().map(|cue| cue.pitch).collect()
    }
}

impl AudioPlayer for RecordingPlayer {
    fn start(&mut self, cue: NoteCue) {
        self.cues.push(cue);
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_player_keeps_cues() {
        let mut player = RecordingPlayer::default();
        let note = NoteEvent::new(64, 1.0, 0.25, 0.6, 0);
        player.start(NoteCue::from(&note));
        player.stop();
        assert_eq!(player.pitches(), vec![64]);
        assert_eq!(player.cues[0].duration_secs, 0.25);
        assert_eq!(player.stops, 1);
    }

    #[test]
    fn boxed_players_forward() {
        let mut player: Box<dyn AudioPlayer> = Box::new(NullPlayer);
        player.start(NoteCue::new(60, 0.5, 1.0));
        player.stop();
    }
}

//! Held-key tracking over raw note-on/note-off messages.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use pianola_domain::Pitch;

/// A channel voice message as it arrived from the device, stamped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMidiMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    pub received: Instant,
}

impl RawMidiMessage {
    pub fn from_bytes(bytes: &[u8], received: Instant) -> Option<Self> {
        let (&status, rest) = bytes.split_first()?;
        Some(Self {
            status,
            data1: rest.first().copied().unwrap_or(0),
            data2: rest.get(1).copied().unwrap_or(0),
            received,
        })
    }

    pub fn note_on(pitch: Pitch, velocity: u8, received: Instant) -> Self {
        Self {
            status: 0x90,
            data1: pitch,
            data2: velocity,
            received,
        }
    }

    pub fn note_off(pitch: Pitch, received: Instant) -> Self {
        Self {
            status: 0x80,
            data1: pitch,
            data2: 0,
            received,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputKind {
    Press { velocity: f32 },
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub pitch: Pitch,
    pub kind: InputKind,
    pub at: Instant,
}

/// Keys currently down on the active device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldPitchSet {
    pitches: BTreeSet<Pitch>,
}

impl HeldPitchSet {
    pub fn contains(&self, pitch: Pitch) -> bool {
        self.pitches.contains(&pitch)
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.pitches.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Pitch> {
        self.iter().collect()
    }
}

#[derive(Debug, Default)]
pub struct InputTracker {
    held: HeldPitchSet,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> &HeldPitchSet {
        &self.held
    }

    /// Applies a message to the held set. Returns `None` for anything that
    /// is not a note message.
    pub fn process(&mut self, message: &RawMidiMessage) -> Option<InputEvent> {
        let pitch = message.data1 & 0x7F;
        let kind = match message.status & 0xF0 {
            0x90 if message.data2 > 0 => InputKind::Press {
                velocity: (message.data2 & 0x7F) as f32 / 127.0,
            },
            // Note-on with velocity 0 is a release by convention.
            0x90 | 0x80 => InputKind::Release,
            _ => return None,
        };
        match kind {
            InputKind::Press { .. } => {
                self.held.pitches.insert(pitch);
            }
            InputKind::Release => {
                self.held.pitches.remove(&pitch);
            }
        }
        Some(InputEvent {
            pitch,
            kind,
            at: message.received,
        })
    }

    /// Forgets every held key, e.g. after switching devices.
    pub fn clear(&mut self) {
        self.held.pitches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_presses_and_releases() {
        let now = Instant::now();
        let mut tracker = InputTracker::new();
        let press = tracker.process(&RawMidiMessage::note_on(60, 127, now)).unwrap();
        assert_eq!(press.kind, InputKind::Press { velocity: 1.0 });
        assert!(tracker.held().contains(60));
        tracker.process(&RawMidiMessage::note_on(64, 64, now));
        assert_eq!(tracker.held().to_vec(), vec![60, 64]);
        let release = tracker.process(&RawMidiMessage::note_off(60, now)).unwrap();
        assert_eq!(release.kind, InputKind::Release);
        assert_eq!(tracker.held().to_vec(), vec![64]);
    }

    #[test]
    fn zero_velocity_note_on_releases() {
        let now = Instant::now();
        let mut tracker = InputTracker::new();
        tracker.process(&RawMidiMessage::from_bytes(&[0x91, 62, 90], now).unwrap());
        let event = tracker
            .process(&RawMidiMessage::from_bytes(&[0x91, 62, 0], now).unwrap())
            .unwrap();
        assert_eq!(event.kind, InputKind::Release);
        assert!(tracker.held().is_empty());
    }

    #[test]
    fn ignores_other_messages() {
        let now = Instant::now();
        let mut tracker = InputTracker::new();
        assert!(tracker
            .process(&RawMidiMessage::from_bytes(&[0xB0, 64, 127], now).unwrap())
            .is_none());
        assert!(RawMidiMessage::from_bytes(&[], now).is_none());
        assert!(tracker.held().is_empty());
    }
}

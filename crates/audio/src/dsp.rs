use std::f32::consts::TAU;

use pianola_domain::pitch_frequency;

use crate::player::NoteCue;

/// Voices beyond this steal the oldest slot so the audio thread never allocates.
pub const MAX_VOICES: usize = 32;

const RELEASE_SECS: f32 = 0.03;

/// A decaying sine used for reference cues.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SineVoice {
    step: f32,
    phase: f32,
    gain: f32,
    remaining: usize,
    release: usize,
}

impl SineVoice {
    pub fn new(cue: &NoteCue, sample_rate: f32, master_gain: f32) -> Self {
        let samples = (cue.duration_secs.max(0.0) as f32 * sample_rate) as usize;
        Self {
            step: pitch_frequency(cue.pitch) / sample_rate,
            phase: 0.0,
            gain: (cue.velocity.clamp(0.0, 1.0) * master_gain).clamp(0.0, 1.0),
            remaining: samples,
            release: ((RELEASE_SECS * sample_rate) as usize).clamp(1, samples.max(1)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }
        let envelope = (self.remaining.min(self.release) as f32) / self.release as f32;
        let sample = (TAU * self.phase).sin() * self.gain * envelope;
        self.phase = (self.phase + self.step).fract();
        self.remaining -= 1;
        sample
    }
}

pub struct VoiceBank {
    voices: Vec<SineVoice>,
    sample_rate: f32,
    master_gain: f32,
}

impl VoiceBank {
    pub fn new(sample_rate: f32, master_gain: f32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            sample_rate,
            master_gain,
        }
    }

    pub fn trigger(&mut self, cue: &NoteCue) {
        if self.voices.len() == MAX_VOICES {
            self.voices.remove(0);
        }
        self.voices
            .push(SineVoice::new(cue, self.sample_rate, self.master_gain));
    }

    pub fn silence(&mut self) {
        self.voices.clear();
    }

    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Mixes one mono sample, soft-clipped to -1..1.
    pub fn next_sample(&mut self) -> f32 {
        let mixed: f32 = self.voices.iter_mut().map(SineVoice::next_sample).sum();
        self.voices.retain(|voice| !voice.is_finished());
        mixed.tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_runs_for_cue_duration() {
        let cue = NoteCue::new(69, 0.01, 1.0);
        let mut voice = SineVoice::new(&cue, 1000.0, 0.5);
        let samples: Vec<f32> = (0..12).map(|_| voice.next_sample()).collect();
        assert!(voice.is_finished());
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
        assert_eq!(samples[11], 0.0);
    }

    #[test]
    fn bank_steals_oldest_voice() {
        let mut bank = VoiceBank::new(48_000.0, 0.2);
        for pitch in 0..(MAX_VOICES as u8 + 4) {
            bank.trigger(&NoteCue::new(pitch + 40, 1.0, 0.8));
        }
        assert_eq!(bank.active(), MAX_VOICES);
        let voice = |pitch: u8| SineVoice::new(&NoteCue::new(pitch, 1.0, 0.8), 48_000.0, 0.2);
        let kept: Vec<SineVoice> = (44..MAX_VOICES as u8 + 44).map(voice).collect();
        assert_eq!(bank.voices, kept);
        assert!(bank.next_sample().abs() <= 1.0);
        bank.silence();
        assert_eq!(bank.next_sample(), 0.0);
    }
}

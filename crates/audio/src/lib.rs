pub mod dsp;
pub mod player;
pub mod tone;

pub use dsp::{SineVoice, VoiceBank};
pub use player::{AudioPlayer, NoteCue, NullPlayer, RecordingPlayer};
pub use tone::{TonePlayer, ToneSettings};

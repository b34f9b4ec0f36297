pub mod config;
pub mod error;
pub mod events;
pub mod io;
pub mod score;

pub use crate::config::{PracticeConfig, TimingWindows};
pub use crate::error::DomainError;
pub use crate::events::{pitch_frequency, pitch_name, NoteEvent, Pitch};
pub use crate::io::{ScoreCodec, ScoreFormat, SerdeCodec};
pub use crate::score::{PracticeStatistics, Score};

use serde::{Deserialize, Serialize};

use crate::{error::DomainError, score::Score};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScoreFormat {
    Json,
    Yaml,
}

impl ScoreFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

pub trait ScoreCodec {
    fn export(&self, score: &Score, format: ScoreFormat) -> Result<Vec<u8>, DomainError>;
    fn import(&self, bytes: &[u8], format: ScoreFormat) -> Result<Score, DomainError>;
}

/// Serde-backed codec for the note-list score representation.
pub struct SerdeCodec;

impl ScoreCodec for SerdeCodec {
    fn export(&self, score: &Score, format: ScoreFormat) -> Result<Vec<u8>, DomainError> {
        match format {
            ScoreFormat::Json => serde_json::to_vec_pretty(score)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            ScoreFormat::Yaml => serde_yaml::to_string(score)
                .map(String::into_bytes)
                .map_err(|err| DomainError::Serialization(err.to_string())),
        }
    }

    fn import(&self, bytes: &[u8], format: ScoreFormat) -> Result<Score, DomainError> {
        let mut score: Score = match format {
            ScoreFormat::Json => serde_json::from_slice(bytes)
                .map_err(|err| DomainError::Serialization(err.to_string()))?,
            ScoreFormat::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|err| DomainError::Serialization(err.to_string()))?,
        };
        score.normalize()?;
        Ok(score)
    }
}

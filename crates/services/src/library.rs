use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use pianola_domain::{Score, ScoreCodec, ScoreFormat, SerdeCodec};

/// Yields time-sorted scores by identifier.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn load(&self, id: &str) -> Result<Score>;
    async fn list(&self) -> Result<Vec<String>>;
}

/// Scores stored as `<id>.json`, `<id>.yaml` or `<id>.yml` in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryScoreSource {
    root: PathBuf,
}

impl DirectoryScoreSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads a score file directly; the format follows the extension.
    pub async fn load_path(path: &Path) -> Result<Score> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ScoreFormat::from_extension)
            .ok_or_else(|| anyhow!("unsupported score file {}", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read score {}", path.display()))?;
        let score = SerdeCodec
            .import(&bytes, format)
            .with_context(|| format!("parse score {}", path.display()))?;
        debug!(path = %path.display(), notes = score.notes.len(), "loaded score file");
        Ok(score)
    }
}

#[async_trait]
impl ScoreSource for DirectoryScoreSource {
    async fn load(&self, id: &str) -> Result<Score> {
        for ext in ["json", "yaml", "yml"] {
            let path = self.root.join(format!("{id}.{ext}"));
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                let score = Self::load_path(&path).await?;
                info!(id, title = %score.title, "loaded score from library");
                return Ok(score);
            }
        }
        Err(anyhow!("score {id:?} not found in {}", self.root.display()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("read library {}", self.root.display()))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let known = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(ScoreFormat::from_extension)
                .is_some();
            if let (true, Some(stem)) = (known, path.file_stem().and_then(|s| s.to_str())) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pianola_domain::NoteEvent;

    async fn library(name: &str) -> (DirectoryScoreSource, PathBuf) {
        let root = std::env::temp_dir().join(format!("pianola-library-{name}-{}", std::process::id()));
        let _ = tokio::fs::remove_dir_all(&root).await;
        tokio::fs::create_dir_all(&root).await.unwrap();
        (DirectoryScoreSource::new(&root), root)
    }

    fn sample(id: &str) -> Score {
        Score::new(
            id,
            "Sample",
            vec![NoteEvent::new(64, 1.0, 0.5, 0.7, 0), NoteEvent::new(60, 0.0, 0.5, 0.8, 0)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn loads_json_and_yaml_scores() {
        let (source, root) = library("load").await;
        let json = SerdeCodec.export(&sample("minuet"), ScoreFormat::Json).unwrap();
        tokio::fs::write(root.join("minuet.json"), json).await.unwrap();
        let yaml = SerdeCodec.export(&sample("etude"), ScoreFormat::Yaml).unwrap();
        tokio::fs::write(root.join("etude.yml"), yaml).await.unwrap();

        let minuet = source.load("minuet").await.unwrap();
        assert_eq!(minuet.notes[0].pitch, 60);
        let etude = source.load("etude").await.unwrap();
        assert_eq!(etude.id, "etude");
        assert_eq!(source.list().await.unwrap(), vec!["etude", "minuet"]);
    }

    #[tokio::test]
    async fn missing_score_is_an_error() {
        let (source, root) = library("missing").await;
        tokio::fs::write(root.join("notes.txt"), b"not a score").await.unwrap();
        assert!(source.load("nocturne").await.is_err());
        assert!(source.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_file_reports_parse_error() {
        let (source, root) = library("invalid").await;
        tokio::fs::write(root.join("broken.json"), b"{\"id\": 3}").await.unwrap();
        let err = source.load("broken").await.unwrap_err();
        assert!(format!("{err:#}").contains("parse score"));
    }
}

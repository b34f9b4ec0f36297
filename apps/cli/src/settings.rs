use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use pianola_domain::PracticeConfig;

fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("pianola").join("practice.yaml"))
}

/// An explicit path must load; the per-user default is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<PracticeConfig> {
    if let Some(path) = explicit {
        return PracticeConfig::load(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => match PracticeConfig::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded practice config");
                Ok(config)
            }
            Err(err) => {
                warn!(path = %path.display(), "ignoring practice config: {err:#}");
                Ok(PracticeConfig::default())
            }
        },
        _ => Ok(PracticeConfig::default()),
    }
}

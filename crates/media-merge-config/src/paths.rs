use anyhow::Result;
use std::path::{Path, PathBuf};

const BASE_PATH_ENV: &str = "MEDIAMERGE_BASE_PATH";

/// Base directory from `MEDIAMERGE_BASE_PATH`, if set and non-empty
pub fn base_path_override() -> Option<PathBuf> {
    std::env::var_os(BASE_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone)]
pub struct PathManager {
    config_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    /// Platform paths, e.g. `~/.config/mediamerge` on Linux
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("mediamerge");
        Ok(Self::from_base(base_dir))
    }

    pub fn from_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            log_dir: base.join("logs"),
            config_dir: base,
        }
    }

    /// Honors `MEDIAMERGE_BASE_PATH` before falling back to platform paths
    pub fn resolve() -> Result<Self> {
        match base_path_override() {
            Some(base) => Ok(Self::from_base(base)),
            None => Self::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default target for `--log-file`
    pub fn default_log_file(&self) -> PathBuf {
        self.log_dir.join("mediamerge.log")
    }

    /// Relative snapshot paths in the config are taken from the config directory
    pub fn resolve_snapshot(&self, snapshot: &Path) -> PathBuf {
        if snapshot.is_absolute() {
            snapshot.to_path_buf()
        } else {
            self.config_dir.join(snapshot)
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

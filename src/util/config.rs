//! Configuration file support for exportkit.
//!
//! exportkit reads two configuration file locations:
//! - Global: `~/.exportkit/config.toml` - User-wide defaults
//! - Project: `.exportkit/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// exportkit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Save settings
    pub save: SaveConfig,
}

/// Save-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Worker pool size for interactive saves (None = one per core)
    pub jobs: Option<usize>,

    /// Run targets sequentially on the calling thread by default
    pub headless: Option<bool>,

    /// Show a progress bar while targets are written
    pub progress: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.save.jobs.is_some() {
            self.save.jobs = other.save.jobs;
        }
        if other.save.headless.is_some() {
            self.save.headless = other.save.headless;
        }
        if other.save.progress.is_some() {
            self.save.progress = other.save.progress;
        }
    }

    /// Whether saves default to headless (sequential) scheduling.
    pub fn headless(&self) -> bool {
        self.save.headless.unwrap_or(false)
    }

    /// Whether interactive saves show a progress bar.
    pub fn progress(&self) -> bool {
        self.save.progress.unwrap_or(true)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.exportkit/config.toml)
/// 2. Global config (~/.exportkit/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global exportkit config directory (~/.exportkit).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".exportkit"))
}

/// Get the global config path (~/.exportkit/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.exportkit/config.toml).
pub fn project_config_path(project_folder: &Path) -> PathBuf {
    project_folder.join(".exportkit").join("config.toml")
}

//! Tool settings
//!
//! Read from `.pkgdelta.yaml` at the repository root. Every key is optional:
//!
//! ```yaml
//! changelog_dir: .changelog
//! keep_prerelease: false
//! max_bump_type: minor
//! cleanup_trigger: 30
//! keep_count: 10
//! tag_prefix: v
//! default_author: UNSET
//! ```

use crate::changelog::actions::{BumpType, DEFAULT_AUTHOR};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file name looked up at the repository root
pub const SETTINGS_FILENAME: &str = ".pkgdelta.yaml";

/// Repository level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Action log directory, relative to the repository root
    pub changelog_dir: PathBuf,
    /// Advance pre-release counters instead of leaving the channel
    pub keep_prerelease: bool,
    /// Cap used when the log holds no `max_bump_type` action
    pub max_bump_type: Option<BumpType>,
    /// Archive once more than this many files are active
    pub cleanup_trigger: usize,
    /// Files left active after archiving
    pub keep_count: usize,
    /// Prefix of release tags
    pub tag_prefix: String,
    /// Author recorded on generated actions
    pub default_author: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            changelog_dir: PathBuf::from(".changelog"),
            keep_prerelease: false,
            max_bump_type: None,
            cleanup_trigger: 30,
            keep_count: 10,
            tag_prefix: "v".to_string(),
            default_author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

impl Settings {
    /// Parse and validate YAML settings
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = if yaml.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load `.pkgdelta.yaml` from `repo_root`, defaults when absent
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(SETTINGS_FILENAME);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e.message())))
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> Result<()> {
        if self.keep_count > self.cleanup_trigger {
            return Err(Error::Config(format!(
                "keep_count ({}) must not exceed cleanup_trigger ({})",
                self.keep_count, self.cleanup_trigger
            )));
        }
        if let Some(max) = self.max_bump_type {
            if !max.is_standard() {
                return Err(Error::Config(format!(
                    "max_bump_type must be patch, minor or major, got '{}'",
                    max
                )));
            }
        }
        Ok(())
    }

    /// Absolute action log directory
    pub fn changelog_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.changelog_dir)
    }
}

//! Read-only git access
//!
//! Supplies the current commit list for stale SHA matching and the changelog
//! files a branch touched for foreign file detection.

pub mod repository;

pub use repository::GitRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commit as seen by the changelog tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    /// Full or abbreviated hex SHA
    pub sha: String,
    /// Summary line of the commit message
    pub message: String,
    /// Commit time, UTC
    pub ts: DateTime<Utc>,
    /// Author name
    pub author: String,
}

impl GitCommit {
    /// Build a commit record
    pub fn new(
        sha: impl Into<String>,
        message: impl Into<String>,
        ts: DateTime<Utc>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            ts,
            author: author.into(),
        }
    }

    /// Whether `sha` refers to this commit (either side may be abbreviated)
    pub fn matches_sha(&self, sha: &str) -> bool {
        if sha.is_empty() || self.sha.is_empty() {
            return false;
        }
        self.sha.starts_with(sha) || sha.starts_with(self.sha.as_str())
    }
}

//! Changelog action log
//!
//! - [`actions`]: the action model and bump types
//! - [`reconcile`]: merging diff results into persisted actions
//! - [`storage`]: per pull request YAML files and archives
//! - [`rebase`]: repairing stale commit references
//! - [`state`]: public surface and stability replayed from the log

pub mod actions;
pub mod rebase;
pub mod reconcile;
pub mod state;
pub mod storage;

pub use actions::{
    ActionKind, ApiChange, BumpType, ChangelogAction, FixCommit, StabilityChange, StabilityTarget,
    DEFAULT_AUTHOR,
};
pub use rebase::{RebaseReport, ShaRemap, UnmatchedResolution};
pub use reconcile::{reconcile_auto_actions, FileReconciliation, Reconciler};
pub use state::{ApiState, Stability, TargetPath};
pub use storage::{
    archive_old_actions, changelog_filepath, consolidate_changelog_files,
    find_foreign_changelog_files, find_release_action, parse_changelog_dir, ReleaseInfo,
};

//! Merge fresh diff results into a persisted action list
//!
//! Auto-generated entries mirror the current diff state. An entry whose
//! identity `(change_kind, name, group, field_name)` still shows up in the
//! fresh diff keeps its timestamp, author and position and takes the fresh
//! details. Entries whose change disappeared are dropped, new changes are
//! appended. Manual entries are never touched.
//!
//! A pull request only rewrites its own file. Auto entries already recorded
//! in other unreleased files count as present and are not duplicated.

use crate::api::diff::{ChangeKind, DiffResult};
use crate::changelog::actions::{ActionKind, ChangelogAction, DEFAULT_AUTHOR};
use crate::changelog::storage::{changelog_filepath, dump_changelog_actions, parse_changelog_dir_by_file};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

type IdentityKey = (ChangeKind, String, String, Option<String>);

fn diff_key(result: &DiffResult) -> IdentityKey {
    (
        result.change_kind,
        result.name.clone(),
        result.group.clone(),
        result.field_name.clone(),
    )
}

fn action_key(action: &ChangelogAction) -> Option<IdentityKey> {
    let change = action.api_change()?;
    Some((
        change.change_kind?,
        action.name.clone(),
        change.group.clone(),
        change.field_name.clone(),
    ))
}

/// Result of reconciling one pull request file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReconciliation {
    /// The pull request file
    pub path: PathBuf,
    /// Its new content
    pub actions: Vec<ChangelogAction>,
    /// Whether the file was rewritten or removed
    pub changed: bool,
    /// Fresh results already recorded in other unreleased files
    pub covered_elsewhere: usize,
    /// Auto entries of other unreleased files the diff no longer reports
    pub stale_elsewhere: Vec<(PathBuf, ChangelogAction)>,
}

/// Reconciliation with a fixed author and clock for appended entries
#[derive(Debug, Clone)]
pub struct Reconciler {
    author: String,
    now: DateTime<Utc>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR)
    }
}

impl Reconciler {
    /// Appended entries are attributed to `author` and stamped now
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            now: Utc::now(),
        }
    }

    /// Stamp appended entries with `now`
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Reconcile `existing` against `fresh`
    pub fn reconcile(
        &self,
        existing: Vec<ChangelogAction>,
        fresh: &[DiffResult],
    ) -> Vec<ChangelogAction> {
        // Repeated identities are paired up in order of appearance
        let mut pending: HashMap<IdentityKey, VecDeque<usize>> = HashMap::new();
        for (idx, result) in fresh.iter().enumerate() {
            pending.entry(diff_key(result)).or_default().push_back(idx);
        }

        let mut consumed = vec![false; fresh.len()];
        let mut out = Vec::with_capacity(existing.len() + fresh.len());
        let (mut kept, mut dropped) = (0usize, 0usize);

        for mut action in existing {
            if !action.is_auto_generated() {
                out.push(action);
                continue;
            }

            let matched = action_key(&action)
                .and_then(|key| pending.get_mut(&key))
                .and_then(VecDeque::pop_front);

            match matched {
                Some(idx) => {
                    consumed[idx] = true;
                    if let Some(change) = action.api_change_mut() {
                        change.details.clone_from(&fresh[idx].details);
                    }
                    kept += 1;
                    out.push(action);
                }
                None => {
                    tracing::debug!(
                        name = action.name.as_str(),
                        key = action.stable_sort_key().as_str(),
                        "dropping stale auto-generated action"
                    );
                    dropped += 1;
                }
            }
        }

        let mut added = 0usize;
        for (result, _) in fresh.iter().zip(&consumed).filter(|(_, used)| !**used) {
            out.push(
                result
                    .to_changelog_action()
                    .with_ts(self.now)
                    .with_author(self.author.clone()),
            );
            added += 1;
        }

        tracing::debug!(kept, dropped, added, "reconciled auto-generated actions");
        out
    }
}

impl Reconciler {
    /// Reconcile the file of one pull request while `others` (auto entries
    /// of other unreleased files, with their paths) already hold some of the
    /// fresh identities.
    ///
    /// Returns the new content for the own file, how many fresh results the
    /// other files cover and which of their auto entries went stale.
    pub fn reconcile_against<'a>(
        &self,
        others: impl IntoIterator<Item = (&'a Path, &'a ChangelogAction)>,
        own: Vec<ChangelogAction>,
        fresh: &[DiffResult],
    ) -> (Vec<ChangelogAction>, usize, Vec<(PathBuf, ChangelogAction)>) {
        let mut pending: HashMap<IdentityKey, VecDeque<usize>> = HashMap::new();
        for (idx, result) in fresh.iter().enumerate() {
            pending.entry(diff_key(result)).or_default().push_back(idx);
        }

        let mut covered = vec![false; fresh.len()];
        let mut stale = Vec::new();
        for (path, action) in others {
            if !action.is_auto_generated() {
                continue;
            }
            let matched = action_key(action)
                .and_then(|key| pending.get_mut(&key))
                .and_then(VecDeque::pop_front);
            match matched {
                Some(idx) => covered[idx] = true,
                None => stale.push((path.to_path_buf(), action.clone())),
            }
        }

        let remaining: Vec<DiffResult> = fresh
            .iter()
            .zip(&covered)
            .filter(|(_, done)| !**done)
            .map(|(result, _)| result.clone())
            .collect();
        let covered_count = fresh.len() - remaining.len();
        (self.reconcile(own, &remaining), covered_count, stale)
    }

    /// Reconcile and rewrite `<dir>/<pr>.yaml` against the unreleased log.
    ///
    /// Only the pull request's own file is written; it is removed when it
    /// ends up empty.
    pub fn reconcile_changelog_file(
        &self,
        dir: &Path,
        pr: u64,
        fresh: &[DiffResult],
    ) -> Result<FileReconciliation> {
        let path = changelog_filepath(dir, pr);
        let files = parse_changelog_dir_by_file(dir)?;

        let own = files
            .iter()
            .find(|(file, _)| *file == path)
            .map(|(_, actions)| actions.clone())
            .unwrap_or_default();

        // Entries after the last release, in log order
        let log: Vec<(&Path, &ChangelogAction)> = files
            .iter()
            .flat_map(|(file, actions)| actions.iter().map(move |a| (file.as_path(), a)))
            .collect();
        let start = log
            .iter()
            .rposition(|(_, a)| matches!(a.kind, ActionKind::Release { .. }))
            .map_or(0, |idx| idx + 1);
        let others = log[start..]
            .iter()
            .copied()
            .filter(|(file, _)| *file != path.as_path());

        let (actions, covered_elsewhere, stale_elsewhere) =
            self.reconcile_against(others, own.clone(), fresh);

        let changed = actions != own;
        if changed {
            if actions.is_empty() {
                if path.exists() {
                    fs::remove_file(&path)?;
                    tracing::info!(path = %path.display(), "removed emptied changelog file");
                }
            } else {
                dump_changelog_actions(&path, &actions)?;
            }
        }
        for (file, action) in &stale_elsewhere {
            tracing::warn!(
                file = %file.display(),
                name = action.name.as_str(),
                key = action.stable_sort_key().as_str(),
                "auto-generated action in another file no longer matches the diff"
            );
        }

        Ok(FileReconciliation {
            path,
            actions,
            changed,
            covered_elsewhere,
            stale_elsewhere,
        })
    }
}

/// Reconcile with the default author, stamping new entries now
pub fn reconcile_auto_actions(
    existing: Vec<ChangelogAction>,
    fresh: &[DiffResult],
) -> Vec<ChangelogAction> {
    Reconciler::default().reconcile(existing, fresh)
}

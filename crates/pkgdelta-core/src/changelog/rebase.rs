//! Stale commit references after history rewrites
//!
//! Fix actions record the commit they came from. After a rebase or squash
//! those SHAs no longer exist; the replacement commit is found by exact
//! message match, preferring the commit closest in time to the action.

use crate::changelog::actions::{ActionKind, ChangelogAction};
use crate::changelog::storage::{changelog_files, dump_changelog_actions, parse_changelog_file};
use crate::error::Result;
use crate::git::GitCommit;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Old SHA to replacement SHA
pub type ShaRemap = BTreeMap<String, String>;

fn fix_sha(action: &ChangelogAction) -> Option<&str> {
    action.fix_commit().map(|fix| fix.short_sha.as_str())
}

/// Fix actions whose commit is not in `current_commits`
pub fn find_stale_shas<'a>(
    fix_actions: &'a [ChangelogAction],
    current_commits: &[GitCommit],
) -> Vec<&'a ChangelogAction> {
    fix_actions
        .iter()
        .filter(|action| {
            fix_sha(action).is_some_and(|sha| !current_commits.iter().any(|c| c.matches_sha(sha)))
        })
        .collect()
}

/// Commit with the same message as the stale fix, closest in time on ties
pub fn match_by_message<'c>(
    stale: &ChangelogAction,
    current_commits: &'c [GitCommit],
) -> Option<&'c GitCommit> {
    let message = &stale.fix_commit()?.message;
    current_commits
        .iter()
        .filter(|c| &c.message == message)
        .min_by_key(|c| (c.ts - stale.ts).num_seconds().unsigned_abs())
}

/// Remap for every stale fix that has a message match, plus the ones without
pub fn build_sha_remap<'a>(
    stale: &[&'a ChangelogAction],
    current_commits: &[GitCommit],
) -> (ShaRemap, Vec<&'a ChangelogAction>) {
    let mut remap = ShaRemap::new();
    let mut unmatched = Vec::new();

    for &action in stale {
        let Some(old) = fix_sha(action) else {
            continue;
        };
        match match_by_message(action, current_commits) {
            Some(commit) => {
                tracing::debug!(old, new = commit.sha.as_str(), "matched stale sha by message");
                remap.insert(old.to_string(), commit.sha.clone());
            }
            None => unmatched.push(action),
        }
    }
    (remap, unmatched)
}

/// Rewrite fix SHAs in place; returns how many changed
pub fn apply_remap_to_actions(actions: &mut [ChangelogAction], remap: &ShaRemap) -> usize {
    let mut count = 0;
    for action in actions.iter_mut() {
        if let ActionKind::Fix(fix) = &mut action.kind {
            if let Some(new) = remap.get(&fix.short_sha) {
                fix.short_sha.clone_from(new);
                count += 1;
            }
        }
    }
    count
}

/// Drop fix actions referring to any of `shas`
pub fn remove_actions_by_sha(
    actions: Vec<ChangelogAction>,
    shas: &HashSet<String>,
) -> Vec<ChangelogAction> {
    actions
        .into_iter()
        .filter(|action| !fix_sha(action).is_some_and(|sha| shas.contains(sha)))
        .collect()
}

/// Apply `remap` to one action file; returns whether it was rewritten
pub fn apply_remap_to_file(path: &Path, remap: &ShaRemap) -> Result<bool> {
    let mut actions = parse_changelog_file(path)?;
    if apply_remap_to_actions(&mut actions, remap) == 0 {
        return Ok(false);
    }
    dump_changelog_actions(path, &actions)?;
    Ok(true)
}

/// Remove fix actions for `shas` from one file; returns how many were removed.
///
/// A file left without actions is deleted.
pub fn remove_actions_from_file(path: &Path, shas: &HashSet<String>) -> Result<usize> {
    let actions = parse_changelog_file(path)?;
    let before = actions.len();
    let kept = remove_actions_by_sha(actions, shas);
    let removed = before - kept.len();

    if removed == 0 {
        return Ok(0);
    }
    if kept.is_empty() {
        fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "removed emptied changelog file");
    } else {
        dump_changelog_actions(path, &kept)?;
    }
    Ok(removed)
}

/// Decision for a stale fix without a message match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchedResolution {
    /// Point the fix at this commit
    PickCommit(String),
    /// Delete the fix entry
    RemoveEntry,
    /// Leave the stale SHA as is
    KeepStale,
}

/// Apply per-SHA decisions to `actions`; SHAs without a decision are kept
pub fn resolve_unmatched(
    mut actions: Vec<ChangelogAction>,
    decisions: &HashMap<String, UnmatchedResolution>,
) -> Vec<ChangelogAction> {
    let mut remap = ShaRemap::new();
    let mut remove = HashSet::new();
    for (sha, decision) in decisions {
        match decision {
            UnmatchedResolution::PickCommit(new) => {
                remap.insert(sha.clone(), new.clone());
            }
            UnmatchedResolution::RemoveEntry => {
                remove.insert(sha.clone());
            }
            UnmatchedResolution::KeepStale => {}
        }
    }

    apply_remap_to_actions(&mut actions, &remap);
    remove_actions_by_sha(actions, &remove)
}

/// Outcome of rebasing a changelog directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaseReport {
    /// Stale SHAs fixed by message match
    pub remapped: ShaRemap,
    /// Stale SHAs without a match and the decision taken
    pub unmatched: Vec<(String, UnmatchedResolution)>,
    /// Files rewritten or removed
    pub files_changed: Vec<PathBuf>,
}

/// Repair stale fix SHAs in the active action files of `dir`.
///
/// `decide` is asked once per stale SHA that has no message match.
pub fn rebase_changelog_dir<F>(
    dir: &Path,
    current_commits: &[GitCommit],
    mut decide: F,
) -> Result<RebaseReport>
where
    F: FnMut(&ChangelogAction) -> UnmatchedResolution,
{
    let files = changelog_files(dir)?;
    let mut parsed = Vec::with_capacity(files.len());
    for path in files {
        let actions = parse_changelog_file(&path)?;
        parsed.push((path, actions));
    }

    let all: Vec<ChangelogAction> = parsed
        .iter()
        .flat_map(|(_, actions)| actions.iter().filter(|a| a.fix_commit().is_some()).cloned())
        .collect();
    let stale = find_stale_shas(&all, current_commits);
    let (remap, unmatched) = build_sha_remap(&stale, current_commits);

    let mut report = RebaseReport {
        remapped: remap,
        ..Default::default()
    };
    let mut decisions = HashMap::new();
    for action in unmatched {
        let Some(sha) = fix_sha(action) else {
            continue;
        };
        if decisions.contains_key(sha) {
            continue;
        }
        let decision = decide(action);
        report.unmatched.push((sha.to_string(), decision.clone()));
        decisions.insert(sha.to_string(), decision);
    }

    for (path, actions) in parsed {
        let mut updated = actions.clone();
        apply_remap_to_actions(&mut updated, &report.remapped);
        let updated = resolve_unmatched(updated, &decisions);
        if updated == actions {
            continue;
        }

        if updated.is_empty() {
            fs::remove_file(&path)?;
        } else {
            dump_changelog_actions(&path, &updated)?;
        }
        report.files_changed.push(path);
    }

    tracing::info!(
        remapped = report.remapped.len(),
        unmatched = report.unmatched.len(),
        files = report.files_changed.len(),
        "rebased changelog"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, 1, 0, 0, 0).unwrap()
    }

    fn commit(sha: &str, message: &str, month: u32) -> GitCommit {
        GitCommit::new(sha, message, ts(month), "test")
    }

    fn fix(sha: &str, message: &str, month: u32) -> ChangelogAction {
        ChangelogAction::fix("group1", sha, message)
            .with_ts(ts(month))
            .with_author("test")
    }

    #[test]
    fn test_find_stale_shas() {
        let commits = vec![commit("aaa111", "fix: A", 1), commit("bbb222", "fix: B", 1)];
        let actions = vec![fix("aaa111", "fix: A", 1), fix("ccc333", "fix: C", 1)];
        let stale = find_stale_shas(&actions, &commits);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].fix_commit().unwrap().short_sha, "ccc333");
    }

    #[test]
    fn test_short_sha_matches_full_commit() {
        let commits = vec![commit("aaa111deadbeef", "fix: A", 1)];
        assert!(find_stale_shas(&[fix("aaa111", "fix: A", 1)], &commits).is_empty());
    }

    #[test]
    fn test_match_by_message() {
        let commits = vec![commit("new111", "fix: something", 1)];
        let found = match_by_message(&fix("old111", "fix: something", 1), &commits);
        assert_eq!(found.map(|c| c.sha.as_str()), Some("new111"));
        assert!(match_by_message(&fix("old111", "fix: X", 1), &[commit("n", "fix: Y", 1)]).is_none());
    }

    #[test]
    fn test_match_by_message_prefers_closest_ts() {
        let action = fix("old111", "fix: dup", 6);
        let commits = vec![commit("aaa111", "fix: dup", 1), commit("ccc333", "fix: dup", 12)];
        assert_eq!(match_by_message(&action, &commits).unwrap().sha, "aaa111");
    }

    #[test]
    fn test_build_sha_remap() {
        let commits = vec![commit("new111", "fix: A", 1), commit("new222", "fix: B", 1)];
        let stale_actions = vec![fix("old111", "fix: A", 1), fix("old222", "fix: missing", 1)];
        let stale: Vec<&ChangelogAction> = stale_actions.iter().collect();
        let (remap, unmatched) = build_sha_remap(&stale, &commits);
        assert_eq!(remap.get("old111").map(String::as_str), Some("new111"));
        assert_eq!(remap.len(), 1);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].fix_commit().unwrap().short_sha, "old222");
    }

    #[test]
    fn test_resolve_unmatched() {
        let actions = vec![
            fix("aaa", "fix: a", 1),
            fix("bbb", "fix: b", 1),
            fix("ccc", "fix: c", 1),
        ];
        let decisions = HashMap::from([
            ("aaa".to_string(), UnmatchedResolution::PickCommit("zzz".into())),
            ("bbb".to_string(), UnmatchedResolution::RemoveEntry),
            ("ccc".to_string(), UnmatchedResolution::KeepStale),
        ]);
        let resolved = resolve_unmatched(actions, &decisions);
        let shas: Vec<&str> = resolved
            .iter()
            .filter_map(|a| a.fix_commit())
            .map(|f| f.short_sha.as_str())
            .collect();
        assert_eq!(shas, vec!["zzz", "ccc"]);
    }
}

//! Action log files
//!
//! One YAML file per pull request (`NNN.yaml`), one action per `---` separated
//! document. Old files are moved into numbered archive buckets (`000`, `001`,
//! ...) once the active directory grows past a trigger.

use crate::changelog::actions::{ActionKind, ChangelogAction};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Files per archive bucket before rolling to the next one
pub const ARCHIVE_BUCKET_CAPACITY: usize = 100;

/// Extension of action files
pub const CHANGELOG_EXTENSION: &str = "yaml";

const DOCUMENT_SEPARATOR: &str = "---\n";

/// `015.yaml` for pr 15
pub fn changelog_filename(pr: u64) -> String {
    format!("{:03}.{}", pr, CHANGELOG_EXTENSION)
}

/// Path of the action file for `pr` in `dir`
pub fn changelog_filepath(dir: &Path, pr: u64) -> PathBuf {
    dir.join(changelog_filename(pr))
}

/// Pull request number encoded in an action file name
pub fn pr_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Parse the documents of one action file.
///
/// Empty and null documents are skipped, a document holding a sequence
/// contributes every element.
pub fn parse_changelog_str(content: &str) -> Result<Vec<ChangelogAction>> {
    let mut actions = Vec::new();
    if content.trim().is_empty() {
        return Ok(actions);
    }

    for document in serde_yaml::Deserializer::from_str(content) {
        match serde_yaml::Value::deserialize(document)? {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Sequence(items) => {
                for item in items {
                    actions.push(serde_yaml::from_value(item)?);
                }
            }
            value => actions.push(serde_yaml::from_value(value)?),
        }
    }
    Ok(actions)
}

/// Read and parse one action file
pub fn parse_changelog_file(path: &Path) -> Result<Vec<ChangelogAction>> {
    let content = fs::read_to_string(path)?;
    parse_changelog_str(&content).map_err(|err| match err {
        Error::Yaml(msg) => Error::Yaml(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Render actions as a multi-document YAML string
pub fn dump_changelog_str(actions: &[ChangelogAction]) -> Result<String> {
    let documents = actions
        .iter()
        .map(ChangelogAction::file_content)
        .collect::<Result<Vec<_>>>()?;
    Ok(documents.join(DOCUMENT_SEPARATOR))
}

/// Write actions to `path`, replacing its content.
///
/// The content goes to a sibling temp file first and is renamed into place.
pub fn dump_changelog_actions(path: &Path, actions: &[ChangelogAction]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = dump_changelog_str(actions)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;

    tracing::info!(path = %path.display(), actions = actions.len(), "wrote changelog file");
    Ok(())
}

fn file_sort_key(path: &Path) -> (u64, PathBuf) {
    (pr_number(path).unwrap_or(u64::MAX), path.to_path_buf())
}

/// Action files directly inside `dir`, ordered by pr number
pub fn changelog_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == CHANGELOG_EXTENSION) {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|p| file_sort_key(p));
    Ok(files)
}

/// Archive bucket directories (`000`, `001`, ...) ordered by index
pub fn archive_buckets(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut buckets = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(index) = index {
            buckets.push((index, path));
        }
    }
    buckets.sort();
    Ok(buckets)
}

/// Every action file, archived ones first, in log order
pub fn all_changelog_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for (_, bucket) in archive_buckets(dir)? {
        files.extend(changelog_files(&bucket)?);
    }
    files.extend(changelog_files(dir)?);
    Ok(files)
}

/// Parse the whole log, archives included, keeping each file's actions
/// together with its path.
///
/// Files are parsed in parallel; the result keeps file order.
pub fn parse_changelog_dir_by_file(dir: &Path) -> Result<Vec<(PathBuf, Vec<ChangelogAction>)>> {
    let files = all_changelog_files(dir)?;
    let parsed = files
        .par_iter()
        .map(|path| parse_changelog_file(path))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(dir = %dir.display(), files = files.len(), "parsed changelog directory");
    Ok(files.into_iter().zip(parsed).collect())
}

/// Parse the whole log, archives included, in log order
pub fn parse_changelog_dir(dir: &Path) -> Result<Vec<ChangelogAction>> {
    Ok(parse_changelog_dir_by_file(dir)?
        .into_iter()
        .flat_map(|(_, actions)| actions)
        .collect())
}

/// Next free slot in the archive buckets
struct BucketCursor<'a> {
    root: &'a Path,
    index: usize,
    used: usize,
}

impl<'a> BucketCursor<'a> {
    fn open(root: &'a Path) -> Result<Self> {
        let Some((index, path)) = archive_buckets(root)?.pop() else {
            return Ok(Self {
                root,
                index: 0,
                used: 0,
            });
        };
        let used = changelog_files(&path)?.len();
        Ok(Self { root, index, used })
    }

    fn next_dir(&mut self) -> Result<PathBuf> {
        if self.used >= ARCHIVE_BUCKET_CAPACITY {
            self.index += 1;
            self.used = 0;
        }
        let dir = self.root.join(format!("{:03}", self.index));
        fs::create_dir_all(&dir)?;
        self.used += 1;
        Ok(dir)
    }
}

fn move_verified(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(Error::Archive(format!(
            "{} already exists",
            dest.display()
        )));
    }
    fs::rename(src, dest)?;
    if !dest.exists() || src.exists() {
        return Err(Error::Archive(format!(
            "move of {} to {} did not complete",
            src.display(),
            dest.display()
        )));
    }
    Ok(())
}

/// Move all but the `keep_count` newest files into archive buckets once more
/// than `cleanup_trigger` files are active.
///
/// Returns the archived destinations, empty when nothing was moved.
pub fn archive_old_actions(
    dir: &Path,
    cleanup_trigger: usize,
    keep_count: usize,
) -> Result<Vec<PathBuf>> {
    let files = changelog_files(dir)?;
    if files.len() <= cleanup_trigger {
        tracing::debug!(
            files = files.len(),
            cleanup_trigger,
            "below archive trigger"
        );
        return Ok(Vec::new());
    }

    let archive_count = files.len().saturating_sub(keep_count);
    let mut cursor = BucketCursor::open(dir)?;
    let mut moved = Vec::with_capacity(archive_count);

    for src in &files[..archive_count] {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dest = cursor.next_dir()?.join(name);
        move_verified(src, &dest)?;
        tracing::info!(from = %src.display(), to = %dest.display(), "archived changelog file");
        moved.push(dest);
    }
    Ok(moved)
}

/// Files among `changelog_files` that belong to another pull request
pub fn find_foreign_changelog_files(changelog_files: &[PathBuf], current_pr: u64) -> Vec<PathBuf> {
    changelog_files
        .iter()
        .filter(|path| pr_number(path).is_some_and(|pr| pr != current_pr))
        .cloned()
        .collect()
}

/// Merge `sources` into `target` (target actions first) and delete the sources
pub fn consolidate_changelog_files(target: &Path, sources: &[PathBuf]) -> Result<PathBuf> {
    let mut actions = Vec::new();
    if target.exists() {
        actions.extend(parse_changelog_file(target)?);
    }
    let sources: Vec<&PathBuf> = sources
        .iter()
        .filter(|s| s.as_path() != target && s.exists())
        .collect();
    for source in &sources {
        actions.extend(parse_changelog_file(source)?);
    }

    if !actions.is_empty() {
        dump_changelog_actions(target, &actions)?;
    }
    for source in sources {
        fs::remove_file(source)?;
        tracing::info!(path = %source.display(), "deleted consolidated changelog file");
    }
    Ok(target.to_path_buf())
}

/// A recorded release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Released version
    pub version: String,
    /// Version released from
    pub old_version: String,
    /// Pull request that carried the release
    pub pr: u64,
    /// When the release was recorded
    pub ts: DateTime<Utc>,
}

/// Find the release action for `version` in `actions`
pub fn find_release_in(actions: &[ChangelogAction], version: &str) -> Result<ReleaseInfo> {
    for action in actions {
        let ActionKind::Release { old_version, pr } = &action.kind else {
            continue;
        };
        if action.name != version {
            continue;
        }
        let pr = pr.ok_or_else(|| Error::ReleaseMissingPr(version.to_string()))?;
        return Ok(ReleaseInfo {
            version: action.name.clone(),
            old_version: old_version.clone(),
            pr,
            ts: action.ts,
        });
    }
    Err(Error::ReleaseNotFound(version.to_string()))
}

/// Find the release action for `version` in the log under `dir`
pub fn find_release_action(dir: &Path, version: &str) -> Result<ReleaseInfo> {
    find_release_in(&parse_changelog_dir(dir)?, version)
}

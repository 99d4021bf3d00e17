//! git2 backed repository access

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::changelog::storage::CHANGELOG_EXTENSION;
use crate::error::{Error, Result};
use crate::git::GitCommit;

/// Repository handle.
///
/// Stores the path only; `git2::Repository` is reopened per operation.
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Open a repository at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let _repo = git2::Repository::open(&path)?;

        Ok(Self { path })
    }

    /// Discover a repository starting from the given path
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        // discover_path() returns the .git directory
        let git_path = git2::Repository::discover_path(path.as_ref(), &[] as &[&std::ffi::OsStr])?;
        let _repo = git2::Repository::open(&git_path)?;

        Ok(Self { path: git_path })
    }

    fn get_repo(&self) -> Result<git2::Repository> {
        Ok(git2::Repository::open(&self.path)?)
    }

    fn resolve_oid(repo: &git2::Repository, reference: &str) -> Result<git2::Oid> {
        let object = repo.revparse_single(reference).map_err(|e| {
            Error::Git(format!(
                "Failed to resolve reference '{}': {}",
                reference,
                e.message()
            ))
        })?;
        Ok(object.peel_to_commit()?.id())
    }

    /// `dir` relative to the work tree, resolving symlinks when needed
    fn relative_to(dir: &Path, workdir: &Path) -> Result<PathBuf> {
        if dir.is_relative() {
            return Ok(dir.to_path_buf());
        }
        if let Ok(relative) = dir.strip_prefix(workdir) {
            return Ok(relative.to_path_buf());
        }
        let dir_canon = dir.canonicalize()?;
        let workdir_canon = workdir.canonicalize()?;
        dir_canon
            .strip_prefix(&workdir_canon)
            .map(Path::to_path_buf)
            .map_err(|_| {
                Error::Git(format!(
                    "{} is outside the work tree {}",
                    dir.display(),
                    workdir.display()
                ))
            })
    }

    /// Commits reachable from HEAD, newest first.
    ///
    /// With `since`, commits reachable from that reference are excluded.
    pub fn commits(&self, since: Option<&str>) -> Result<Vec<GitCommit>> {
        let repo = self.get_repo()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        if let Some(since) = since {
            revwalk.hide(Self::resolve_oid(&repo, since)?)?;
        }
        revwalk.set_sorting(git2::Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            let ts = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                .ok_or_else(|| Error::Git(format!("commit {} has an invalid time", commit.id())))?;
            commits.push(GitCommit {
                sha: commit.id().to_string(),
                message: commit.summary().unwrap_or_default().trim().to_string(),
                ts,
                author: commit.author().name().unwrap_or_default().to_string(),
            });
        }

        tracing::debug!(count = commits.len(), since, "listed commits");
        Ok(commits)
    }

    /// Action files under `changelog_dir` changed between the merge base of
    /// `base_ref` and HEAD (three-dot diff) that still exist in the work tree.
    pub fn changed_changelog_files(
        &self,
        changelog_dir: &Path,
        base_ref: &str,
    ) -> Result<Vec<PathBuf>> {
        let repo = self.get_repo()?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::Git("bare repositories have no changelog files".to_string()))?
            .to_path_buf();

        let relative = Self::relative_to(changelog_dir, &workdir)?;
        let pathspec = relative.to_string_lossy().replace('\\', "/");

        let head = Self::resolve_oid(&repo, "HEAD")?;
        let base = repo.merge_base(Self::resolve_oid(&repo, base_ref)?, head)?;
        let base_tree = repo.find_commit(base)?.tree()?;
        let head_tree = repo.find_commit(head)?.tree()?;

        let mut opts = git2::DiffOptions::new();
        opts.ignore_submodules(true);
        if !pathspec.is_empty() {
            opts.pathspec(&pathspec);
        }
        let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            let Some(path) = delta.new_file().path() else {
                continue;
            };
            let abs = workdir.join(path);
            if abs.extension().is_some_and(|ext| ext == CHANGELOG_EXTENSION) && abs.exists() {
                files.push(abs);
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

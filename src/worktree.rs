//! Worktree Manager: composes the Git Gateway and Lock Manager into the
//! higher-level worktree lifecycle operations (create, delete, checkout).

use std::path::{Path, PathBuf};

use dunce::canonicalize;

use crate::git::{GitError, Repository, WorktreeInfo};
use crate::lock::{ErrBusy, LockManager, WorktreeLock};

/// Highest `wt.<N>` suffix tried before giving up.
const MAX_WORKTREE_SUFFIX: u32 = 99;

/// A worktree entry enriched with lock availability, for display.
#[derive(Debug, Clone)]
pub struct WorktreeEntry {
    pub info: WorktreeInfo,
    pub available: bool,
}

/// Snapshot of a repository's worktrees plus orphaned/malformed entries.
#[derive(Debug, Clone, Default)]
pub struct WorktreeStatus {
    pub git_installed: bool,
    pub in_repo: bool,
    pub repo_root: Option<PathBuf>,
    pub cwd: PathBuf,
    pub base_ref: Option<String>,
    pub worktrees: Vec<WorktreeEntry>,
    /// Worktrees reported by git whose directory no longer exists on disk.
    pub orphaned: Vec<WorktreeInfo>,
    pub malformed: Vec<String>,
    pub err: Option<String>,
}

/// Refuses an operation on a path outside the managed worktree root.
#[derive(Debug)]
pub struct ErrPathUnmanaged {
    pub path: PathBuf,
    pub managed_root: PathBuf,
}

impl std::fmt::Display for ErrPathUnmanaged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is outside the managed worktree root {}",
            self.path.display(),
            self.managed_root.display()
        )
    }
}

impl std::error::Error for ErrPathUnmanaged {}

/// `parent(repoRoot) + "/" + basename(repoRoot) + ".wt"`.
pub fn managed_worktree_root(repo_root: &Path) -> PathBuf {
    let basename = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = repo_root.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{basename}.wt"))
}

/// Verify `target` is a descendant of `root`, resolving symlinks on both
/// sides so comparisons are stable even when `target` doesn't exist yet
/// (falls back to lexical comparison in that case).
pub fn is_contained(root: &Path, target: &Path) -> bool {
    let (root_real, target_real) = match (canonicalize(root), canonicalize(target)) {
        (Ok(r), Ok(t)) => (r, t),
        _ => (root.to_path_buf(), target.to_path_buf()),
    };

    match target_real.strip_prefix(&root_real) {
        Ok(rel) => {
            let rel_str = rel.to_string_lossy();
            !rel_str.is_empty() && !rel_str.starts_with("..")
        }
        Err(_) => false,
    }
}

pub struct WorktreeManager {
    pub repo: Repository,
    pub locks: LockManager,
}

impl WorktreeManager {
    pub fn new(repo: Repository, locks: LockManager) -> Self {
        Self { repo, locks }
    }

    fn managed_root(&self) -> anyhow::Result<PathBuf> {
        Ok(managed_worktree_root(self.repo.repo_path()))
    }

    /// Compose §4.2 listing + lock-manager availability into `WorktreeStatus`.
    pub fn status(&self, cwd: PathBuf) -> WorktreeStatus {
        let repo_root = self.repo.repo_path().to_path_buf();
        let base_ref = self.repo.resolve_base_ref().ok().flatten();

        match self.repo.list_worktrees() {
            Ok(raw) => {
                let mut orphaned = Vec::new();
                let mut worktrees = Vec::new();
                for info in raw {
                    if !info.path.exists() {
                        orphaned.push(info);
                        continue;
                    }
                    let available = self.locks.is_available(&repo_root, &info.path);
                    worktrees.push(WorktreeEntry { info, available });
                }
                WorktreeStatus {
                    git_installed: true,
                    in_repo: true,
                    repo_root: Some(repo_root),
                    cwd,
                    base_ref,
                    worktrees,
                    orphaned,
                    malformed: Vec::new(),
                    err: None,
                }
            }
            Err(e) => WorktreeStatus {
                git_installed: true,
                in_repo: true,
                repo_root: Some(repo_root),
                cwd,
                base_ref,
                worktrees: Vec::new(),
                orphaned: Vec::new(),
                malformed: Vec::new(),
                err: Some(e.to_string()),
            },
        }
    }

    /// Iterate `wt.1`..`wt.99`, returning the first path that does not exist.
    pub fn next_worktree_path(&self) -> anyhow::Result<PathBuf> {
        let root = self.managed_root()?;
        for i in 1..=MAX_WORKTREE_SUFFIX {
            let candidate = root.join(format!("wt.{i}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(GitError::Other {
            message: format!(
                "No available worktree slot under {} (wt.1..wt.{MAX_WORKTREE_SUFFIX} all taken)",
                root.display()
            ),
        }
        .into())
    }

    fn check_containment(&self, target: &Path) -> anyhow::Result<()> {
        let root = self.managed_root()?;
        if !is_contained(&root, target) {
            return Err(ErrPathUnmanaged {
                path: target.to_path_buf(),
                managed_root: root,
            }
            .into());
        }
        Ok(())
    }

    /// Create a worktree checking out a freshly-created branch from `base_ref`.
    pub fn create_new_branch(
        &self,
        branch: &str,
        base_ref: &str,
    ) -> anyhow::Result<Result<(WorktreeInfo, WorktreeLock), ErrBusy>> {
        let target = self.next_worktree_path()?;
        std::fs::create_dir_all(self.managed_root()?)?;

        let repo_root = self.repo.repo_path().to_path_buf();
        let lock = match self.locks.acquire(&repo_root, &target)? {
            Ok(lock) => lock,
            Err(busy) => return Ok(Err(busy)),
        };

        self.repo
            .add_worktree_new_branch(&target, branch, base_ref)?;

        Ok(Ok((
            WorktreeInfo {
                path: target,
                head: String::new(),
                branch: Some(branch.to_string()),
                bare: false,
                detached: false,
                locked: None,
                prunable: None,
            },
            lock,
        )))
    }

    /// Create a worktree checking out an existing branch.
    pub fn create_from_existing_branch(
        &self,
        branch: &str,
    ) -> anyhow::Result<Result<(WorktreeInfo, WorktreeLock), ErrBusy>> {
        let target = self.next_worktree_path()?;
        std::fs::create_dir_all(self.managed_root()?)?;

        let repo_root = self.repo.repo_path().to_path_buf();
        let lock = match self.locks.acquire(&repo_root, &target)? {
            Ok(lock) => lock,
            Err(busy) => return Ok(Err(busy)),
        };

        self.repo.add_worktree_existing_branch(&target, branch)?;

        Ok(Ok((
            WorktreeInfo {
                path: target,
                head: String::new(),
                branch: Some(branch.to_string()),
                bare: false,
                detached: false,
                locked: None,
                prunable: None,
            },
            lock,
        )))
    }

    /// Delete a worktree. Refuses paths outside the managed root. `force` is
    /// required iff the path is orphaned (directory already gone).
    pub fn delete(
        &self,
        path: &Path,
        force: bool,
        is_orphaned: bool,
    ) -> anyhow::Result<Result<(), ErrBusy>> {
        self.check_containment(path)?;
        if is_orphaned && !force {
            return Err(GitError::Other {
                message: format!(
                    "{} is orphaned; pass force to remove it",
                    path.display()
                ),
            }
            .into());
        }

        let repo_root = self.repo.repo_path().to_path_buf();
        let lock = match self.locks.acquire(&repo_root, path)? {
            Ok(lock) => lock,
            Err(busy) => return Ok(Err(busy)),
        };

        let result = self.repo.remove_worktree(path, force);
        self.locks.release(&lock)?;
        result?;
        Ok(Ok(()))
    }

    /// Force-unlock a worktree token without regard for ownership.
    pub fn unlock(&self, path: &Path) -> anyhow::Result<()> {
        let repo_root = self.repo.repo_path().to_path_buf();
        self.locks.force_unlock(&repo_root, path)?;
        Ok(())
    }

    /// Checkout an existing branch in an already-checked-out worktree. Caller
    /// must already hold the lock for `path`.
    pub fn checkout_existing(&self, path: &Path, branch: &str) -> anyhow::Result<()> {
        self.repo.worktree_at(path).checkout(branch)
    }

    /// Checkout a freshly-created branch in an already-checked-out worktree.
    /// Caller must already hold the lock for `path`.
    pub fn checkout_new(
        &self,
        path: &Path,
        branch: &str,
        base: &str,
        do_fetch: bool,
    ) -> anyhow::Result<()> {
        if do_fetch {
            self.repo.fetch()?;
        }
        self.repo.worktree_at(path).checkout_new_branch(branch, base)
    }

    /// Recently checked-out branches via reflog.
    pub fn recent_branches(&self) -> anyhow::Result<Vec<String>> {
        self.repo.recent_branches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_root_formula() {
        let root = managed_worktree_root(Path::new("/home/user/myproj"));
        assert_eq!(root, PathBuf::from("/home/user/myproj.wt"));
    }

    #[test]
    fn containment_rejects_siblings_and_ancestors() {
        let root = Path::new("/tmp/does-not-exist-root.wt");
        assert!(!is_contained(root, Path::new("/tmp/does-not-exist-root.wt")));
        assert!(!is_contained(root, Path::new("/tmp")));
        assert!(!is_contained(
            root,
            Path::new("/tmp/does-not-exist-root.wt/../other")
        ));
    }

    #[test]
    fn containment_accepts_child() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj.wt");
        std::fs::create_dir_all(&root).unwrap();
        let child = root.join("wt.1");
        std::fs::create_dir_all(&child).unwrap();
        assert!(is_contained(&root, &child));
    }
}

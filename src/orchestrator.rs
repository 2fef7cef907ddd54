//! Orchestrator: the only component the UI talks to for data. Bundles the
//! Worktree Manager, Lock Manager, and GitHub Gateway.

use std::path::PathBuf;

use crate::github::{GhError, GitHubGateway, PrData, PrListData};
use crate::worktree::{WorktreeManager, WorktreeStatus};

pub struct Orchestrator {
    pub worktrees: WorktreeManager,
    pub github: GitHubGateway,
}

impl Orchestrator {
    pub fn new(worktrees: WorktreeManager) -> Self {
        Self {
            worktrees,
            github: GitHubGateway::new(),
        }
    }

    /// Cheap (~1 `git` call), polled every second by the UI.
    pub fn status(&self, cwd: PathBuf) -> WorktreeStatus {
        self.worktrees.status(cwd)
    }

    /// Extracts the unique non-empty, non-`detached` branch names from
    /// `status.worktrees` and fetches PR data for them.
    pub fn pr_data_for_status(
        &self,
        status: &WorktreeStatus,
        force: bool,
    ) -> Result<std::collections::HashMap<String, PrData>, GhError> {
        let Some(repo_root) = &status.repo_root else {
            return Ok(Default::default());
        };
        let branches = status_branches(status);
        self.github.pr_data_for_branches(repo_root, &branches, force)
    }

    /// As above but for an explicit branch list (used by the "open" screen,
    /// which also considers branches that have no worktree).
    pub fn pr_data_for_branches(
        &self,
        repo_root: &std::path::Path,
        branches: &[String],
        force: bool,
    ) -> Result<std::collections::HashMap<String, PrData>, GhError> {
        self.github.pr_data_for_branches(repo_root, branches, force)
    }

    /// All PRs for the repository, decoupled from local branches.
    pub fn prs_for_status(
        &self,
        status: &WorktreeStatus,
        force: bool,
    ) -> Result<Vec<PrListData>, GhError> {
        let Some(repo_root) = &status.repo_root else {
            return Ok(Vec::new());
        };
        self.github.prs_for_repo(repo_root, force)
    }

    /// `repoRoot + "|" + sort(unique(branch names)).join(",")`, or `""` when
    /// there is no repository (used by the UI's reconciliation rules).
    pub fn pr_data_key_for_status(&self, status: &WorktreeStatus) -> String {
        match &status.repo_root {
            Some(repo_root) => GitHubGateway::cache_key(repo_root, &status_branches(status)),
            None => String::new(),
        }
    }
}

fn status_branches(status: &WorktreeStatus) -> Vec<String> {
    status
        .worktrees
        .iter()
        .filter_map(|e| e.info.branch.clone())
        .filter(|b| !b.is_empty() && b != "detached")
        .collect()
}

//! Git config access and default branch detection for Repository.

use super::{DefaultBranchName, Repository};

/// Git config key used to cache the detected default branch, so subsequent
/// invocations avoid a remote round-trip.
const DEFAULT_BRANCH_CONFIG_KEY: &str = "wtx.default-branch";

impl Repository {
    /// Read a repo-scoped git config value. Returns `None` if unset.
    pub fn get_config(&self, key: &str) -> Option<String> {
        let stdout = self.run_command(&["config", "--get", key]).ok()?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Set a repo-scoped git config value.
    pub fn set_config(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.run_command(&["config", key, value])?;
        Ok(())
    }

    /// Clear a repo-scoped git config value. No-op if unset.
    pub fn unset_config(&self, key: &str) -> anyhow::Result<()> {
        let _ = self.run_command(&["config", "--unset", key]);
        Ok(())
    }

    /// Detect and cache the repository's default branch.
    ///
    /// Resolution order:
    /// 1. Cached `wtx.default-branch` git config value, if it still exists locally.
    /// 2. The primary remote's `HEAD` symref (`git ls-remote --symref <remote> HEAD`),
    ///    falling back to the local `refs/remotes/<remote>/HEAD` ref.
    /// 3. Common local branch names (`main`, `master`).
    ///
    /// Once resolved, the value is cached both in-process (`RepoCache`) and persisted
    /// to git config so subsequent invocations skip the network round-trip.
    ///
    /// Returns `None` if no default branch could be determined (e.g. an empty repo).
    pub fn default_branch(&self) -> Option<String> {
        self.cache
            .default_branch
            .get_or_init(|| self.detect_default_branch())
            .clone()
    }

    /// If the user configured a default branch that no longer exists locally, return it
    /// so callers can surface a warning. Populated as a side effect of `default_branch()`.
    pub fn invalid_default_branch_config(&self) -> Option<String> {
        self.cache.invalid_default_branch.get_or_init(|| None);
        self.cache.invalid_default_branch.get().cloned().flatten()
    }

    fn detect_default_branch(&self) -> Option<String> {
        if let Some(configured) = self.get_config(DEFAULT_BRANCH_CONFIG_KEY) {
            if self.branch_exists(&configured).unwrap_or(false) {
                return Some(configured);
            }
            let _ = self.cache.invalid_default_branch.set(Some(configured));
        }

        if let Some(branch) = self.detect_default_branch_from_remote() {
            let _ = self.set_config(DEFAULT_BRANCH_CONFIG_KEY, &branch);
            return Some(branch);
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate).unwrap_or(false) {
                let _ = self.set_config(DEFAULT_BRANCH_CONFIG_KEY, candidate);
                return Some(candidate.to_string());
            }
        }

        None
    }

    fn detect_default_branch_from_remote(&self) -> Option<String> {
        let remote = self.primary_remote().ok()?;

        if let Ok(stdout) = self.run_command(&[
            "symbolic-ref",
            "--short",
            &format!("refs/remotes/{remote}/HEAD"),
        ]) {
            if let Ok(name) = DefaultBranchName::from_local(&remote, &stdout) {
                return Some(name.into_string());
            }
        }

        let stdout = self
            .run_command(&["ls-remote", "--symref", &remote, "HEAD"])
            .ok()?;
        DefaultBranchName::from_remote(&stdout)
            .ok()
            .map(DefaultBranchName::into_string)
    }
}

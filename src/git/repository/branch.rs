//! Branch - a borrowed handle for single-branch git operations.

use super::Repository;

/// A borrowed handle for operations scoped to a single branch name.
///
/// Obtained via [`Repository::branch`].
#[derive(Debug)]
#[must_use]
pub struct Branch<'a> {
    pub(super) repo: &'a Repository,
    pub(super) name: String,
}

impl<'a> Branch<'a> {
    /// The branch name this handle was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this branch exists as a local branch ref.
    pub fn exists_locally(&self) -> anyhow::Result<bool> {
        self.repo.run_command_check(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{}", self.name),
        ])
    }

    /// Whether this branch exists locally, or has a remote-tracking ref.
    pub fn exists(&self) -> anyhow::Result<bool> {
        if self.exists_locally()? {
            return Ok(true);
        }
        Ok(!self.remotes()?.is_empty())
    }

    /// Names of remotes that have a tracking ref for this branch.
    pub fn remotes(&self) -> anyhow::Result<Vec<String>> {
        let stdout = self
            .repo
            .run_command(&["for-each-ref", "--format=%(refname)", "refs/remotes/"])?;
        let suffix = format!("/{}", self.name);
        Ok(stdout
            .lines()
            .filter_map(|line| line.strip_prefix("refs/remotes/"))
            .filter_map(|rest| rest.strip_suffix(suffix.as_str()))
            .map(|remote| remote.to_string())
            .collect())
    }

    /// The upstream ref configured for this branch (e.g. `origin/main`), if any.
    pub fn upstream(&self) -> anyhow::Result<Option<String>> {
        match self.repo.run_command(&[
            "rev-parse",
            "--abbrev-ref",
            &format!("{}@{{upstream}}", self.name),
        ]) {
            Ok(stdout) => {
                let trimmed = stdout.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(_) => Ok(None),
        }
    }

    /// Remove the upstream tracking configuration for this branch, if set.
    pub fn unset_upstream(&self) -> anyhow::Result<()> {
        let _ = self
            .repo
            .run_command(&["branch", "--unset-upstream", &self.name]);
        Ok(())
    }
}

impl Repository {
    /// Whether a local branch with this name exists.
    pub fn branch_exists(&self, name: &str) -> anyhow::Result<bool> {
        self.branch(name).exists_locally()
    }

    /// The branch checked out in the current worktree, or `None` if detached.
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        self.current_worktree().branch()
    }
}

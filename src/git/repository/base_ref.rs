//! Base-ref resolution and recent-branch listing for Repository.

use super::Repository;

/// Cap on the number of branches returned by `recent_branches`.
const MAX_RECENT_BRANCHES: usize = 15;

impl Repository {
    /// Synchronously resolve a base ref as `<remote>/<fallbackBranch>`.
    ///
    /// `fallbackBranch` is `main` if it exists locally, else the current
    /// branch (unless detached), else `main`. `remote` is the first remote
    /// reported by `git remote`. Returns `None` if there is no remote.
    pub fn resolve_base_ref(&self) -> anyhow::Result<Option<String>> {
        let Some(remote) = self.remote_names()?.into_iter().next() else {
            return Ok(None);
        };

        let fallback_branch = if self.branch_exists("main")? {
            "main".to_string()
        } else {
            match self.current_branch()? {
                Some(branch) => branch,
                None => "main".to_string(),
            }
        };

        Ok(Some(format!("{remote}/{fallback_branch}")))
    }

    /// Normalize an arbitrary base (branch name, remote ref, `HEAD`) into a ref
    /// that `git worktree add` will accept.
    ///
    /// Prefers the remote-qualified form if it resolves via
    /// `show-ref --verify refs/remotes/<remote>/<ref>`; else the short local
    /// branch if it exists; else the original input. `HEAD` or empty passes
    /// through as `HEAD`.
    pub fn base_ref_for_worktree_add(&self, base: &str, remote: &str) -> anyhow::Result<String> {
        if base.is_empty() || base == "HEAD" {
            return Ok("HEAD".to_string());
        }

        let remote_ref = format!("refs/remotes/{remote}/{base}");
        if self.run_command_check(&["show-ref", "--verify", "--quiet", &remote_ref])? {
            return Ok(format!("{remote}/{base}"));
        }

        if self.branch_exists(base)? {
            return Ok(base.to_string());
        }

        Ok(base.to_string())
    }

    /// Scan reflog for recently checked-out branches.
    ///
    /// Extracts substrings after `checkout: ...to `, deduplicates preserving
    /// first-seen order, excludes names starting with `origin/`, caps at
    /// [`MAX_RECENT_BRANCHES`].
    pub fn recent_branches(&self) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&["reflog", "show", "--format=%gs"])?;

        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for line in stdout.lines() {
            let Some(idx) = line.find("checkout: ") else {
                continue;
            };
            let Some(to_idx) = line[idx..].find("to ") else {
                continue;
            };
            let branch = line[idx + to_idx + "to ".len()..].trim();
            if branch.is_empty() || branch.starts_with("origin/") {
                continue;
            }
            if seen.insert(branch.to_string()) {
                result.push(branch.to_string());
                if result.len() >= MAX_RECENT_BRANCHES {
                    break;
                }
            }
        }
        Ok(result)
    }
}

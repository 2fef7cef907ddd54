//! Multi-branch operations: listing and quick completions.

use super::Repository;

impl Repository {
    /// List local branches as `(name, commit_sha)` pairs.
    pub fn list_local_branches(&self) -> anyhow::Result<Vec<(String, String)>> {
        parse_ref_list(&self.run_command(&[
            "for-each-ref",
            "--format=%(refname:short)\t%(objectname)",
            "refs/heads/",
        ])?)
    }

    /// List remote-tracking branches that have no corresponding local branch,
    /// as `(remote/name, commit_sha)` pairs.
    pub fn list_untracked_remote_branches(&self) -> anyhow::Result<Vec<(String, String)>> {
        let remotes = parse_ref_list(&self.run_command(&[
            "for-each-ref",
            "--format=%(refname:short)\t%(objectname)",
            "refs/remotes/",
        ])?)?;
        let locals: std::collections::HashSet<String> = self
            .list_local_branches()?
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        Ok(remotes
            .into_iter()
            .filter(|(name, _)| name.rsplit_once('/').is_none_or(|(remote, rest)| {
                remote != "HEAD" && !locals.contains(rest)
            }))
            .filter(|(name, _)| !name.ends_with("/HEAD"))
            .collect())
    }

    /// The branch checked out before the current one (`git checkout -` target),
    /// if git has recorded one.
    pub fn switch_previous(&self) -> Option<String> {
        let stdout = self
            .run_command(&["rev-parse", "--abbrev-ref", "@{-1}"])
            .ok()?;
        let trimmed = stdout.trim();
        (!trimmed.is_empty() && trimmed != "@{-1}").then(|| trimmed.to_string())
    }
}

fn parse_ref_list(stdout: &str) -> anyhow::Result<Vec<(String, String)>> {
    Ok(stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(name, sha)| (name.to_string(), sha.to_string()))
        .collect())
}

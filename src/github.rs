//! GitHub Gateway: shells out to `gh` for PR, CI, and review data.
//!
//! wtx does not host its own GitHub API client — every fact here comes from
//! parsing `gh`'s JSON output. Failures are classified and surfaced as
//! warnings rather than aborting the caller's pipeline.

use std::collections::HashMap;
use std::sync::Mutex;

use dashmap::DashMap;
use serde::Deserialize;

use crate::shell_exec::Cmd;

/// PR state as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrStatus {
    Draft,
    Open,
    Closed,
    Merged,
}

/// Aggregate CI state across a PR's check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CiState {
    None,
    Success,
    Fail,
    InProgress,
}

/// The GitHub side of a branch: PR identity, CI aggregate, review aggregate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PrData {
    pub number: u64,
    pub url: String,
    pub status: PrStatus,
    pub ci_state: CiState,
    pub ci_done: u32,
    pub ci_total: u32,
    pub ci_failing_names: Vec<String>,
    pub approved: bool,
    pub unresolved_comments: u32,
    pub resolved_comments: u32,
}

/// Repo-wide PR listing entry (decoupled from local branches).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PrListData {
    pub number: u64,
    pub branch: String,
    pub url: String,
    pub status: PrStatus,
}

/// Why a GitHub operation failed, so callers can render a useful message
/// instead of aborting.
#[derive(Debug, Clone)]
pub enum GhError {
    NotInstalled,
    Unauthenticated,
    Other(String),
}

impl std::fmt::Display for GhError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GhError::NotInstalled => write!(f, "gh is not installed"),
            GhError::Unauthenticated => write!(f, "gh is not authenticated"),
            GhError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GhError {}

/// Raw shape of `gh pr list --json ...`.
#[derive(Debug, Deserialize)]
struct RawPr {
    number: u64,
    url: String,
    #[serde(rename = "headRefName")]
    head_ref_name: String,
    #[serde(rename = "isDraft")]
    is_draft: bool,
    state: String,
    #[serde(rename = "statusCheckRollup", default)]
    status_check_rollup: Vec<RawCheck>,
    #[serde(rename = "reviewDecision", default)]
    review_decision: Option<String>,
    #[serde(rename = "reviewThreads", default)]
    review_threads: RawReviewThreads,
}

#[derive(Debug, Deserialize, Default)]
struct RawReviewThreads {
    #[serde(default)]
    nodes: Vec<RawReviewThread>,
}

#[derive(Debug, Deserialize)]
struct RawReviewThread {
    #[serde(rename = "isResolved")]
    is_resolved: bool,
}

#[derive(Debug, Deserialize)]
struct RawCheck {
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

const FAIL_CONCLUSIONS: &[&str] = &["fail", "failure", "error", "action_required", "timed_out"];
const PENDING_STATUSES: &[&str] = &["pending", "queued", "in_progress", "waiting", "requested"];

fn aggregate_ci(checks: &[RawCheck]) -> (CiState, u32, u32, Vec<String>) {
    let total = checks.len() as u32;
    let mut done = 0u32;
    let mut failing = Vec::new();
    let mut any_fail = false;
    let mut any_pending = false;

    for check in checks {
        let conclusion = check.conclusion.as_deref().unwrap_or("").to_ascii_lowercase();
        let status = check.status.as_deref().unwrap_or("").to_ascii_lowercase();

        if FAIL_CONCLUSIONS.contains(&conclusion.as_str()) {
            any_fail = true;
            if let Some(name) = &check.name {
                failing.push(name.clone());
            }
        }
        if PENDING_STATUSES.iter().any(|p| *p == status || *p == conclusion) {
            any_pending = true;
        } else {
            done += 1;
        }
    }

    let state = if any_fail {
        CiState::Fail
    } else if any_pending {
        CiState::InProgress
    } else if total > 0 {
        CiState::Success
    } else {
        CiState::None
    };

    (state, done, total, failing)
}

fn pr_status(raw: &RawPr) -> PrStatus {
    if raw.is_draft {
        PrStatus::Draft
    } else {
        match raw.state.to_ascii_uppercase().as_str() {
            "MERGED" => PrStatus::Merged,
            "CLOSED" => PrStatus::Closed,
            _ => PrStatus::Open,
        }
    }
}

fn to_pr_data(raw: &RawPr) -> PrData {
    let (ci_state, ci_done, ci_total, ci_failing_names) = aggregate_ci(&raw.status_check_rollup);
    let unresolved_comments = raw
        .review_threads
        .nodes
        .iter()
        .filter(|t| !t.is_resolved)
        .count() as u32;
    let resolved_comments = raw
        .review_threads
        .nodes
        .iter()
        .filter(|t| t.is_resolved)
        .count() as u32;

    PrData {
        number: raw.number,
        url: raw.url.clone(),
        status: pr_status(raw),
        ci_state,
        ci_done,
        ci_total,
        ci_failing_names,
        approved: raw.review_decision.as_deref() == Some("APPROVED"),
        unresolved_comments,
        resolved_comments,
    }
}

fn non_interactive_cmd(program: &str) -> Cmd {
    Cmd::new(program)
        .env_remove("CLICOLOR_FORCE")
        .env_remove("GH_FORCE_TTY")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env("GH_PROMPT_DISABLED", "1")
}

fn tool_available(tool: &str, args: &[&str]) -> bool {
    Cmd::new(tool)
        .args(args.iter().copied())
        .run()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

const PR_FIELDS: &str =
    "number,url,headRefName,isDraft,state,statusCheckRollup,reviewDecision,reviewThreads";

/// GitHub Gateway: fetches PR/CI/review data for a repository via `gh`.
///
/// Memoizes per `(repoRoot, branch-set key)`; a `force` flag bypasses the memo.
pub struct GitHubGateway {
    memo: DashMap<String, HashMap<String, PrData>>,
    installed: Mutex<Option<bool>>,
}

impl Default for GitHubGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubGateway {
    pub fn new() -> Self {
        Self {
            memo: DashMap::new(),
            installed: Mutex::new(None),
        }
    }

    fn ensure_available(&self) -> Result<(), GhError> {
        let mut cached = self.installed.lock().unwrap();
        if let Some(true) = *cached {
            return Ok(());
        }
        let installed = tool_available("gh", &["--version"]);
        *cached = Some(installed);
        if !installed {
            return Err(GhError::NotInstalled);
        }
        if !tool_available("gh", &["auth", "status"]) {
            return Err(GhError::Unauthenticated);
        }
        Ok(())
    }

    fn fetch_prs(&self, repo_root: &std::path::Path) -> Result<Vec<RawPr>, GhError> {
        self.ensure_available()?;
        let output = non_interactive_cmd("gh")
            .args([
                "pr",
                "list",
                "--state",
                "all",
                "--json",
                PR_FIELDS,
                "--limit",
                "200",
            ])
            .current_dir(repo_root)
            .run()
            .map_err(|e| GhError::Other(e.to_string()))?;

        if !output.status.success() {
            return Err(GhError::Other(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| GhError::Other(e.to_string()))
    }

    /// `repoRoot + "|" + sort(unique(branch names)).join(",")`.
    pub fn cache_key(repo_root: &std::path::Path, branches: &[String]) -> String {
        let mut unique: Vec<&str> = branches.iter().map(String::as_str).collect();
        unique.sort_unstable();
        unique.dedup();
        format!("{}|{}", repo_root.display(), unique.join(","))
    }

    /// Map branch names to PR data for a repository, honoring the per-key memo
    /// unless `force` is set.
    pub fn pr_data_for_branches(
        &self,
        repo_root: &std::path::Path,
        branches: &[String],
        force: bool,
    ) -> Result<HashMap<String, PrData>, GhError> {
        let key = Self::cache_key(repo_root, branches);
        if !force
            && let Some(cached) = self.memo.get(&key)
        {
            return Ok(cached.clone());
        }

        let prs = self.fetch_prs(repo_root)?;
        let wanted: std::collections::HashSet<&str> =
            branches.iter().map(String::as_str).collect();

        let mut result = HashMap::new();
        for raw in &prs {
            if wanted.contains(raw.head_ref_name.as_str()) {
                result.insert(raw.head_ref_name.clone(), to_pr_data(raw));
            }
        }

        self.memo.insert(key, result.clone());
        Ok(result)
    }

    /// All PRs for the repository, decoupled from local branches.
    pub fn prs_for_repo(
        &self,
        repo_root: &std::path::Path,
        force: bool,
    ) -> Result<Vec<PrListData>, GhError> {
        let key = format!("{}|__all__", repo_root.display());
        // The repo-wide listing doesn't reuse the per-branch memo entry, but
        // still respects `force` by always refetching when set.
        if force {
            self.memo.remove(&key);
        }

        let prs = self.fetch_prs(repo_root)?;
        Ok(prs
            .iter()
            .map(|raw| PrListData {
                number: raw.number,
                branch: raw.head_ref_name.clone(),
                url: raw.url.clone(),
                status: pr_status(raw),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_aggregation_fail_beats_pending() {
        let checks = vec![
            RawCheck {
                conclusion: Some("success".into()),
                status: Some("completed".into()),
                name: Some("build".into()),
            },
            RawCheck {
                conclusion: Some("failure".into()),
                status: Some("completed".into()),
                name: Some("test".into()),
            },
            RawCheck {
                conclusion: None,
                status: Some("in_progress".into()),
                name: Some("lint".into()),
            },
        ];
        let (state, _done, total, failing) = aggregate_ci(&checks);
        assert_eq!(state, CiState::Fail);
        assert_eq!(total, 3);
        assert_eq!(failing, vec!["test".to_string()]);
    }

    #[test]
    fn ci_aggregation_in_progress_without_failures() {
        let checks = vec![RawCheck {
            conclusion: None,
            status: Some("queued".into()),
            name: Some("build".into()),
        }];
        let (state, _, _, _) = aggregate_ci(&checks);
        assert_eq!(state, CiState::InProgress);
    }

    #[test]
    fn ci_aggregation_success_when_all_done() {
        let checks = vec![RawCheck {
            conclusion: Some("success".into()),
            status: Some("completed".into()),
            name: Some("build".into()),
        }];
        let (state, done, total, _) = aggregate_ci(&checks);
        assert_eq!(state, CiState::Success);
        assert_eq!(done, 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn ci_aggregation_none_when_empty() {
        let (state, _, total, _) = aggregate_ci(&[]);
        assert_eq!(state, CiState::None);
        assert_eq!(total, 0);
    }

    #[test]
    fn cache_key_sorts_and_dedups() {
        let key = GitHubGateway::cache_key(
            std::path::Path::new("/repo"),
            &["b".to_string(), "a".to_string(), "a".to_string()],
        );
        assert_eq!(key, "/repo|a,b");
    }
}

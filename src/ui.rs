//! UI Reducer: a single-threaded, message-driven state machine with no I/O of
//! its own. Every effect (a git call, a gh call, a filesystem stat) happens in
//! a *command* that runs elsewhere and reports back as a message; the reducer
//! only ever installs data and decides what to do next.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::github::{GhError, PrData, PrListData};
use crate::lock::WorktreeLock;
use crate::worktree::WorktreeStatus;

/// Current screen/page within list mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Worktrees,
    PrList,
}

/// Which action-menu variant is showing, which determines its item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMenuVariant {
    /// Selected row is a ready, unlocked worktree.
    Use,
    /// Selected row is the `+ New worktree` row.
    Create,
}

/// Top-level mode of the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    List,
    Creating,
    DeleteConfirm { path: PathBuf },
    UnlockConfirm { path: PathBuf },
    ActionMenu { variant: ActionMenuVariant, item: usize },
    NewBranchName { input: String },
    BranchPick { query: String },
}

/// Handoff fields the reducer hands to the host program when it quits.
#[derive(Debug, Clone, Default)]
pub struct PendingHandoff {
    pub path: Option<PathBuf>,
    pub branch: Option<String>,
    pub open_shell: bool,
    pub lock: Option<()>, // placeholder flag; the real WorktreeLock lives in `state.held_lock`
}

/// Full reducer state.
pub struct State {
    pub status: WorktreeStatus,
    pub pr_data: HashMap<String, PrData>,
    pub pr_list: Vec<PrListData>,
    pub gh_loaded_key: String,
    pub gh_fetching_key: String,
    pub force_gh_refresh: bool,

    pub mode: Mode,
    pub page: Page,
    pub worktree_cursor: usize,
    pub pr_cursor: usize,

    pub err_msg: Option<String>,
    pub warn_msg: Option<String>,
    pub gh_warn_msg: Option<String>,

    pub auto_action_path: Option<PathBuf>,
    pub pending: PendingHandoff,
    pub held_lock: Option<WorktreeLock>,
    pub should_quit: bool,
}

impl State {
    pub fn new(status: WorktreeStatus) -> Self {
        Self {
            status,
            pr_data: HashMap::new(),
            pr_list: Vec::new(),
            gh_loaded_key: String::new(),
            gh_fetching_key: String::new(),
            force_gh_refresh: false,
            mode: Mode::List,
            page: Page::Worktrees,
            worktree_cursor: 0,
            pr_cursor: 0,
            err_msg: None,
            warn_msg: None,
            gh_warn_msg: None,
            auto_action_path: None,
            pending: PendingHandoff::default(),
            held_lock: None,
            should_quit: false,
        }
    }

    /// Number of selectable rows on the worktree page (worktrees + the
    /// `+ New worktree` row).
    pub fn selector_row_count(&self) -> usize {
        self.status.worktrees.len() + 1
    }

    /// Clamp an index into `[0, selectorRowCount-1]`, idempotent and never
    /// negative (falls back to 0 when the row count is somehow 0).
    pub fn clamp_list_index(&self, index: usize) -> usize {
        let max = self.selector_row_count().saturating_sub(1);
        index.min(max)
    }
}

/// Messages the reducer accepts.
pub enum Msg {
    Status(WorktreeStatus),
    GhData {
        repo_root: PathBuf,
        key: String,
        by_branch: HashMap<String, PrData>,
        prs: Vec<PrListData>,
        err: Option<GhError>,
    },
    PollTick,
    SpinnerTick,
    CreateDone {
        info: Option<crate::git::WorktreeInfo>,
        err: Option<String>,
    },
    BaseRefResolved { base_ref: String },
    Key(Key),
}

/// Key input, reduced to the subset the reducer acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Char(char),
    Escape,
    CtrlC,
}

/// A command the reducer wants the host to run. The reducer never runs these
/// itself — it only emits the request and later consumes the reply message.
#[derive(Debug, Clone)]
pub enum Command {
    FetchStatus,
    FetchGhData { repo_root: PathBuf, key: String, branches: Vec<String>, force: bool },
    CreateNewBranch { branch: String, base_ref: String },
    OpenUrl(String),
    Quit,
}

/// `repoRoot + "|" + sort(unique(branch names)).join(",")`, or `""` with no repo.
pub fn gh_data_key_for_status(status: &WorktreeStatus) -> String {
    match &status.repo_root {
        Some(repo_root) => {
            let mut branches: Vec<&str> = status
                .worktrees
                .iter()
                .filter_map(|e| e.info.branch.as_deref())
                .filter(|b| !b.is_empty() && *b != "detached")
                .collect();
            branches.sort_unstable();
            branches.dedup();
            format!("{}|{}", repo_root.display(), branches.join(","))
        }
        None => String::new(),
    }
}

impl State {
    /// Drive the reducer with one message, returning any command the host
    /// should run. Returns `None` when no command is needed.
    pub fn update(&mut self, msg: Msg) -> Option<Command> {
        match msg {
            Msg::Status(new_status) => self.on_status(new_status),
            Msg::GhData { repo_root, key, by_branch, prs, err } => {
                self.on_gh_data(repo_root, key, by_branch, prs, err);
                None
            }
            Msg::PollTick => {
                if self.mode == Mode::List {
                    Some(Command::FetchStatus)
                } else {
                    None
                }
            }
            Msg::SpinnerTick => None,
            Msg::CreateDone { info, err } => {
                self.mode = Mode::List;
                if let Some(e) = err {
                    self.err_msg = Some(e);
                } else if let Some(info) = info {
                    self.auto_action_path = Some(info.path);
                }
                Some(Command::FetchStatus)
            }
            Msg::BaseRefResolved { base_ref } => {
                self.status.base_ref = Some(base_ref);
                None
            }
            Msg::Key(key) => self.on_key(key),
        }
    }

    /// Reconciliation rules for a fresh `StatusMsg`.
    fn on_status(&mut self, new_status: WorktreeStatus) -> Option<Command> {
        let key = gh_data_key_for_status(&new_status);

        let mut cmd = None;
        if key.is_empty() {
            self.pr_data.clear();
            self.gh_loaded_key.clear();
            self.gh_fetching_key.clear();
        } else if key == self.gh_loaded_key || key == self.gh_fetching_key {
            // Cached data still applies (branches may have moved); no fetch.
        } else {
            self.gh_fetching_key = key.clone();
            let branches: Vec<String> = new_status
                .worktrees
                .iter()
                .filter_map(|e| e.info.branch.clone())
                .filter(|b| !b.is_empty() && b != "detached")
                .collect();
            let repo_root = new_status.repo_root.clone().unwrap_or_default();
            cmd = Some(Command::FetchGhData {
                repo_root,
                key,
                branches,
                force: self.force_gh_refresh,
            });
            self.force_gh_refresh = false;
        }

        // Handle the S2 auto-select/open-action-menu flow.
        if let Some(auto_path) = self.auto_action_path.take()
            && let Some(idx) = new_status
                .worktrees
                .iter()
                .position(|e| e.info.path == auto_path)
        {
            self.worktree_cursor = idx;
            self.mode = Mode::ActionMenu { variant: ActionMenuVariant::Use, item: 0 };
        }

        self.status = new_status;
        self.worktree_cursor = self.clamp_list_index(self.worktree_cursor);
        cmd
    }

    fn on_gh_data(
        &mut self,
        repo_root: PathBuf,
        key: String,
        by_branch: HashMap<String, PrData>,
        prs: Vec<PrListData>,
        err: Option<GhError>,
    ) {
        if self.status.repo_root.as_ref() != Some(&repo_root) || key != self.gh_fetching_key {
            return; // stale reply
        }
        self.gh_fetching_key.clear();

        match err {
            Some(e) => {
                self.gh_warn_msg = Some(format!("GitHub CLI not available: {e}"));
                // Preserve prior PR data; do not clobber on failure.
            }
            None => {
                self.pr_data = by_branch;
                self.pr_list = prs;
                self.gh_loaded_key = key;
                self.gh_warn_msg = None;
            }
        }
    }

    fn on_key(&mut self, key: Key) -> Option<Command> {
        if self.mode != Mode::List {
            return self.on_key_in_mode(key);
        }

        match key {
            Key::CtrlC => {
                self.should_quit = true;
                Some(Command::Quit)
            }
            Key::Char('q') => {
                self.should_quit = true;
                Some(Command::Quit)
            }
            Key::Up | Key::Char('k') => {
                self.move_cursor(-1);
                None
            }
            Key::Down | Key::Char('j') => {
                self.move_cursor(1);
                None
            }
            Key::Left => {
                self.page = Page::Worktrees;
                None
            }
            Key::Right => {
                self.page = Page::PrList;
                None
            }
            Key::Enter => self.on_enter(),
            Key::Char('s') => {
                if let Some(entry) = self.selected_worktree() {
                    let path = entry.info.path.clone();
                    let branch = entry.info.branch.clone();
                    self.pending.path = Some(path);
                    self.pending.branch = branch;
                    self.pending.open_shell = true;
                    self.should_quit = true;
                    return Some(Command::Quit);
                }
                None
            }
            Key::Char('d') => {
                if let Some(entry) = self.selected_worktree() {
                    self.mode = Mode::DeleteConfirm { path: entry.info.path.clone() };
                }
                None
            }
            Key::Char('u') => {
                if let Some(entry) = self.selected_worktree()
                    && !entry.available
                    && !self.is_orphaned(&entry.info.path)
                {
                    self.mode = Mode::UnlockConfirm { path: entry.info.path.clone() };
                }
                None
            }
            Key::Char('p') => {
                if let Some(entry) = self.selected_worktree()
                    && let Some(branch) = &entry.info.branch
                    && let Some(pr) = self.pr_data.get(branch)
                {
                    return Some(Command::OpenUrl(pr.url.clone()));
                }
                None
            }
            Key::Char('r') => {
                self.gh_loaded_key.clear();
                self.gh_fetching_key.clear();
                self.force_gh_refresh = true;
                Some(Command::FetchStatus)
            }
            _ => None,
        }
    }

    fn on_key_in_mode(&mut self, key: Key) -> Option<Command> {
        match &self.mode {
            Mode::DeleteConfirm { .. } | Mode::UnlockConfirm { .. } => {
                if key == Key::Char('y') || key == Key::Enter {
                    // Host executes the actual delete/unlock command; the reducer
                    // just returns to list mode here since it owns no I/O.
                    self.mode = Mode::List;
                } else if key == Key::Escape || key == Key::Char('n') {
                    self.mode = Mode::List;
                }
                None
            }
            Mode::ActionMenu { .. } => {
                if key == Key::Escape {
                    self.mode = Mode::List;
                }
                None
            }
            Mode::NewBranchName { input } => {
                let mut input = input.clone();
                match key {
                    Key::Escape => self.mode = Mode::List,
                    Key::Enter => {
                        let base_ref = self.status.base_ref.clone().unwrap_or_else(|| "HEAD".into());
                        self.mode = Mode::Creating;
                        return Some(Command::CreateNewBranch { branch: input, base_ref });
                    }
                    Key::Char(c) => {
                        input.push(c);
                        self.mode = Mode::NewBranchName { input };
                    }
                    _ => {}
                }
                None
            }
            Mode::BranchPick { query } => {
                let mut query = query.clone();
                match key {
                    Key::Escape => self.mode = Mode::List,
                    Key::Char(c) => {
                        query.push(c);
                        self.mode = Mode::BranchPick { query };
                    }
                    _ => {}
                }
                None
            }
            Mode::List | Mode::Creating => None,
        }
    }

    fn on_enter(&mut self) -> Option<Command> {
        let cursor = self.worktree_cursor;
        if cursor == self.status.worktrees.len() {
            self.mode = Mode::ActionMenu { variant: ActionMenuVariant::Create, item: 0 };
            return None;
        }
        let Some(entry) = self.status.worktrees.get(cursor) else {
            return None;
        };
        if self.is_orphaned(&entry.info.path) {
            self.err_msg = Some("worktree is orphaned".into());
            return None;
        }
        if !entry.available {
            self.err_msg = Some("worktree is locked by another process".into());
            return None;
        }
        self.mode = Mode::ActionMenu { variant: ActionMenuVariant::Use, item: 0 };
        None
    }

    fn move_cursor(&mut self, delta: i64) {
        match self.page {
            Page::Worktrees => {
                let count = self.selector_row_count() as i64;
                let next = (self.worktree_cursor as i64 + delta).clamp(0, count - 1);
                self.worktree_cursor = next as usize;
            }
            Page::PrList => {
                let count = self.pr_list.len() as i64;
                if count == 0 {
                    return;
                }
                let next = (self.pr_cursor as i64 + delta).clamp(0, count - 1);
                self.pr_cursor = next as usize;
            }
        }
    }

    fn selected_worktree(&self) -> Option<&crate::worktree::WorktreeEntry> {
        self.status.worktrees.get(self.worktree_cursor)
    }

    fn is_orphaned(&self, path: &std::path::Path) -> bool {
        self.status.orphaned.iter().any(|o| o.path == path)
    }
}

/// Items for the action menu for a given variant, paired with their base ref
/// (used to label "Checkout new branch from <base>").
pub fn action_menu_items(variant: ActionMenuVariant, base_ref: &str) -> Vec<String> {
    match variant {
        ActionMenuVariant::Use => vec![
            "Use".to_string(),
            format!("Checkout new branch from {base_ref}"),
            "Choose an existing branch".to_string(),
            "Open shell here".to_string(),
        ],
        ActionMenuVariant::Create => vec![
            format!("Checkout new branch from {base_ref}"),
            "Choose an existing branch".to_string(),
        ],
    }
}

/// Filter candidate branches for the branch-pick typeahead.
///
/// Excludes branches already present in `existing`. Filter is a lowercased,
/// trimmed substring match; for the open-screen typeahead, a leading `#`
/// additionally matches `prNumber` by prefix.
pub fn branch_pick_candidates(
    all_branches: &[String],
    existing: &[String],
    query: &str,
) -> Vec<String> {
    let query = query.trim().to_ascii_lowercase();
    all_branches
        .iter()
        .filter(|b| !existing.contains(b))
        .filter(|b| query.is_empty() || b.to_ascii_lowercase().contains(&query))
        .cloned()
        .collect()
}

/// `openFilteredIndices`: filter indices of `(branch, pr_number)` pairs for the
/// open-screen typeahead. Empty query returns all indices, in input order. A
/// `#`-prefixed query matches PR numbers by prefix instead of branch names.
pub fn open_filtered_indices(
    items: &[(String, Option<u64>)],
    query: &str,
) -> Vec<usize> {
    let query = query.trim();
    if query.is_empty() {
        return (0..items.len()).collect();
    }

    if let Some(number_prefix) = query.strip_prefix('#') {
        return items
            .iter()
            .enumerate()
            .filter(|(_, (_, number))| {
                number
                    .map(|n| n.to_string().starts_with(number_prefix))
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();
    }

    let lower = query.to_ascii_lowercase();
    items
        .iter()
        .enumerate()
        .filter(|(_, (branch, _))| branch.to_ascii_lowercase().contains(&lower))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::WorktreeInfo;
    use crate::worktree::WorktreeEntry;

    fn entry(path: &str, branch: Option<&str>) -> WorktreeEntry {
        WorktreeEntry {
            info: WorktreeInfo {
                path: PathBuf::from(path),
                head: "abc".into(),
                branch: branch.map(String::from),
                bare: false,
                detached: branch.is_none(),
                locked: None,
                prunable: None,
            },
            available: true,
        }
    }

    fn status_with(repo_root: &str, worktrees: Vec<WorktreeEntry>) -> WorktreeStatus {
        WorktreeStatus {
            repo_root: Some(PathBuf::from(repo_root)),
            worktrees,
            ..Default::default()
        }
    }

    #[test]
    fn gh_key_empty_without_repo() {
        assert_eq!(gh_data_key_for_status(&WorktreeStatus::default()), "");
    }

    #[test]
    fn gh_key_sorts_and_dedups_branches() {
        let status = status_with(
            "/repo",
            vec![entry("/repo/wt.1", Some("b")), entry("/repo/wt.2", Some("a"))],
        );
        assert_eq!(gh_data_key_for_status(&status), "/repo|a,b");
    }

    #[test]
    fn stale_gh_reply_is_dropped() {
        let mut state = State::new(status_with("/repo", vec![entry("/repo/wt.1", Some("a"))]));
        state.gh_fetching_key = "/repo|a,b".to_string();

        state.on_gh_data(
            PathBuf::from("/repo"),
            "/repo|a".to_string(),
            HashMap::new(),
            Vec::new(),
            None,
        );

        // Key mismatch: dropped, loaded key untouched.
        assert_eq!(state.gh_loaded_key, "");
        assert_eq!(state.gh_fetching_key, "/repo|a,b");
    }

    #[test]
    fn matching_gh_reply_installs_data() {
        let mut state = State::new(status_with("/repo", vec![entry("/repo/wt.1", Some("a"))]));
        state.gh_fetching_key = "/repo|a".to_string();

        let mut data = HashMap::new();
        data.insert(
            "a".to_string(),
            PrData {
                number: 1,
                url: "https://example.com/pr/1".into(),
                status: crate::github::PrStatus::Open,
                ci_state: crate::github::CiState::Success,
                ci_done: 1,
                ci_total: 1,
                ci_failing_names: vec![],
                approved: true,
                unresolved_comments: 0,
                resolved_comments: 0,
            },
        );
        state.on_gh_data(PathBuf::from("/repo"), "/repo|a".to_string(), data, Vec::new(), None);

        assert_eq!(state.gh_loaded_key, "/repo|a");
        assert_eq!(state.gh_fetching_key, "");
        assert!(state.pr_data.contains_key("a"));
    }

    #[test]
    fn gh_error_preserves_prior_data() {
        let mut state = State::new(status_with("/repo", vec![entry("/repo/wt.1", Some("a"))]));
        state.pr_data.insert(
            "a".to_string(),
            PrData {
                number: 1,
                url: "u".into(),
                status: crate::github::PrStatus::Open,
                ci_state: crate::github::CiState::Success,
                ci_done: 1,
                ci_total: 1,
                ci_failing_names: vec![],
                approved: false,
                unresolved_comments: 0,
                resolved_comments: 0,
            },
        );
        state.gh_fetching_key = "/repo|a".to_string();

        state.on_gh_data(
            PathBuf::from("/repo"),
            "/repo|a".to_string(),
            HashMap::new(),
            Vec::new(),
            Some(GhError::NotInstalled),
        );

        assert!(state.pr_data.contains_key("a"));
        assert!(state.gh_warn_msg.is_some());
    }

    #[test]
    fn clamp_list_index_is_idempotent_and_bounded() {
        let state = State::new(status_with(
            "/repo",
            vec![entry("/repo/wt.1", Some("a")), entry("/repo/wt.2", Some("b"))],
        ));
        for idx in [0usize, 2, 50] {
            let clamped = state.clamp_list_index(idx);
            assert_eq!(state.clamp_list_index(clamped), clamped);
            assert!(clamped < state.selector_row_count());
        }
    }

    #[test]
    fn branch_pick_excludes_existing_and_filters_substring() {
        let all = vec!["feature/a".to_string(), "feature/b".to_string(), "main".to_string()];
        let existing = vec!["main".to_string()];
        let candidates = branch_pick_candidates(&all, &existing, "feat");
        assert_eq!(candidates, vec!["feature/a".to_string(), "feature/b".to_string()]);
    }

    #[test]
    fn open_filtered_indices_matches_pr_number_prefix() {
        let items = vec![
            ("a".to_string(), Some(123u64)),
            ("b".to_string(), Some(456u64)),
            ("c".to_string(), None),
        ];
        assert_eq!(open_filtered_indices(&items, "#12"), vec![0]);
        assert_eq!(open_filtered_indices(&items, ""), vec![0, 1, 2]);
        assert_eq!(open_filtered_indices(&items, "b"), vec![1]);
    }
}

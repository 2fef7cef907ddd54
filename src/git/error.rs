//! Git error types and formatting

use std::path::PathBuf;

#[derive(Debug)]
pub enum GitError {
    /// Generic error with a message
    CommandFailed(String),
    /// Error for parsing failures
    ParseError(String),
    /// Repository is in detached HEAD state
    DetachedHead { action: Option<String> },
    /// Working tree has untracked files
    UntrackedFiles,
    /// Working tree has uncommitted changes
    UncommittedChanges {
        action: Option<String>,
        branch: Option<String>,
        force_hint: bool,
    },
    /// Branch already exists (when trying to create)
    BranchAlreadyExists { branch: String },
    /// WorktreeInfo directory is missing
    WorktreeMissing { branch: String },
    /// No worktree found for branch
    NoWorktreeFound { branch: String },
    /// Cannot push due to conflicting uncommitted changes
    ConflictingChanges {
        files: Vec<String>,
        worktree_path: PathBuf,
    },
    /// Push is not a fast-forward
    NotFastForward {
        target_branch: String,
        commits_formatted: String,
        files_formatted: String,
    },
    /// Found merge commits in push range
    MergeCommitsFound,
    /// Command was not approved by user
    CommandNotApproved,
    /// Child process exited with non-zero code (preserves exit code for signals)
    ChildProcessExited { code: i32, message: String },
    /// Push operation failed
    PushFailed { error: String },
    /// Rebase resulted in a conflict or incomplete state
    RebaseConflict {
        state: String,
        target_branch: String,
        git_output: String,
    },
    /// WorktreeInfo path already exists on filesystem
    WorktreePathExists { path: PathBuf },
    /// Creating a worktree failed
    WorktreeCreationFailed {
        branch: String,
        base_branch: Option<String>,
        error: String,
    },
    /// Switching branches failed
    SwitchFailed { branch: String, error: String },
    /// Removing a worktree directory failed
    WorktreeRemovalFailed {
        branch: String,
        path: PathBuf,
        error: String,
    },
    /// Deleting a branch failed
    BranchDeletionFailed { branch: String, error: String },
    /// Catch-all for errors without a dedicated variant
    Other { message: String },
    /// Operation requires a worktree but none was found at the given path
    NotInWorktree { action: Option<String> },
}

/// Structured details of a failed command, extracted from a streamed-command error.
#[derive(Debug, Clone)]
pub struct FailedCommand {
    /// The command string, e.g., "git worktree add /path -b fix main"
    pub command: String,
    /// Exit information, e.g., "exit code 255" or "killed by signal"
    pub exit_info: String,
}

impl GitError {
    /// Create a formatted user-facing error message.
    ///
    /// Use this for application errors (not raw git output).
    /// For raw git stderr, use `CommandFailed` directly.
    pub fn message(msg: impl Into<String>) -> Self {
        GitError::CommandFailed(msg.into())
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Generic error - raw passthrough, no formatting
            // Specific error variants should be used for git command failures that need formatting
            GitError::CommandFailed(msg) => write!(f, "{}", msg),

            GitError::ParseError(msg) => write!(f, "{}", msg),

            // Detached HEAD error
            GitError::DetachedHead { action } => {
                let suffix = action
                    .as_ref()
                    .map(|a| format!(" to {a}"))
                    .unwrap_or_default();
                write!(
                    f,
                    "Not on a branch (detached HEAD){suffix}\nhint: You are in detached HEAD state"
                )
            }

            // Untracked files error
            GitError::UntrackedFiles => {
                write!(
                    f,
                    "Working tree has untracked files\nhint: Add them with 'git add' and try again"
                )
            }

            // Uncommitted changes
            GitError::UncommittedChanges {
                action,
                branch,
                force_hint,
            } => {
                let action_suffix = action
                    .as_ref()
                    .map(|a| format!(" to {a}"))
                    .unwrap_or_default();
                let branch_suffix = branch
                    .as_ref()
                    .map(|b| format!(" on {b}"))
                    .unwrap_or_default();
                write!(
                    f,
                    "Working tree has uncommitted changes{branch_suffix}{action_suffix}\nhint: Commit or stash them first"
                )?;
                if *force_hint {
                    write!(f, "\nhint: Or use --force to proceed anyway")?;
                }
                Ok(())
            }

            // Branch already exists
            GitError::BranchAlreadyExists { branch } => {
                write!(
                    f,
                    "Branch {branch} already exists\nhint: Remove --create flag to switch to it"
                )
            }

            // WorktreeInfo missing
            GitError::WorktreeMissing { branch } => {
                write!(
                    f,
                    "WorktreeInfo directory missing for {branch}\nhint: Run 'git worktree prune' to clean up"
                )
            }

            // No worktree found
            GitError::NoWorktreeFound { branch } => {
                write!(f, "No worktree found for branch {branch}")
            }

            // Conflicting changes
            GitError::ConflictingChanges {
                files,
                worktree_path,
            } => {
                write!(f, "Cannot push: conflicting uncommitted changes in:\n\n")?;
                if !files.is_empty() {
                    for file in files {
                        writeln!(f, "  {file}")?;
                    }
                }
                write!(
                    f,
                    "\nhint: Commit or stash these changes in {} first",
                    worktree_path.display()
                )
            }

            // Not fast-forward
            GitError::NotFastForward {
                target_branch,
                commits_formatted,
                files_formatted,
            } => {
                writeln!(
                    f,
                    "Can't push to local {target_branch} branch: it has newer commits"
                )?;

                // Show the formatted commit log
                if !commits_formatted.is_empty() {
                    writeln!(f)?;
                    write!(f, "{}", commits_formatted)?;
                }

                // Show the formatted diff stat
                if !files_formatted.is_empty() {
                    writeln!(f)?;
                    write!(f, "{}", files_formatted)?;
                }

                write!(
                    f,
                    "\nhint: Use 'wt merge' to rebase your changes onto {target_branch}"
                )
            }

            // Merge commits found
            GitError::MergeCommitsFound => {
                write!(
                    f,
                    "Found merge commits in push range\nhint: Use --allow-merge-commits to push non-linear history"
                )
            }

            // Command not approved
            GitError::CommandNotApproved => {
                Ok(()) // on_skip callback handles the printing
            }

            // Child process exited with non-zero code
            // Display with the raw message - main.rs will use the exit code
            GitError::ChildProcessExited { code: _, message } => write!(f, "{message}"),

            // Push failed
            GitError::PushFailed { error } => {
                let header = "Push failed".to_string();
                write!(f, "{}", format_error_block(header, error))
            }

            // Rebase conflict
            GitError::RebaseConflict {
                state: _,
                target_branch,
                git_output,
            } => {
                write!(f, "Rebase onto {target_branch} incomplete")?;

                if !git_output.is_empty() {
                    writeln!(f)?;
                    write!(f, "{}", git_output)?;
                } else {
                    // Fallback hints if no git output (edge case)
                    write!(
                        f,
                        "\n\nhint: Resolve conflicts and run 'git rebase --continue'\nhint: Or abort with 'git rebase --abort'"
                    )?;
                }

                Ok(())
            }

            // WorktreeInfo path already exists
            GitError::WorktreePathExists { path } => {
                write!(
                    f,
                    "Directory already exists: {}\nhint: Remove the directory or use a different branch name",
                    path.display()
                )
            }

            GitError::WorktreeCreationFailed {
                branch,
                base_branch,
                error,
            } => {
                let base_suffix = base_branch
                    .as_ref()
                    .map(|base| format!(" from base {base}"))
                    .unwrap_or_default();

                let header = format!("Failed to create worktree for {branch}{base_suffix}");
                write!(f, "{}", format_error_block(header, error))
            }

            GitError::SwitchFailed { branch, error } => {
                let header = format!("Failed to switch to {branch}");
                write!(f, "{}", format_error_block(header, error))
            }

            GitError::WorktreeRemovalFailed {
                branch,
                path,
                error,
            } => {
                let header = format!(
                    "Failed to remove worktree for {branch} at {}",
                    path.display()
                );
                write!(f, "{}", format_error_block(header, error))
            }

            GitError::BranchDeletionFailed { branch, error } => {
                let header = format!("Failed to delete branch {branch}");
                write!(f, "{}", format_error_block(header, error))
            }

            GitError::Other { message } => write!(f, "{message}"),

            GitError::NotInWorktree { action } => {
                let suffix = action
                    .as_ref()
                    .map(|a| format!(" to {a}"))
                    .unwrap_or_default();
                write!(f, "Not inside a worktree{suffix}")
            }
        }
    }
}

fn format_error_block(header: String, error: &str) -> String {
    let trimmed = error.trim();
    if trimmed.is_empty() {
        header
    } else {
        format!("{header}\n{trimmed}")
    }
}

impl std::error::Error for GitError {}

// Automatic conversion from io::Error to GitError
// This eliminates the need for manual .map_err() on output functions
// Parses exit codes from error messages to preserve signal information
//
// Protocol: execute_streaming() embeds exit codes in error messages as:
//   "CHILD_EXIT_CODE:{code} {original_message}"
// This allows passing exit codes through io::Error (which doesn't carry codes)
// while preserving the full error context.
impl From<std::io::Error> for GitError {
    fn from(e: std::io::Error) -> Self {
        let msg = e.to_string();
        // Parse exit code from error message (format: "CHILD_EXIT_CODE:130 Command failed...")
        if let Some(rest) = msg.strip_prefix("CHILD_EXIT_CODE:")
            && let Some(space_idx) = rest.find(' ')
            && let Ok(code) = rest[..space_idx].parse::<i32>()
        {
            let message = rest[space_idx + 1..].to_string();
            return GitError::ChildProcessExited { code, message };
        }
        GitError::CommandFailed(msg)
    }
}

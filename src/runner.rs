//! Runner / Handoff: turns a UI reducer exit value into a real process
//! handoff — an interactive shell in the target worktree, or the user's URL
//! opener for a PR link — releasing any held lock once the child exits.

use std::path::PathBuf;
use std::process::Command;

use crate::lock::{LockManager, WorktreeLock};

/// What the UI reducer decided to do when it handed control back to the host.
pub enum Handoff {
    /// `cd` into `path` and exec an interactive shell there.
    Shell {
        path: PathBuf,
        #[allow(dead_code)]
        branch: Option<String>,
        lock: Option<WorktreeLock>,
    },
    /// Open a URL (a PR page) through the OS's default opener.
    OpenUrl(String),
    /// User quit without selecting anything.
    Quit,
}

/// Resolve the user's interactive shell: `$SHELL` on Unix, `%COMSPEC%` on
/// Windows, falling back to a sensible platform default.
fn interactive_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

/// The program used to open a URL in the platform's default handler.
fn url_opener() -> (&'static str, Vec<&'static str>) {
    if cfg!(target_os = "macos") {
        ("open", vec![])
    } else if cfg!(windows) {
        ("cmd", vec!["/C", "start", ""])
    } else {
        ("xdg-open", vec![])
    }
}

/// Execute a handoff, releasing `lock` once the spawned child exits.
///
/// For `Shell`, this blocks on the child and returns its exit status; the
/// host's own process then exits with that status so the parent shell sees
/// the same result as if it had launched the shell itself.
pub fn run(handoff: Handoff, locks: &LockManager) -> anyhow::Result<i32> {
    match handoff {
        Handoff::Shell { path, branch: _, lock } => {
            let shell = interactive_shell();
            let status = Command::new(&shell).current_dir(&path).status();
            if let Some(lock) = lock {
                let _ = locks.release(&lock);
            }
            let status = status?;
            Ok(status.code().unwrap_or(1))
        }
        Handoff::OpenUrl(url) => {
            let (program, args) = url_opener();
            let status = Command::new(program).args(args).arg(&url).status()?;
            Ok(status.code().unwrap_or(1))
        }
        Handoff::Quit => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_shell_has_a_value() {
        assert!(!interactive_shell().is_empty());
    }

    #[test]
    fn url_opener_is_nonempty() {
        let (program, _) = url_opener();
        assert!(!program.is_empty());
    }
}

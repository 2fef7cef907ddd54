//! Cross-process advisory locking for worktrees.
//!
//! A lock is a small JSON token file living in the user's state directory, named
//! deterministically from `(repoRoot, worktreePath)`. Token creation uses
//! create-exclusive semantics so two processes racing to acquire the same
//! worktree can never both succeed. A token naming a dead PID (or older than
//! [`STALE_AFTER`] and unreachable) is considered abandoned and can be stolen.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::{Deserialize, Serialize};

/// Recommended staleness horizon for lock tokens (see spec §9 open questions).
/// Not configurable at the type level yet; `Acquire`/`IsAvailable` accept an
/// override for tests.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Contents of a lock token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Token {
    pid: u32,
    hostname: String,
    acquired_at_unix: u64,
    worktree_path: PathBuf,
}

/// An owned handle to a held lock token. Release on drop is *not* automatic —
/// callers must call [`WorktreeLock::release`] (or let the process exit, which
/// is also a valid release since the token names this process's PID).
#[derive(Debug)]
pub struct WorktreeLock {
    pub repo_root: PathBuf,
    pub worktree_path: PathBuf,
    token_path: PathBuf,
    pub owner_pid: u32,
    pub acquired_at: SystemTime,
}

/// Lock acquisition failed because another live process holds it.
#[derive(Debug)]
pub struct ErrBusy {
    pub holder_pid: u32,
    pub hostname: String,
}

impl std::fmt::Display for ErrBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "worktree is in use by pid {} on {}",
            self.holder_pid, self.hostname
        )
    }
}

impl std::error::Error for ErrBusy {}

/// Manages lock tokens for one repository's worktrees.
///
/// Tokens live under `<state_dir>/wtx/locks/<repo_id>/<worktree_id>.lock`,
/// one directory per repo so a directory scan enumerates all held worktrees.
pub struct LockManager {
    locks_dir: PathBuf,
}

impl LockManager {
    /// Construct a manager rooted at the platform state directory.
    pub fn new() -> io::Result<Self> {
        let state_dir = choose_base_strategy()
            .ok()
            .and_then(|s| s.state_dir())
            .unwrap_or_else(std::env::temp_dir);
        Ok(Self {
            locks_dir: state_dir.join("wtx").join("locks"),
        })
    }

    /// Construct a manager rooted at an explicit directory (used by tests).
    pub fn at(locks_dir: impl Into<PathBuf>) -> Self {
        Self {
            locks_dir: locks_dir.into(),
        }
    }

    fn repo_dir(&self, repo_root: &Path) -> PathBuf {
        self.locks_dir.join(fingerprint(repo_root))
    }

    fn token_path(&self, repo_root: &Path, worktree_path: &Path) -> PathBuf {
        self.repo_dir(repo_root)
            .join(format!("{}.lock", fingerprint(worktree_path)))
    }

    /// Acquire an exclusive lock on `worktree_path` within `repo_root`.
    pub fn acquire(&self, repo_root: &Path, worktree_path: &Path) -> io::Result<Result<WorktreeLock, ErrBusy>> {
        let dir = self.repo_dir(repo_root);
        fs::create_dir_all(&dir)?;
        let token_path = self.token_path(repo_root, worktree_path);

        let pid = std::process::id();
        let hostname = local_hostname();
        let now = SystemTime::now();
        let token = Token {
            pid,
            hostname: hostname.clone(),
            acquired_at_unix: now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs(),
            worktree_path: worktree_path.to_path_buf(),
        };
        let body = serde_json::to_vec(&token).expect("token serializes");

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&token_path)
        {
            Ok(mut f) => {
                use io::Write;
                f.write_all(&body)?;
                Ok(Ok(WorktreeLock {
                    repo_root: repo_root.to_path_buf(),
                    worktree_path: worktree_path.to_path_buf(),
                    token_path,
                    owner_pid: pid,
                    acquired_at: now,
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match read_token(&token_path) {
                    Some(existing) if token_is_live(&existing) => Ok(Err(ErrBusy {
                        holder_pid: existing.pid,
                        hostname: existing.hostname,
                    })),
                    _ => {
                        // Dead or unreadable token: steal it.
                        fs::remove_file(&token_path).ok();
                        self.acquire(repo_root, worktree_path)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Non-mutating probe: is this worktree free to acquire?
    pub fn is_available(&self, repo_root: &Path, worktree_path: &Path) -> bool {
        let token_path = self.token_path(repo_root, worktree_path);
        match read_token(&token_path) {
            Some(token) => !token_is_live(&token),
            None => true,
        }
    }

    /// Remove the token regardless of ownership. Removing a non-existent token
    /// is success.
    pub fn force_unlock(&self, repo_root: &Path, worktree_path: &Path) -> io::Result<()> {
        let token_path = self.token_path(repo_root, worktree_path);
        match fs::remove_file(token_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Idempotent release: removes the token only if still owned by this process.
    pub fn release(&self, lock: &WorktreeLock) -> io::Result<()> {
        match read_token(&lock.token_path) {
            Some(token) if token.pid == lock.owner_pid => {
                match fs::remove_file(&lock.token_path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e),
                }
            }
            _ => Ok(()),
        }
    }

    /// List worktree paths currently held for a repo (live tokens only).
    pub fn held_worktrees(&self, repo_root: &Path) -> Vec<PathBuf> {
        let dir = self.repo_dir(repo_root);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| read_token(&e.path()))
            .filter(token_is_live)
            .map(|t| t.worktree_path)
            .collect()
    }
}

fn read_token(path: &Path) -> Option<Token> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn token_is_live(token: &Token) -> bool {
    if !pid_is_alive(token.pid) {
        return false;
    }
    let acquired = UNIX_EPOCH + Duration::from_secs(token.acquired_at_unix);
    let age = SystemTime::now()
        .duration_since(acquired)
        .unwrap_or_default();
    age < STALE_AFTER
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    // Signal 0 performs no-op existence/permission check without killing anything.
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    // No portable liveness check; fall back to staleness horizon only.
    true
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Deterministic, filesystem-safe fingerprint of a path for token naming.
fn fingerprint(path: &Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest[..12].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_busy_then_release() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::at(dir.path());
        let repo = PathBuf::from("/repo");
        let wt = PathBuf::from("/repo.wt/wt.1");

        assert!(mgr.is_available(&repo, &wt));
        let lock = mgr.acquire(&repo, &wt).unwrap().unwrap();
        assert!(!mgr.is_available(&repo, &wt));

        // A second acquire from the same process (same PID) is still "busy"
        // from a different handle's perspective.
        let busy = mgr.acquire(&repo, &wt).unwrap();
        assert!(busy.is_err());

        mgr.release(&lock).unwrap();
        assert!(mgr.is_available(&repo, &wt));
    }

    #[test]
    fn force_unlock_removes_regardless_of_owner() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::at(dir.path());
        let repo = PathBuf::from("/repo");
        let wt = PathBuf::from("/repo.wt/wt.1");

        mgr.acquire(&repo, &wt).unwrap().unwrap();
        mgr.force_unlock(&repo, &wt).unwrap();
        assert!(mgr.is_available(&repo, &wt));
    }

    #[test]
    fn force_unlock_of_missing_token_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::at(dir.path());
        let repo = PathBuf::from("/repo");
        let wt = PathBuf::from("/repo.wt/wt.99");
        assert!(mgr.force_unlock(&repo, &wt).is_ok());
    }

    #[test]
    fn stale_token_is_stolen() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::at(dir.path());
        let repo = PathBuf::from("/repo");
        let wt = PathBuf::from("/repo.wt/wt.1");

        // Write a token naming a PID that (almost certainly) doesn't exist.
        let dead_token = Token {
            pid: u32::MAX - 1,
            hostname: "somewhere".into(),
            acquired_at_unix: 0,
            worktree_path: wt.clone(),
        };
        let dir_path = mgr.repo_dir(&repo);
        fs::create_dir_all(&dir_path).unwrap();
        fs::write(
            mgr.token_path(&repo, &wt),
            serde_json::to_vec(&dead_token).unwrap(),
        )
        .unwrap();

        assert!(mgr.is_available(&repo, &wt));
        assert!(mgr.acquire(&repo, &wt).unwrap().is_ok());
    }

    #[test]
    fn held_worktrees_lists_live_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::at(dir.path());
        let repo = PathBuf::from("/repo");
        let wt1 = PathBuf::from("/repo.wt/wt.1");
        let wt2 = PathBuf::from("/repo.wt/wt.2");

        mgr.acquire(&repo, &wt1).unwrap().unwrap();
        mgr.acquire(&repo, &wt2).unwrap().unwrap();

        let mut held = mgr.held_worktrees(&repo);
        held.sort();
        assert_eq!(held, vec![wt1, wt2]);
    }
}

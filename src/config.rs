//! User configuration and logging setup.
//!
//! wtx reads an optional `config.toml` from the platform config directory
//! (same resolution order the upstream tooling uses: `$XDG_CONFIG_HOME`,
//! then `$HOME/.config`, then `etcetera`'s platform default).

use std::path::PathBuf;
use std::time::Duration;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::Deserialize;

/// Default staleness horizon for lock tokens (see the Lock Manager's
/// design notes on reaping abandoned tokens). Recommended default: 24h.
const DEFAULT_LOCK_STALE_AFTER_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Age, in seconds, after which an unreachable lock token is considered
    /// abandoned and may be stolen even if its PID cannot be confirmed dead.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_stale_after_secs() -> u64 {
    DEFAULT_LOCK_STALE_AFTER_SECS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: DEFAULT_LOCK_STALE_AFTER_SECS,
        }
    }
}

impl LockConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Resolve `<config-dir>/wtx/config.toml`, honoring `$XDG_CONFIG_HOME` /
/// `$HOME` before falling back to `etcetera`'s platform default.
pub fn user_config_path() -> Option<PathBuf> {
    resolve_user_config_path(
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        std::env::var("HOME").ok().as_deref(),
    )
    .or_else(|| {
        let strategy = choose_base_strategy().ok()?;
        Some(strategy.config_dir().join("wtx").join("config.toml"))
    })
}

fn resolve_user_config_path(xdg_config_home: Option<&str>, home: Option<&str>) -> Option<PathBuf> {
    if let Some(xdg_config) = xdg_config_home {
        return Some(PathBuf::from(xdg_config).join("wtx").join("config.toml"));
    }
    if let Some(home) = home {
        return Some(PathBuf::from(home).join(".config").join("wtx").join("config.toml"));
    }
    None
}

impl Config {
    /// Load from the platform config path, falling back to defaults if the
    /// file is absent. Parse errors are propagated so a malformed config
    /// doesn't silently fall back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = user_config_path() else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Initialize `env_logger` with wtx's conventions: `WTX_LOG` overrides the
/// default filter, which otherwise only shows warnings and above so the
/// terminal UI isn't clobbered by chatty `debug!` output from git/gh calls.
///
/// Only available with the `cli` feature — library consumers that embed
/// wtx's components should set up their own logging.
#[cfg(feature = "cli")]
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter("WTX_LOG").default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}

//! Centralized path definitions for per-user bridge files and directories.
//!
//! This module is the single source of truth for leaf filenames, directory names,
//! and path-building functions. No other module should hard-code these strings.
//!
//! Functions accept `&Path` so tests can point them at a scratch directory.

use std::path::{Path, PathBuf};

use crate::error::BridgeError;

// ── Application identity ─────────────────────────────────────────

/// Per-user root directory name, created under the home directory.
pub const APP_DIR: &str = ".editor-bridge";

/// Environment variable that replaces the per-user root entirely.
pub const HOME_ENV: &str = "EDITOR_BRIDGE_HOME";

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "settings.json";
pub const DISCOVERY_FILE_PREFIX: &str = "port-";
pub const DISCOVERY_FILE_EXT: &str = "json";

// ── Directory names ──────────────────────────────────────────────

pub const DISCOVERY_DIR: &str = "instances";

// ── Root resolution ──────────────────────────────────────────────

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Resolve the per-user bridge root: `$EDITOR_BRIDGE_HOME`, else `~/.editor-bridge`.
pub fn bridge_home() -> Result<PathBuf, BridgeError> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    home_dir()
        .map(|home| home.join(APP_DIR))
        .ok_or(BridgeError::NoHomeDirectory)
}

// ── Root-relative functions (take bridge_home) ───────────────────

pub fn settings_path(bridge_home: &Path) -> PathBuf {
    bridge_home.join(SETTINGS_FILE)
}

pub fn discovery_dir(bridge_home: &Path) -> PathBuf {
    bridge_home.join(DISCOVERY_DIR)
}

// ── Discovery files (take discovery_dir) ─────────────────────────

pub fn discovery_file_name(key: &str) -> String {
    format!("{DISCOVERY_FILE_PREFIX}{key}.{DISCOVERY_FILE_EXT}")
}

pub fn discovery_file(discovery_dir: &Path, key: &str) -> PathBuf {
    discovery_dir.join(discovery_file_name(key))
}

/// True if `path` looks like a discovery file (`port-<anything>.json`).
pub fn is_discovery_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(DISCOVERY_FILE_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(DISCOVERY_FILE_EXT)
}

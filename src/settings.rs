use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::storage::{read_json, write_json};

const SETTINGS_VERSION: u32 = 1;

/// Default bound on how long a mutating command waits for a host compile.
pub const DEFAULT_COMPILE_WAIT_TIMEOUT_MS: u64 = 120_000;
/// Default poll interval for compilation signals that cannot notify.
pub const DEFAULT_COMPILE_POLL_INTERVAL_MS: u64 = 25;

/// Bridge settings stored in the per-user bridge directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    pub version: u32,
    /// Overrides `<bridge_home>/instances` as the discovery directory.
    #[serde(default)]
    pub discovery_dir: Option<PathBuf>,
    #[serde(default = "default_compile_wait_timeout_ms")]
    pub compile_wait_timeout_ms: u64,
    #[serde(default = "default_compile_poll_interval_ms")]
    pub compile_poll_interval_ms: u64,
}

fn default_compile_wait_timeout_ms() -> u64 {
    DEFAULT_COMPILE_WAIT_TIMEOUT_MS
}

fn default_compile_poll_interval_ms() -> u64 {
    DEFAULT_COMPILE_POLL_INTERVAL_MS
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            discovery_dir: None,
            compile_wait_timeout_ms: DEFAULT_COMPILE_WAIT_TIMEOUT_MS,
            compile_poll_interval_ms: DEFAULT_COMPILE_POLL_INTERVAL_MS,
        }
    }
}

impl BridgeSettings {
    pub fn compile_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_wait_timeout_ms)
    }

    /// Never zero, so polling loops always sleep.
    pub fn compile_poll_interval(&self) -> Duration {
        Duration::from_millis(self.compile_poll_interval_ms.max(1))
    }

    /// Discovery directory: the override if set, else `<bridge_home>/instances`.
    pub fn discovery_dir(&self, bridge_home: &Path) -> PathBuf {
        self.discovery_dir
            .clone()
            .unwrap_or_else(|| crate::paths::discovery_dir(bridge_home))
    }
}

/// Load settings from the bridge directory. Returns None if no settings file
/// exists or it cannot be parsed.
pub fn load_settings(bridge_home: &Path) -> Option<BridgeSettings> {
    let path = crate::paths::settings_path(bridge_home);
    if !path.exists() {
        return None;
    }
    match read_json::<BridgeSettings>(&path) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Ignoring unreadable settings: {e}");
            None
        }
    }
}

/// Save settings to the bridge directory.
pub fn save_settings(bridge_home: &Path, settings: &BridgeSettings) -> Result<(), BridgeError> {
    std::fs::create_dir_all(bridge_home)?;
    write_json(&crate::paths::settings_path(bridge_home), settings)
}

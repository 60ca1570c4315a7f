use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::key::derive_key;
use super::process::{ProcessProbe, SystemProbe};
use super::record::{DiscoveryRecord, RecordFields};
use crate::error::BridgeError;
use crate::paths;
use crate::storage::{remove_if_exists, write_json};

/// Filesystem rendezvous between one owning server per project and any
/// number of clients looking for its port.
///
/// Writers replace files atomically; readers never trust a file's presence
/// and re-check the owner's pid on every read.
#[derive(Clone)]
pub struct DiscoveryStore {
    dir: PathBuf,
    probe: Arc<dyn ProcessProbe>,
}

impl std::fmt::Debug for DiscoveryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryStore").field("dir", &self.dir).finish_non_exhaustive()
    }
}

/// One discovery file as seen by [`DiscoveryStore::list`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEntry {
    pub file: PathBuf,
    pub port: Option<u16>,
    pub pid: Option<u32>,
    pub project_path: Option<String>,
    pub alive: bool,
}

impl DiscoveryStore {
    /// Store rooted at `dir`, using the operating system for liveness checks.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_probe(dir, Arc::new(SystemProbe))
    }

    pub fn with_probe(dir: impl Into<PathBuf>, probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            dir: dir.into(),
            probe,
        }
    }

    /// Store at the per-user default location (`~/.editor-bridge/instances`).
    pub fn for_user() -> Result<Self, BridgeError> {
        let home = paths::bridge_home()?;
        Ok(Self::new(paths::discovery_dir(&home)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the discovery file for a project, whether or not it exists.
    pub fn file_path_for(&self, project_path: &str) -> PathBuf {
        paths::discovery_file(&self.dir, &derive_key(project_path))
    }

    /// Atomically persist `record` as the discovery file for `project_path`,
    /// replacing any previous record. Returns the file written.
    pub fn write(&self, project_path: &str, record: &DiscoveryRecord) -> Result<PathBuf, BridgeError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.file_path_for(project_path);
        write_json(&path, record)?;
        debug!(path = %path.display(), port = record.port, pid = record.pid, "Wrote discovery record");
        Ok(path)
    }

    /// Announce the calling process as the server for `project_path`.
    ///
    /// The returned guard removes the record when dropped, unless another
    /// process has taken the file over in the meantime.
    pub fn register(&self, project_path: &str, port: u16) -> Result<Registration, BridgeError> {
        let record = DiscoveryRecord::new(project_path, port, std::process::id());
        let path = self.write(project_path, &record)?;
        info!(project = project_path, port, path = %path.display(), "Registered discovery record");
        Ok(Registration {
            path,
            pid: record.pid,
            port,
            released: false,
        })
    }

    /// Port of the live server recorded in `file`, or `None`.
    ///
    /// Missing, unparseable, and port-less files read as "no server". A record
    /// whose pid is absent or not running is stale: the file is deleted on a
    /// best-effort basis and `None` is returned.
    pub fn read_valid_port(&self, file: &Path) -> Option<u16> {
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %file.display(), "Unreadable discovery record: {e}");
                return None;
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                debug!(path = %file.display(), "Malformed discovery record: {e}");
                return None;
            }
        };

        let fields = RecordFields::from_json(&value);
        let port = fields.port?;
        if fields.pid.is_some_and(|pid| self.probe.is_alive(pid)) {
            return Some(port);
        }

        discard_stale(file, &text, fields.pid);
        None
    }

    /// Port of the live server for `project_path`, or `None`.
    pub fn discover(&self, project_path: &str) -> Option<u16> {
        self.read_valid_port(&self.file_path_for(project_path))
    }

    /// Delete the discovery file for `project_path` regardless of owner.
    /// Returns whether a file was removed.
    pub fn remove(&self, project_path: &str) -> bool {
        let path = self.file_path_for(project_path);
        match remove_if_exists(&path) {
            Ok(removed) => {
                if removed {
                    info!(project = project_path, path = %path.display(), "Removed discovery record");
                }
                removed
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to remove discovery record: {e}");
                false
            }
        }
    }

    /// Every discovery file in the store with its current liveness.
    /// Never deletes anything; an unreadable directory lists as empty.
    pub fn list(&self) -> Vec<DiscoveryEntry> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut entries: Vec<DiscoveryEntry> = read_dir
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| paths::is_discovery_file(p))
            .map(|file| self.inspect(file))
            .collect();
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        entries
    }

    /// Delete every record that does not belong to a live process, including
    /// files that cannot be parsed. Returns how many files were removed.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        for entry in self.list().into_iter().filter(|e| !e.alive) {
            match remove_if_exists(&entry.file) {
                Ok(true) => {
                    debug!(path = %entry.file.display(), pid = ?entry.pid, "Pruned discovery record");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(path = %entry.file.display(), "Failed to prune discovery record: {e}"),
            }
        }
        removed
    }

    fn inspect(&self, file: PathBuf) -> DiscoveryEntry {
        let value = fs::read_to_string(&file)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok());
        let fields = value
            .as_ref()
            .map_or(RecordFields { port: None, pid: None }, RecordFields::from_json);
        let project_path = value
            .as_ref()
            .and_then(|v| v.get("projectPath"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let alive = fields.port.is_some() && fields.pid.is_some_and(|pid| self.probe.is_alive(pid));
        DiscoveryEntry {
            file,
            port: fields.port,
            pid: fields.pid,
            project_path,
            alive,
        }
    }
}

/// Delete a stale record, unless a new owner has replaced it since it was read.
fn discard_stale(file: &Path, seen: &str, pid: Option<u32>) {
    match fs::read_to_string(file) {
        Ok(current) if current == seen => {}
        Ok(_) => {
            debug!(path = %file.display(), ?pid, "Discovery record replaced while checking; leaving it");
            return;
        }
        Err(_) => return,
    }
    match remove_if_exists(file) {
        Ok(true) => debug!(path = %file.display(), ?pid, "Removed stale discovery record"),
        Ok(false) => {}
        Err(e) => warn!(path = %file.display(), ?pid, "Failed to remove stale discovery record: {e}"),
    }
}

/// Ownership of a discovery record written by this process.
///
/// Dropping it (or calling [`Registration::release`]) deletes the file only
/// if it still names this process's pid.
#[derive(Debug)]
pub struct Registration {
    path: PathBuf,
    pid: u32,
    port: u16,
    released: bool,
}

impl Registration {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Remove the record now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let owner = fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            .and_then(|value| RecordFields::from_json(&value).pid);
        if owner != Some(self.pid) {
            debug!(path = %self.path.display(), ?owner, "Discovery record no longer ours; leaving it");
            return;
        }
        match remove_if_exists(&self.path) {
            Ok(_) => info!(path = %self.path.display(), "Released discovery record"),
            Err(e) => warn!(path = %self.path.display(), "Failed to release discovery record: {e}"),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release_inner();
    }
}

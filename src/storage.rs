//! Atomic JSON file storage shared by the discovery store and settings.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::BridgeError;

/// Per-file mutex map to serialize concurrent writes to the same path.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Atomically write bytes to a file using write-to-temp-then-rename.
///
/// 1. Acquires a per-file mutex to serialize writers inside this process
/// 2. Writes data to a uniquely named temporary file in the same directory
/// 3. Calls `fsync` to flush to disk
/// 4. Renames the temporary file over the target path
///
/// A concurrent reader sees either the old file or the new one, never a
/// partial write. Writers in other processes get their own temporary file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), BridgeError> {
    let lock = {
        let mut locks = FILE_LOCKS.lock();
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    };
    let _guard = lock.lock();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;

    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BridgeError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, BridgeError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

/// Delete a file, ignoring "already gone". Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        // No temporary files left behind next to the target
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path() != path)
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_fails_when_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("record.json");
        assert!(matches!(atomic_write(&path, b"x"), Err(BridgeError::Io(_))));
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.json");
        write_json(&path, &serde_json::json!({ "port": 6400 })).unwrap();
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value["port"], 6400);
    }

    // Windows refuses to rename over a file another thread has open
    #[cfg(unix)]
    #[test]
    fn readers_never_see_a_partial_write() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let path = path.clone();
            let done = done.clone();
            thread::spawn(move || {
                for i in 0..300 {
                    // Alternate sizes so a torn write would show up as truncated JSON
                    let padding = "x".repeat(if i % 2 == 0 { 16 } else { 64 * 1024 });
                    write_json(&path, &serde_json::json!({ "port": 7000 + i, "padding": padding })).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut reads = 0;
        while !done.load(Ordering::SeqCst) {
            match fs::read_to_string(&path) {
                Ok(text) => {
                    let value: serde_json::Value = serde_json::from_str(&text)
                        .unwrap_or_else(|e| panic!("partial record observed after {reads} reads: {e}"));
                    assert!(value["port"].is_u64());
                    reads += 1;
                }
                Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            }
        }
        writer.join().unwrap();
        assert_eq!(read_json::<serde_json::Value>(&path).unwrap()["port"], 7299);
    }

    #[test]
    fn remove_if_exists_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.json");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "{}").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}

//! Filesystem-based process discovery.
//!
//! A server announces `{port, projectPath, pid, timestamp}` in a per-user
//! directory under a file named from the project's discovery key. Clients
//! derive the same key, read the file, and trust it only while the recorded
//! pid is alive.

pub mod key;
pub mod process;
pub mod record;
pub mod store;

pub use key::{derive_key, normalize_project_path, KEY_LEN};
pub use process::{ProcessProbe, SystemProbe};
pub use record::DiscoveryRecord;
pub use store::{DiscoveryEntry, DiscoveryStore, Registration};

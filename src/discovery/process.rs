//! Process liveness probing for stale discovery records.

#[cfg(windows)]
use std::process::{Command, Stdio};

/// Answers "is this pid a running process right now?".
///
/// The discovery store asks on every read and never caches the answer.
/// Anything that cannot be confirmed alive must report `false`.
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Liveness check backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        // pid 0 and values that wrap negative address process groups, not a process
        if pid == 0 || i32::try_from(pid).is_err() {
            return false;
        }
        if pid == std::process::id() {
            return true;
        }
        os_is_alive(pid)
    }
}

/// Signal 0 checks existence without delivering anything. EPERM means the
/// process exists under another uid, so it counts as alive.
#[cfg(unix)]
fn os_is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(windows)]
fn os_is_alive(pid: u32) -> bool {
    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"])
        .stderr(Stdio::null())
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let needle = format!("\"{pid}\"");
            String::from_utf8_lossy(&out.stdout).contains(&needle)
        }
        _ => false,
    }
}

#[cfg(not(any(unix, windows)))]
fn os_is_alive(_pid: u32) -> bool {
    false
}

//! Host compilation signal and the gate mutating commands wait on.
//!
//! Structural edits must not race a recompile that would invalidate object
//! references, so mutating operations wait here first. The wait is always
//! bounded and can be cancelled; a build that hangs fails the command rather
//! than the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::settings::BridgeSettings;

/// Poll interval for signals that cannot notify waiters.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared cancellation flag for a pending command.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Not compiling (any more). `waited` is zero when no wait was needed.
    Idle { waited: Duration },
    TimedOut,
    Cancelled,
}

/// What the host exposes about its background build.
pub trait CompilationSignal: Send + Sync {
    /// True while a build is in progress.
    fn is_compiling(&self) -> bool;

    /// Number of builds finished so far. A change means "compilation just completed".
    fn completed_builds(&self) -> u64;

    /// Block until not compiling, the timeout elapses, or `cancel` is set.
    fn wait_until_idle(&self, timeout: Duration, cancel: &CancelFlag) -> GateOutcome {
        let start = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return GateOutcome::Cancelled;
            }
            if !self.is_compiling() {
                return GateOutcome::Idle {
                    waited: start.elapsed(),
                };
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return GateOutcome::TimedOut;
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }
}

/// Signal for hosts without a build step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCompiling;

impl CompilationSignal for NeverCompiling {
    fn is_compiling(&self) -> bool {
        false
    }

    fn completed_builds(&self) -> u64 {
        0
    }
}

#[derive(Debug, Default)]
struct BuildState {
    compiling: bool,
    completed: u64,
}

/// Host-driven compilation signal. The editor calls [`begin`](Self::begin)
/// and [`finish`](Self::finish) around each build; waiters wake on `finish`.
#[derive(Debug, Default)]
pub struct CompilationMonitor {
    state: Mutex<BuildState>,
    changed: Condvar,
    poll_interval: Option<Duration>,
}

impl CompilationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often waiters re-check their cancel flag while blocked.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval: Some(poll_interval.max(Duration::from_millis(1))),
            ..Self::default()
        }
    }

    /// Monitor using the configured `compile_poll_interval_ms`.
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self::with_poll_interval(settings.compile_poll_interval())
    }

    pub fn begin(&self) {
        self.state.lock().compiling = true;
        tracing::debug!("Host compilation started");
    }

    pub fn finish(&self) {
        {
            let mut state = self.state.lock();
            if state.compiling {
                state.compiling = false;
                state.completed += 1;
            }
        }
        self.changed.notify_all();
        tracing::debug!("Host compilation finished");
    }
}

impl CompilationSignal for CompilationMonitor {
    fn is_compiling(&self) -> bool {
        self.state.lock().compiling
    }

    fn completed_builds(&self) -> u64 {
        self.state.lock().completed
    }

    fn wait_until_idle(&self, timeout: Duration, cancel: &CancelFlag) -> GateOutcome {
        let start = Instant::now();
        let slice = self.poll_interval.unwrap_or(POLL_INTERVAL);
        let mut state = self.state.lock();
        loop {
            if cancel.is_cancelled() {
                return GateOutcome::Cancelled;
            }
            if !state.compiling {
                return GateOutcome::Idle {
                    waited: start.elapsed(),
                };
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return GateOutcome::TimedOut;
            }
            self.changed.wait_for(&mut state, slice.min(timeout - elapsed));
        }
    }
}

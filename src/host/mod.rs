//! Host Execution Context
//!
//! The orchestrator never touches the platform directly: scratch
//! directories, executable locations, and process launching all go through
//! this seam so the host can account for device-lock state and its own
//! process supervision.

use crate::Result;
use anyhow::Context;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Handle to a launched backend process.
///
/// Launches are fire-and-forget: nobody waits for backend readiness, the
/// embedded engine's own dial retries cover a slow upstream.
pub struct ProcessHandle {
    argv: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl ProcessHandle {
    pub fn new(argv: Vec<String>, child: Child) -> Self {
        Self {
            argv,
            child: Mutex::new(Some(child)),
        }
    }

    /// Handle for a launch the host tracks elsewhere (tests, embedded hosts).
    pub fn detached(argv: Vec<String>) -> Self {
        Self {
            argv,
            child: Mutex::new(None),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Best-effort kill; the process may already be gone.
    pub fn terminate(&self) {
        let mut guard = match self.child.lock() {
            Ok(g) => g,
            Err(_) => return,
        };
        if let Some(child) = guard.as_mut() {
            if let Err(e) = child.start_kill() {
                debug!(argv = ?self.argv, error = %e, "Backend process already finished");
            }
        }
        *guard = None;
    }
}

/// Platform services consumed by the supervisor.
pub trait HostContext: Send + Sync {
    /// Writable scratch directory valid for the current device-lock state.
    fn scratch_dir(&self) -> Result<PathBuf>;

    /// Absolute path of a bundled backend executable.
    fn executable(&self, name: &str) -> PathBuf;

    /// Launch an external process with the given argv.
    fn launch(&self, argv: Vec<String>) -> Result<ProcessHandle>;
}

/// Host context backed by the local system.
pub struct SystemHost {
    executable_dir: PathBuf,
    unlocked_dir: PathBuf,
    /// Device-protected area used while the primary storage is locked.
    locked_dir: PathBuf,
    locked: bool,
}

impl SystemHost {
    pub fn new(
        executable_dir: impl Into<PathBuf>,
        unlocked_dir: impl Into<PathBuf>,
        locked_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable_dir: executable_dir.into(),
            unlocked_dir: unlocked_dir.into(),
            locked_dir: locked_dir.into(),
            locked: false,
        }
    }

    pub fn with_locked_state(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}

impl HostContext for SystemHost {
    fn scratch_dir(&self) -> Result<PathBuf> {
        let dir = if self.locked {
            self.locked_dir.clone()
        } else {
            self.unlocked_dir.clone()
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create scratch directory: {}", dir.display()))?;
        Ok(dir)
    }

    fn executable(&self, name: &str) -> PathBuf {
        self.executable_dir.join(name)
    }

    fn launch(&self, argv: Vec<String>) -> Result<ProcessHandle> {
        let (program, args) = argv
            .split_first()
            .context("Cannot launch an empty command line")?;

        info!(program = %program, args = ?args, "Launching backend process");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch backend: {}", program))?;

        if let Some(pid) = child.id() {
            debug!(program = %program, pid = pid, "Backend process spawned");
        } else {
            warn!(program = %program, "Backend process exited before PID was read");
        }

        Ok(ProcessHandle::new(argv, child))
    }
}

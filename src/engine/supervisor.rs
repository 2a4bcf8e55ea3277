//! Engine Process Supervisor
//!
//! Serializes backend config documents into uniquely named artifact files
//! and launches the matching backend executable. Every artifact written
//! here is tracked until `cleanup()` removes it; no artifact outlives the
//! owning instance.

use crate::host::{HostContext, ProcessHandle};
use crate::Result;
use anyhow::Context;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Supervises local backend processes and their config artifacts.
pub struct Supervisor {
    host: Arc<dyn HostContext>,
    cache_files: Vec<PathBuf>,
    processes: Vec<ProcessHandle>,
}

impl Supervisor {
    pub fn new(host: Arc<dyn HostContext>) -> Self {
        Self {
            host,
            cache_files: Vec::new(),
            processes: Vec::new(),
        }
    }

    /// Serialize a config document into a fresh artifact file.
    ///
    /// The file is flushed to stable storage before this returns, so a
    /// subsequent exec can never race the write. Filesystem failures here
    /// are fatal to `start` and abort before any launch.
    pub fn write_config(&mut self, prefix: &str, doc: &Value) -> Result<PathBuf> {
        let dir = self
            .host
            .scratch_dir()
            .context("No writable scratch directory for config artifacts")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create scratch directory: {}", dir.display()))?;

        let path = dir.join(Self::artifact_name(prefix));
        let serialized =
            serde_json::to_string(doc).context("Failed to serialize backend config")?;

        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create config artifact: {}", path.display()))?;
        file.write_all(serialized.as_bytes())
            .with_context(|| format!("Failed to write config artifact: {}", path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync config artifact: {}", path.display()))?;

        debug!(path = %path.display(), "Wrote config artifact");
        self.cache_files.push(path.clone());
        Ok(path)
    }

    /// Launch `ss-local` against a written shadowsocks config.
    pub fn launch_shadowsocks(&mut self, doc: &Value) -> Result<()> {
        let config = self.write_config("shadowsocks", doc)?;
        let argv = vec![
            self.host.executable("ss-local").to_string_lossy().into_owned(),
            "-c".to_string(),
            config.to_string_lossy().into_owned(),
        ];
        self.launch(argv)
    }

    /// Launch `ssr-local` against a written shadowsocksr config.
    pub fn launch_shadowsocksr(&mut self, doc: &Value, local_port: u16) -> Result<()> {
        let config = self.write_config("shadowsocksr", doc)?;
        let argv = vec![
            self.host.executable("ssr-local").to_string_lossy().into_owned(),
            "-b".to_string(),
            "127.0.0.1".to_string(),
            "-c".to_string(),
            config.to_string_lossy().into_owned(),
            "-l".to_string(),
            local_port.to_string(),
        ];
        self.launch(argv)
    }

    /// Launch the resolved xray binary against a written process config.
    pub fn launch_xray(&mut self, binary: &Path, doc: &Value) -> Result<()> {
        let config = self.write_config("xray", doc)?;
        let argv = vec![
            binary.to_string_lossy().into_owned(),
            "-c".to_string(),
            config.to_string_lossy().into_owned(),
        ];
        self.launch(argv)
    }

    fn launch(&mut self, argv: Vec<String>) -> Result<()> {
        let handle = self
            .host
            .launch(argv)
            .context("Backend process launch failed")?;
        self.processes.push(handle);
        Ok(())
    }

    /// Best-effort termination of every launched backend process.
    pub fn stop_processes(&mut self) {
        for handle in self.processes.drain(..) {
            handle.terminate();
        }
    }

    /// Delete every tracked artifact. Deletion failures are swallowed;
    /// the set is drained either way, so a second call is a no-op.
    pub fn cleanup(&mut self) {
        for path in self.cache_files.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed config artifact"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not remove config artifact")
                }
            }
        }
        info!("Config artifact cleanup complete");
    }

    /// Number of artifacts currently tracked.
    pub fn artifact_count(&self) -> usize {
        self.cache_files.len()
    }

    /// Paths of the tracked artifacts.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.cache_files
    }

    fn artifact_name(prefix: &str) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}.json", prefix, millis, seq)
    }
}

//! Proxy Instance
//!
//! The orchestrator: composes the config builder, process supervisor,
//! embedded engine, stats accumulator, and persistence reconciler into one
//! `init -> start -> stop -> shutdown` lifecycle.

use crate::config::{self, BuiltConfig, ConfigAssembler, Settings};
use crate::engine::{Direction, EmbeddedEngine, ForwarderTask, ForwarderView, Supervisor};
use crate::host::HostContext;
use crate::persist::{DeviceStore, ProfileStore, StatsPersister};
use crate::plugin::PluginResolver;
use crate::profile::{BackendKind, Profile};
use crate::stats::TrafficStats;
use crate::Result;
use anyhow::{bail, Context};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Lifecycle states of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
    Terminal,
}

/// External collaborators one instance is wired with.
pub struct Collaborators {
    pub host: Arc<dyn HostContext>,
    pub plugins: Arc<dyn PluginResolver>,
    pub assembler: Arc<dyn ConfigAssembler>,
    pub profile_store: Arc<dyn ProfileStore>,
    pub device_store: Arc<dyn DeviceStore>,
    pub engine: Box<dyn EmbeddedEngine>,
    /// Present only on hosts that provide the WebView workaround.
    pub forwarder_view: Option<Arc<dyn ForwarderView>>,
}

/// One running proxy session for one profile.
///
/// The artifact set and the running totals are owned exclusively by this
/// instance; lifecycle calls must be serialized by the caller, while stats
/// sampling may race a transition and reads 0 when the engine is gone.
pub struct ProxyInstance {
    profile: Profile,
    settings: Settings,
    state: LifecycleState,
    built: Option<BuiltConfig>,
    engine: Arc<Mutex<Option<Box<dyn EmbeddedEngine>>>>,
    supervisor: Supervisor,
    stats: TrafficStats,
    persister: StatsPersister,
    forwarder_view: Option<Arc<dyn ForwarderView>>,
    forwarder: Option<ForwarderTask>,
    plugins: Arc<dyn PluginResolver>,
    assembler: Arc<dyn ConfigAssembler>,
}

impl ProxyInstance {
    pub fn new(profile: Profile, settings: Settings, collaborators: Collaborators) -> Self {
        let persister = StatsPersister::new(
            collaborators.profile_store,
            collaborators.device_store,
            settings.locked_storage_tolerant,
        );
        Self {
            profile,
            settings,
            state: LifecycleState::Uninitialized,
            built: None,
            engine: Arc::new(Mutex::new(Some(collaborators.engine))),
            supervisor: Supervisor::new(collaborators.host),
            stats: TrafficStats::new(),
            persister,
            forwarder_view: collaborators.forwarder_view,
            forwarder: None,
            plugins: collaborators.plugins,
            assembler: collaborators.assembler,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Select the backend kind, build the session configs, and prepare the
    /// embedded engine. Config errors are fatal here, before anything is
    /// launched.
    pub fn init(&mut self) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            bail!("init is only valid on a fresh instance (state: {:?})", self.state);
        }

        let built = config::build(
            &self.profile,
            &self.settings,
            self.plugins.as_ref(),
            self.assembler.as_ref(),
        )
        .context("Failed to build session config")?;

        let engine_config = serde_json::to_string(&built.engine_doc)
            .context("Failed to serialize embedded engine config")?;

        {
            let mut guard = self.engine.lock().expect("engine lock poisoned");
            let engine = guard
                .as_mut()
                .context("Embedded engine handle is missing")?;
            engine.set_target(&built.engine_target);
            engine.set_config(engine_config);
        }

        info!(
            profile = %self.profile.name,
            kind = ?built.kind,
            target = %built.engine_target,
            "Instance initialized"
        );
        self.built = Some(built);
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Launch the local backend (if any), start the embedded engine's run
    /// loop, and spin up the browser forwarder without blocking on it.
    ///
    /// On failure the instance stays cleanly stoppable: whatever artifacts
    /// were written remain tracked for `shutdown` to delete.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Initialized {
            bail!("start is only valid from Initialized (state: {:?})", self.state);
        }
        let built = self.built.as_ref().context("Missing built config")?;

        match built.kind {
            BackendKind::ExternalShadowsocks => {
                let doc = built.backend_doc.clone().context("Missing backend config")?;
                self.supervisor.launch_shadowsocks(&doc)?;
            }
            BackendKind::ShadowsocksR => {
                let doc = built.backend_doc.clone().context("Missing backend config")?;
                self.supervisor
                    .launch_shadowsocksr(&doc, self.settings.local_backend_port())?;
            }
            BackendKind::Xray => {
                let doc = built.backend_doc.clone().context("Missing backend config")?;
                let binary = built
                    .xray_binary
                    .clone()
                    .context("Missing xray binary path")?;
                self.supervisor.launch_xray(&binary, &doc)?;
            }
            BackendKind::DirectV2ray => {}
        }

        {
            let mut guard = self.engine.lock().expect("engine lock poisoned");
            let engine = guard
                .as_mut()
                .context("Embedded engine handle is missing")?;
            engine
                .run_loop(self.settings.prefer_ipv6)
                .context("Embedded engine run loop failed to start")?;
        }

        if self.profile.wants_browser_forwarder() {
            if let Some(view) = &self.forwarder_view {
                let url = format!("http://127.0.0.1:{}/", self.settings.forwarder_port());
                self.forwarder = Some(ForwarderTask::spawn(
                    Arc::clone(view),
                    url,
                    self.settings.forwarder_retry_initial,
                    self.settings.forwarder_retry_max,
                ));
            } else {
                warn!("Profile wants the browser forwarder but the host provides no view");
            }
        }

        info!(profile = %self.profile.name, "Instance running");
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Halt the embedded run loop and tear down the forwarder.
    ///
    /// Valid after a failed `start` as well; loop-stop failures are logged
    /// and never skip the rest of the teardown.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == LifecycleState::Terminal {
            bail!("stop called on a terminal instance");
        }

        {
            let mut guard = self.engine.lock().expect("engine lock poisoned");
            if let Some(engine) = guard.as_mut() {
                if let Err(e) = engine.stop_loop() {
                    error!(error = %e, "Embedded engine stop failed");
                }
            }
        }

        if let Some(forwarder) = self.forwarder.take() {
            forwarder.stop();
        }

        self.supervisor.stop_processes();

        debug!(profile = %self.profile.name, "Instance stopped");
        self.state = LifecycleState::Stopped;
        Ok(())
    }

    /// Persist final totals and delete every tracked artifact.
    ///
    /// Artifact deletion happens unconditionally, even when persistence
    /// fails; the persistence error is surfaced afterwards. Idempotent: a
    /// second call is a no-op.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == LifecycleState::Terminal {
            return Ok(());
        }

        let persist_result = self.persist_stats();

        self.supervisor.cleanup();
        self.engine.lock().expect("engine lock poisoned").take();
        self.state = LifecycleState::Terminal;

        info!(profile = %self.profile.name, "Instance shut down");
        persist_result
    }

    /// Sample the engine's uplink counter, accumulating into the total.
    ///
    /// Safe in any state: without a live engine handle the sample is 0.
    pub fn uplink(&self) -> u64 {
        self.sample(Direction::Uplink)
    }

    /// Sample the engine's downlink counter, accumulating into the total.
    pub fn downlink(&self) -> u64 {
        self.sample(Direction::Downlink)
    }

    pub fn uplink_total(&self) -> u64 {
        self.stats.uplink_total()
    }

    pub fn downlink_total(&self) -> u64 {
        self.stats.downlink_total()
    }

    fn sample(&self, direction: Direction) -> u64 {
        let guard = match self.engine.lock() {
            Ok(guard) => guard,
            // Mid-teardown contention reads as "not initialized".
            Err(_) => return 0,
        };
        match guard.as_ref() {
            Some(engine) => {
                let sampled = engine.query_outbound(direction);
                self.stats.accumulate(direction, sampled)
            }
            None => 0,
        }
    }

    /// Reconcile everything accumulated since the last cycle into storage.
    pub fn persist_stats(&mut self) -> Result<()> {
        // Final samples so nothing in the engine counter is left behind.
        self.uplink();
        self.downlink();

        let (uplink, downlink) = self.stats.drain();
        if uplink == 0 && downlink == 0 {
            debug!(profile = %self.profile.name, "No new traffic to persist");
            return Ok(());
        }

        match self.persister.persist(&mut self.profile, uplink, downlink) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Put the totals back so a later cycle can retry them.
                self.stats.accumulate(Direction::Uplink, uplink);
                self.stats.accumulate(Direction::Downlink, downlink);
                Err(e).context("Failed to persist traffic stats")
            }
        }
    }

    /// Number of config artifacts currently tracked.
    pub fn artifact_count(&self) -> usize {
        self.supervisor.artifact_count()
    }
}

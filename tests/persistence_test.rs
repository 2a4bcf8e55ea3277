//! Tests for stats persistence through the instance, including the
//! locked-storage fallback path

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use proxyrig::config::OutboundAssembler;
use proxyrig::engine::{Direction, EmbeddedEngine};
use proxyrig::host::{HostContext, ProcessHandle};
use proxyrig::persist::{DeviceRecord, DeviceStore, ProfileStore, StoreError};
use proxyrig::plugin::{PluginResolver, ResolvedPlugin};
use proxyrig::{BackendKind, Collaborators, Profile, ProxyInstance, Settings};

struct TempHost {
    scratch: PathBuf,
}

impl HostContext for TempHost {
    fn scratch_dir(&self) -> proxyrig::Result<PathBuf> {
        Ok(self.scratch.clone())
    }

    fn executable(&self, name: &str) -> PathBuf {
        PathBuf::from("/native").join(name)
    }

    fn launch(&self, argv: Vec<String>) -> proxyrig::Result<ProcessHandle> {
        Ok(ProcessHandle::detached(argv))
    }
}

struct CountingEngine {
    uplink: Mutex<VecDeque<u64>>,
    downlink: Mutex<VecDeque<u64>>,
}

impl EmbeddedEngine for CountingEngine {
    fn set_target(&mut self, _endpoint: &str) {}

    fn set_config(&mut self, _config: String) {}

    fn run_loop(&mut self, _prefer_ipv6: bool) -> proxyrig::Result<()> {
        Ok(())
    }

    fn stop_loop(&mut self) -> proxyrig::Result<()> {
        Ok(())
    }

    fn query_outbound(&self, direction: Direction) -> u64 {
        let samples = match direction {
            Direction::Uplink => &self.uplink,
            Direction::Downlink => &self.downlink,
        };
        samples.lock().unwrap().pop_front().unwrap_or(0)
    }
}

struct NoPlugins;

impl PluginResolver for NoPlugins {
    fn resolve(&self, _spec: &str) -> proxyrig::Result<ResolvedPlugin> {
        anyhow::bail!("no plugins installed")
    }

    fn resolve_binary(&self, _name: &str) -> proxyrig::Result<PathBuf> {
        anyhow::bail!("no plugins installed")
    }
}

struct UnavailableStore;

impl ProfileStore for UnavailableStore {
    fn update_profile(&self, _profile: &Profile) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("device still locked".to_string()))
    }
}

#[derive(Default)]
struct RecordingDeviceStore {
    record: Mutex<Option<DeviceRecord>>,
    unlock_registrations: AtomicU32,
}

impl DeviceStore for RecordingDeviceStore {
    fn device_record(&self, profile_id: u64) -> Option<DeviceRecord> {
        self.record
            .lock()
            .unwrap()
            .clone()
            .filter(|r| r.profile_id == profile_id)
    }

    fn save_device_record(&self, record: &DeviceRecord) -> proxyrig::Result<()> {
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    fn listen_for_unlock(&self) {
        self.unlock_registrations.fetch_add(1, Ordering::SeqCst);
    }
}

fn direct_profile() -> Profile {
    Profile {
        id: 9,
        name: "direct".to_string(),
        kind: BackendKind::DirectV2ray,
        server_address: "9.9.9.9".to_string(),
        server_port: 443,
        method: String::new(),
        password: String::new(),
        protocol: String::new(),
        protocol_param: String::new(),
        obfs: String::new(),
        obfs_param: String::new(),
        plugin: String::new(),
        transport: Default::default(),
        tx: 0,
        rx: 0,
    }
}

fn build_instance(
    engine_uplink: Vec<u64>,
    engine_downlink: Vec<u64>,
    locked_tolerant: bool,
    device_store: Arc<RecordingDeviceStore>,
    scratch: &tempfile::TempDir,
) -> ProxyInstance {
    let settings = Settings {
        locked_storage_tolerant: locked_tolerant,
        ..Settings::default()
    };
    ProxyInstance::new(
        direct_profile(),
        settings,
        Collaborators {
            host: Arc::new(TempHost {
                scratch: scratch.path().to_path_buf(),
            }),
            plugins: Arc::new(NoPlugins),
            assembler: Arc::new(OutboundAssembler),
            profile_store: Arc::new(UnavailableStore),
            device_store,
            engine: Box::new(CountingEngine {
                uplink: Mutex::new(engine_uplink.into()),
                downlink: Mutex::new(engine_downlink.into()),
            }),
            forwarder_view: None,
        },
    )
}

#[tokio::test]
async fn test_fallback_record_written_when_tolerant() {
    let scratch = tempfile::tempdir().unwrap();
    let device = Arc::new(RecordingDeviceStore::default());
    let mut instance = build_instance(vec![500], vec![800], true, device.clone(), &scratch);

    instance.init().unwrap();
    instance.start().await.unwrap();

    instance.persist_stats().unwrap();

    let record = device.device_record(9).unwrap();
    assert_eq!(record.tx, 500);
    assert_eq!(record.rx, 800);
    assert!(record.dirty);
    assert_eq!(device.unlock_registrations.load(Ordering::SeqCst), 1);

    instance.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_hard_failure_without_tolerance() {
    let scratch = tempfile::tempdir().unwrap();
    let device = Arc::new(RecordingDeviceStore::default());
    let mut instance = build_instance(vec![500], vec![800], false, device.clone(), &scratch);

    instance.init().unwrap();
    instance.start().await.unwrap();

    assert!(instance.persist_stats().is_err());
    // Nothing leaked into the fallback area.
    assert!(device.device_record(9).is_none());

    // The totals stay accumulated so a later cycle can retry them.
    assert_eq!(instance.uplink_total(), 500);
    assert_eq!(instance.downlink_total(), 800);
}

#[tokio::test]
async fn test_shutdown_surfaces_persist_error_after_cleanup() {
    let scratch = tempfile::tempdir().unwrap();
    let device = Arc::new(RecordingDeviceStore::default());
    let mut instance = build_instance(vec![500], vec![], false, device, &scratch);

    instance.init().unwrap();
    instance.start().await.unwrap();

    let result = instance.shutdown().await;
    assert!(result.is_err());
    // Cleanup still ran: no artifacts remain tracked.
    assert_eq!(instance.artifact_count(), 0);

    // And a repeated shutdown stays quiet.
    instance.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fallback_cycles_accumulate_into_one_record() {
    let scratch = tempfile::tempdir().unwrap();
    let device = Arc::new(RecordingDeviceStore::default());
    let mut instance = build_instance(vec![100, 50], vec![10, 20], true, device.clone(), &scratch);

    instance.init().unwrap();
    instance.start().await.unwrap();

    instance.persist_stats().unwrap();
    instance.persist_stats().unwrap();

    let record = device.device_record(9).unwrap();
    assert_eq!(record.tx, 150);
    assert_eq!(record.rx, 30);
    assert!(record.dirty);

    instance.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_persist_with_no_traffic_is_a_no_op() {
    let scratch = tempfile::tempdir().unwrap();
    let device = Arc::new(RecordingDeviceStore::default());
    // Primary store is unavailable, but with zero traffic nothing is
    // written anywhere and the cycle succeeds.
    let mut instance = build_instance(vec![], vec![], false, device.clone(), &scratch);

    instance.init().unwrap();
    instance.start().await.unwrap();

    instance.persist_stats().unwrap();
    assert!(device.device_record(9).is_none());

    instance.shutdown().await.unwrap();
}

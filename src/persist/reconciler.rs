//! Stats Reconciliation

use super::{DeviceRecord, DeviceStore, ProfileStore, StoreError};
use crate::profile::Profile;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One way of writing accumulated totals to durable storage.
pub trait StatsSink: Send + Sync {
    fn persist(
        &self,
        profile: &mut Profile,
        uplink: u64,
        downlink: u64,
    ) -> Result<(), StoreError>;
}

/// Normal path: add the totals into the profile record and write through
/// the primary store.
pub struct PrimarySink {
    store: Arc<dyn ProfileStore>,
}

impl PrimarySink {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }
}

impl StatsSink for PrimarySink {
    fn persist(
        &self,
        profile: &mut Profile,
        uplink: u64,
        downlink: u64,
    ) -> Result<(), StoreError> {
        // Commit the in-memory counters only once the store accepted the
        // update, so a failed cycle can be retried without double counting.
        let mut updated = profile.clone();
        updated.tx += uplink;
        updated.rx += downlink;
        self.store.update_profile(&updated)?;
        *profile = updated;
        debug!(
            profile_id = profile.id,
            tx = profile.tx,
            rx = profile.rx,
            "Persisted traffic totals to primary store"
        );
        Ok(())
    }
}

/// Locked-storage path: add the totals into the device record, mark it
/// dirty, and arrange for reconciliation at unlock.
pub struct FallbackSink {
    store: Arc<dyn DeviceStore>,
}

impl FallbackSink {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self { store }
    }
}

impl StatsSink for FallbackSink {
    fn persist(
        &self,
        profile: &mut Profile,
        uplink: u64,
        downlink: u64,
    ) -> Result<(), StoreError> {
        let mut record = self
            .store
            .device_record(profile.id)
            .unwrap_or_else(|| DeviceRecord::from_profile(profile));
        record.tx += uplink;
        record.rx += downlink;
        record.dirty = true;
        self.store.save_device_record(&record)?;
        self.store.listen_for_unlock();
        info!(
            profile_id = profile.id,
            tx = record.tx,
            rx = record.rx,
            "Persisted traffic totals to locked-storage fallback"
        );
        Ok(())
    }
}

/// Reconciles accumulated totals into whichever store is reachable.
///
/// The primary store is always tried first; the fallback only engages on a
/// storage-unavailable failure, and only when the system is configured to
/// tolerate device-locked operation.
pub struct StatsPersister {
    primary: PrimarySink,
    fallback: FallbackSink,
    locked_tolerant: bool,
}

impl StatsPersister {
    pub fn new(
        primary: Arc<dyn ProfileStore>,
        fallback: Arc<dyn DeviceStore>,
        locked_tolerant: bool,
    ) -> Self {
        Self {
            primary: PrimarySink::new(primary),
            fallback: FallbackSink::new(fallback),
            locked_tolerant,
        }
    }

    pub fn persist(
        &self,
        profile: &mut Profile,
        uplink: u64,
        downlink: u64,
    ) -> Result<(), StoreError> {
        match self.primary.persist(profile, uplink, downlink) {
            Err(StoreError::Unavailable(reason)) if self.locked_tolerant => {
                warn!(
                    profile_id = profile.id,
                    reason = %reason,
                    "Primary store unavailable, using locked-storage fallback"
                );
                self.fallback.persist(profile, uplink, downlink)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{BackendKind, Profile, TransportOptions};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn profile() -> Profile {
        Profile {
            id: 3,
            name: "p".to_string(),
            kind: BackendKind::DirectV2ray,
            server_address: "1.2.3.4".to_string(),
            server_port: 443,
            method: String::new(),
            password: String::new(),
            protocol: String::new(),
            protocol_param: String::new(),
            obfs: String::new(),
            obfs_param: String::new(),
            plugin: String::new(),
            transport: TransportOptions::default(),
            tx: 100,
            rx: 200,
        }
    }

    struct WorkingStore {
        saved: Mutex<Option<Profile>>,
    }

    impl ProfileStore for WorkingStore {
        fn update_profile(&self, profile: &Profile) -> Result<(), StoreError> {
            *self.saved.lock().unwrap() = Some(profile.clone());
            Ok(())
        }
    }

    struct LockedStore;

    impl ProfileStore for LockedStore {
        fn update_profile(&self, _profile: &Profile) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("database is locked".to_string()))
        }
    }

    #[derive(Default)]
    struct MemoryDeviceStore {
        record: Mutex<Option<DeviceRecord>>,
        unlock_registrations: AtomicU32,
    }

    impl DeviceStore for MemoryDeviceStore {
        fn device_record(&self, profile_id: u64) -> Option<DeviceRecord> {
            self.record
                .lock()
                .unwrap()
                .clone()
                .filter(|r| r.profile_id == profile_id)
        }

        fn save_device_record(&self, record: &DeviceRecord) -> crate::Result<()> {
            *self.record.lock().unwrap() = Some(record.clone());
            Ok(())
        }

        fn listen_for_unlock(&self) {
            self.unlock_registrations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_primary_path_adds_totals() {
        let store = Arc::new(WorkingStore {
            saved: Mutex::new(None),
        });
        let persister = StatsPersister::new(
            store.clone(),
            Arc::new(MemoryDeviceStore::default()),
            false,
        );

        let mut p = profile();
        persister.persist(&mut p, 50, 70).unwrap();

        assert_eq!(p.tx, 150);
        assert_eq!(p.rx, 270);
        let saved = store.saved.lock().unwrap().clone().unwrap();
        assert_eq!(saved.tx, 150);
        assert_eq!(saved.rx, 270);
    }

    #[test]
    fn test_fallback_engages_when_tolerant() {
        let device = Arc::new(MemoryDeviceStore::default());
        let persister = StatsPersister::new(Arc::new(LockedStore), device.clone(), true);

        let mut p = profile();
        persister.persist(&mut p, 50, 70).unwrap();

        let record = device.device_record(3).unwrap();
        assert_eq!(record.tx, 150);
        assert_eq!(record.rx, 270);
        assert!(record.dirty);
        assert_eq!(device.unlock_registrations.load(Ordering::SeqCst), 1);
        // The in-memory profile is untouched until real reconciliation.
        assert_eq!(p.tx, 100);
    }

    #[test]
    fn test_fallback_accumulates_across_cycles() {
        let device = Arc::new(MemoryDeviceStore::default());
        let persister = StatsPersister::new(Arc::new(LockedStore), device.clone(), true);

        let mut p = profile();
        persister.persist(&mut p, 10, 20).unwrap();
        persister.persist(&mut p, 5, 5).unwrap();

        let record = device.device_record(3).unwrap();
        assert_eq!(record.tx, 115);
        assert_eq!(record.rx, 225);
    }

    #[test]
    fn test_unavailable_is_fatal_without_tolerance() {
        let persister = StatsPersister::new(
            Arc::new(LockedStore),
            Arc::new(MemoryDeviceStore::default()),
            false,
        );

        let mut p = profile();
        let err = persister.persist(&mut p, 50, 70).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(p.tx, 100);
    }
}

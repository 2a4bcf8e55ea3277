//! Persistence Types

use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the profile stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached in the current device state, e.g. the
    /// encrypted database before unlock.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Minimal stats duplicate kept in the locked-accessible storage area.
///
/// Created when primary persistence fails while the device is locked;
/// consumed and cleared by the unlock listener once the primary store is
/// writable again.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceRecord {
    pub profile_id: u64,
    pub tx: u64,
    pub rx: u64,
    /// Set whenever the record holds totals not yet reconciled into the
    /// primary store.
    pub dirty: bool,
}

impl DeviceRecord {
    /// Fresh record seeded from the profile's last known counters.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            profile_id: profile.id,
            tx: profile.tx,
            rx: profile.rx,
            dirty: false,
        }
    }
}

/// Primary persistent store for profile records.
pub trait ProfileStore: Send + Sync {
    fn update_profile(&self, profile: &Profile) -> Result<(), StoreError>;
}

/// Locked-storage fallback area, accessible before device unlock.
pub trait DeviceStore: Send + Sync {
    fn device_record(&self, profile_id: u64) -> Option<DeviceRecord>;

    fn save_device_record(&self, record: &DeviceRecord) -> crate::Result<()>;

    /// Register a one-shot unlock notification that will reconcile the
    /// dirty record into the primary store. Repeated registrations must
    /// collapse into one.
    fn listen_for_unlock(&self);
}

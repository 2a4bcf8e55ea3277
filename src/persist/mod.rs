//! Persistence Module
//!
//! Writes accumulated traffic totals back to the profile record, with a
//! locked-storage fallback for when the primary store is inaccessible.

pub mod reconciler;
pub mod types;

pub use reconciler::{FallbackSink, PrimarySink, StatsPersister, StatsSink};
pub use types::{DeviceRecord, DeviceStore, ProfileStore, StoreError};

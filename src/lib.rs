//! ProxyRig Library
//!
//! Local proxy-instance orchestrator: derives backend launch configuration
//! from a proxy profile, supervises the matching engine (external process
//! or embedded), accumulates traffic statistics, and reconciles them to
//! persistent storage even while the primary store is locked.

pub mod config;
pub mod engine;
pub mod host;
pub mod instance;
pub mod persist;
pub mod plugin;
pub mod profile;
pub mod stats;

pub use config::{ConfigManager, RigConfig, Settings};
pub use host::SystemHost;
pub use instance::{Collaborators, LifecycleState, ProxyInstance};
pub use profile::{BackendKind, Profile};

/// Common error type for the orchestrator
pub type Result<T> = anyhow::Result<T>;

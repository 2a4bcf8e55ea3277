//! Configuration Module
//!
//! Handles rig-file loading and validation, the immutable settings
//! snapshot, and backend config document building.

pub mod assembler;
pub mod builder;
pub mod manager;
pub mod types;

pub use assembler::{ConfigAssembler, OutboundAssembler};
pub use builder::{build, BuiltConfig};
pub use manager::ConfigManager;
pub use types::{RigConfig, Settings, FORWARDER_PORT_OFFSET, LOCAL_BACKEND_PORT_OFFSET};

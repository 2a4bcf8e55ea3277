//! Engine Module
//!
//! Embedded engine seam, external process supervision, and the browser
//! forwarder keep-alive task.

pub mod embedded;
pub mod forwarder;
pub mod supervisor;

pub use embedded::{Direction, EmbeddedEngine, SupportSet, VpnPermissionProvider};
pub use forwarder::{ForwarderTask, ForwarderView};
pub use supervisor::Supervisor;

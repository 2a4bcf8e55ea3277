//! Configuration Types

use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Offset added to the base SOCKS port for the local backend's bind port.
pub const LOCAL_BACKEND_PORT_OFFSET: u16 = 10;

/// Offset added to the base SOCKS port for the embedded engine's HTTP
/// forwarding port, used by the browser forwarder workaround.
pub const FORWARDER_PORT_OFFSET: u16 = 11;

/// Immutable snapshot of the global settings a session runs with.
///
/// Captured once and passed into the config builder and the instance; the
/// orchestrator never reads mutable global state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Base local SOCKS port; derived ports are offsets from this.
    pub socks_port: u16,
    /// Route backend DNS through the local forwarding resolver.
    pub enable_local_dns: bool,
    pub local_dns_port: u16,
    /// Remote DNS endpoint used when local DNS forwarding is off.
    pub remote_dns: String,
    /// Whether IPv6 routes are installed at all.
    pub ipv6_route: bool,
    /// Prefer IPv6 addresses when both families resolve.
    pub prefer_ipv6: bool,
    /// Tolerate a locked primary store by writing stats to the
    /// device-protected fallback area.
    pub locked_storage_tolerant: bool,
    /// Interval between stats persistence cycles.
    #[serde(with = "humantime_serde")]
    pub persist_interval: Duration,
    /// Initial delay before reloading a failed forwarder view.
    #[serde(with = "humantime_serde")]
    pub forwarder_retry_initial: Duration,
    /// Upper bound on the forwarder reload backoff.
    #[serde(with = "humantime_serde")]
    pub forwarder_retry_max: Duration,
}

impl Settings {
    /// Bind port of the locally launched backend process.
    pub fn local_backend_port(&self) -> u16 {
        self.socks_port + LOCAL_BACKEND_PORT_OFFSET
    }

    /// HTTP forwarding port of the embedded engine.
    pub fn forwarder_port(&self) -> u16 {
        self.socks_port + FORWARDER_PORT_OFFSET
    }

    /// DNS value injected into backend configs: the local forwarding
    /// resolver when enabled, the remote endpoint otherwise.
    pub fn dns_endpoint(&self) -> String {
        if self.enable_local_dns {
            format!("127.0.0.1:{}", self.local_dns_port)
        } else {
            self.remote_dns.clone()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socks_port: 1080,
            enable_local_dns: false,
            local_dns_port: 6450,
            remote_dns: "8.8.8.8:53".to_string(),
            ipv6_route: false,
            prefer_ipv6: false,
            locked_storage_tolerant: false,
            persist_interval: Duration::from_secs(10),
            forwarder_retry_initial: Duration::from_secs(1),
            forwarder_retry_max: Duration::from_secs(30),
        }
    }
}

/// Top-level rig file: one settings snapshot plus the selected profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RigConfig {
    pub settings: Settings,
    pub profile: Profile,
}

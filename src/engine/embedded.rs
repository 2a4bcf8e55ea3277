//! Embedded Engine Seam
//!
//! The in-process point-to-point proxy engine is a host-supplied object;
//! these traits describe the surface the orchestrator drives.

use crate::Result;

/// Traffic direction of an outbound counter query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Uplink,
    Downlink,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Uplink => "uplink",
            Direction::Downlink => "downlink",
        }
    }
}

/// In-process proxy engine driven by one instance.
pub trait EmbeddedEngine: Send {
    /// Point the engine at its upstream endpoint (`host:port`).
    fn set_target(&mut self, endpoint: &str);

    /// Hand the engine its serialized configuration document.
    fn set_config(&mut self, config: String);

    /// Enter the engine's connection loop. Returns once the loop is up.
    fn run_loop(&mut self, prefer_ipv6: bool) -> Result<()>;

    /// Stop the connection loop.
    fn stop_loop(&mut self) -> Result<()>;

    /// Read and reset the outbound traffic counter for one direction.
    ///
    /// Counter-reset semantics: each call returns the bytes moved since the
    /// previous call for that direction.
    fn query_outbound(&self, direction: Direction) -> u64;
}

/// Grants the engine's sockets passage around the tunnel.
pub trait VpnPermissionProvider: Send + Sync {
    /// Exclude a socket descriptor from the tunnel. False means denied.
    fn protect(&self, socket_fd: i64) -> bool;
}

/// Support shim handed to the embedded engine.
///
/// Forwards `protect` to the VPN permission provider when one exists;
/// outside a tunnel-owning host every socket is allowed through.
pub struct SupportSet {
    provider: Option<Box<dyn VpnPermissionProvider>>,
}

impl SupportSet {
    pub fn new(provider: Option<Box<dyn VpnPermissionProvider>>) -> Self {
        Self { provider }
    }

    pub fn protect(&self, socket_fd: i64) -> bool {
        match &self.provider {
            Some(provider) => provider.protect(socket_fd),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyAll;

    impl VpnPermissionProvider for DenyAll {
        fn protect(&self, _socket_fd: i64) -> bool {
            false
        }
    }

    #[test]
    fn test_protect_defaults_to_allow() {
        let support = SupportSet::new(None);
        assert!(support.protect(42));
    }

    #[test]
    fn test_protect_forwards_to_provider() {
        let support = SupportSet::new(Some(Box::new(DenyAll)));
        assert!(!support.protect(42));
    }

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::Uplink.as_str(), "uplink");
        assert_eq!(Direction::Downlink.as_str(), "downlink");
    }
}

//! Outbound Config Assembly
//!
//! The multiplexed V2Ray-family configuration is assembled by an external
//! collaborator; this module defines the seam and a minimal assembler
//! sufficient for the embedded engine's point-to-point mode.

use super::Settings;
use crate::profile::{BackendKind, Profile};
use crate::Result;
use serde_json::{json, Value};

/// Assembles the embedded engine's configuration document for a profile.
pub trait ConfigAssembler: Send + Sync {
    /// Configuration consumed by the embedded engine.
    fn assemble(&self, profile: &Profile, settings: &Settings) -> Result<Value>;

    /// Separate configuration serialized for the external xray process.
    ///
    /// Distinct from [`assemble`](Self::assemble): the process document
    /// carries the full outbound while the embedded engine only fronts the
    /// local chain.
    fn assemble_process(&self, profile: &Profile, settings: &Settings) -> Result<Value>;
}

/// Minimal assembler: a SOCKS inbound on the base port plus a stats-enabled
/// outbound toward the profile's upstream.
pub struct OutboundAssembler;

impl OutboundAssembler {
    fn outbound_target(profile: &Profile, settings: &Settings) -> (String, u16) {
        if profile.backend_kind().uses_local_backend() {
            ("127.0.0.1".to_string(), settings.local_backend_port())
        } else {
            (profile.server_address.clone(), profile.server_port)
        }
    }
}

impl ConfigAssembler for OutboundAssembler {
    fn assemble(&self, profile: &Profile, settings: &Settings) -> Result<Value> {
        let (address, port) = Self::outbound_target(profile, settings);
        Ok(json!({
            "stats": {},
            "policy": {
                "system": {
                    "statsOutboundUplink": true,
                    "statsOutboundDownlink": true
                }
            },
            "inbounds": [{
                "tag": "socks-in",
                "protocol": "socks",
                "listen": "127.0.0.1",
                "port": settings.socks_port
            }],
            "outbounds": [{
                "tag": "out",
                "protocol": "freedom",
                "settings": {
                    "redirect": format!("{}:{}", address, port)
                }
            }]
        }))
    }

    fn assemble_process(&self, profile: &Profile, settings: &Settings) -> Result<Value> {
        // The external process binds the chained local port itself and dials
        // the remote directly.
        Ok(json!({
            "inbounds": [{
                "tag": "chain-in",
                "protocol": "socks",
                "listen": "127.0.0.1",
                "port": settings.local_backend_port()
            }],
            "outbounds": [{
                "tag": "proxy",
                "protocol": "vless",
                "settings": {
                    "address": profile.server_address,
                    "port": profile.server_port
                },
                "streamSettings": {
                    "network": if profile.transport.network.is_empty() {
                        "tcp"
                    } else {
                        profile.transport.network.as_str()
                    }
                }
            }]
        }))
    }
}

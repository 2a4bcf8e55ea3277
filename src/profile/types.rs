//! Profile Types

use serde::{Deserialize, Serialize};

/// The proxy protocol family a profile is configured for.
///
/// A profile maps to exactly one kind at config-build time; all per-kind
/// behavior dispatches on this enum rather than on loose flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Shadowsocks handled by an external `ss-local` process.
    ExternalShadowsocks,
    /// ShadowsocksR handled by an external `ssr-local` process.
    ShadowsocksR,
    /// V2Ray-family outbound executed by the external xray binary.
    Xray,
    /// V2Ray-family outbound served entirely by the embedded engine.
    DirectV2ray,
}

impl BackendKind {
    /// Whether this kind launches a local backend process that the embedded
    /// engine must chain through.
    pub fn uses_local_backend(&self) -> bool {
        !matches!(self, BackendKind::DirectV2ray)
    }

    /// Prefix used for this kind's generated config artifact.
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            BackendKind::ExternalShadowsocks => "shadowsocks",
            BackendKind::ShadowsocksR => "shadowsocksr",
            BackendKind::Xray => "xray",
            BackendKind::DirectV2ray => "v2ray",
        }
    }
}

/// Transport options for V2Ray-family profiles.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransportOptions {
    /// Stream transport, e.g. "tcp" or "ws".
    #[serde(default)]
    pub network: String,
    /// WebSocket profiles may route through the platform browser forwarder.
    #[serde(default)]
    pub ws_use_browser_forwarder: bool,
}

/// A proxy server profile.
///
/// Immutable within a running session except for the cumulative `tx`/`rx`
/// counters, which the persistence reconciler adds into on each cycle. The
/// record is owned by the persistent store; the orchestrator holds it for
/// the duration of one session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    pub id: u64,
    pub name: String,
    pub kind: BackendKind,
    pub server_address: String,
    pub server_port: u16,

    /// Cipher method (Shadowsocks/ShadowsocksR).
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub password: String,

    // ShadowsocksR obfuscation layer
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub protocol_param: String,
    #[serde(default)]
    pub obfs: String,
    #[serde(default)]
    pub obfs_param: String,

    /// SIP003 plugin spec, e.g. "obfs-local;obfs=http". Empty means none.
    #[serde(default)]
    pub plugin: String,

    /// Cumulative uploaded bytes, owned by the store.
    #[serde(default)]
    pub tx: u64,
    /// Cumulative downloaded bytes, owned by the store.
    #[serde(default)]
    pub rx: u64,

    #[serde(default)]
    pub transport: TransportOptions,
}

impl Profile {
    /// The backend kind this profile resolves to.
    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// `host:port` of the remote server.
    pub fn server_endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    /// Whether the WebView forwarder workaround applies to this profile.
    pub fn wants_browser_forwarder(&self) -> bool {
        self.transport.network == "ws" && self.transport.ws_use_browser_forwarder
    }
}

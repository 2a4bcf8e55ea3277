//! Backend Config Builder
//!
//! Pure mapping from a profile plus the settings snapshot to the
//! backend-specific configuration documents. Nothing here touches the
//! filesystem or launches processes; serialization and launch belong to
//! the supervisor.

use super::{ConfigAssembler, Settings};
use crate::plugin::PluginResolver;
use crate::profile::{BackendKind, Profile};
use crate::Result;
use anyhow::Context;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Name of the xray-capable plugin binary.
pub const XRAY_PLUGIN: &str = "xtls-plugin";

/// Everything `start()` needs for one session, produced at `init`.
#[derive(Debug, Clone)]
pub struct BuiltConfig {
    pub kind: BackendKind,
    /// Document serialized into the artifact file for the local backend
    /// process. `None` for the pure embedded kind.
    pub backend_doc: Option<Value>,
    /// Document consumed by the embedded engine.
    pub engine_doc: Value,
    /// Endpoint the embedded engine dials: the local backend's loopback
    /// port when one is launched, the remote server otherwise.
    pub engine_target: String,
    /// Resolved xray binary, present only for the Xray kind.
    pub xray_binary: Option<PathBuf>,
}

/// Build the session configuration for a profile.
pub fn build(
    profile: &Profile,
    settings: &Settings,
    plugins: &dyn PluginResolver,
    assembler: &dyn ConfigAssembler,
) -> Result<BuiltConfig> {
    let kind = profile.backend_kind();

    // Chaining rule: whenever a local backend is launched, the embedded
    // engine must dial it over loopback, never the remote directly.
    let engine_target = if kind.uses_local_backend() {
        format!("127.0.0.1:{}", settings.local_backend_port())
    } else {
        profile.server_endpoint()
    };

    let engine_doc = assembler
        .assemble(profile, settings)
        .context("Failed to assemble embedded engine config")?;

    let (backend_doc, xray_binary) = match kind {
        BackendKind::ExternalShadowsocks => {
            (Some(shadowsocks_document(profile, settings, plugins)), None)
        }
        BackendKind::ShadowsocksR => (Some(shadowsocksr_document(profile, settings)), None),
        BackendKind::Xray => {
            // The binary is the engine executable here, not an obfs layer,
            // so resolution failure is fatal.
            let binary = plugins
                .resolve_binary(XRAY_PLUGIN)
                .context("Failed to resolve the xray plugin binary")?;
            let doc = assembler
                .assemble_process(profile, settings)
                .context("Failed to assemble xray process config")?;
            (Some(doc), Some(binary))
        }
        BackendKind::DirectV2ray => (None, None),
    };

    debug!(kind = ?kind, target = %engine_target, "Built session config");

    Ok(BuiltConfig {
        kind,
        backend_doc,
        engine_doc,
        engine_target,
        xray_binary,
    })
}

/// `ss-local` configuration document.
fn shadowsocks_document(
    profile: &Profile,
    settings: &Settings,
    plugins: &dyn PluginResolver,
) -> Value {
    let port = settings.local_backend_port();
    let mut doc = json!({
        "server": profile.server_address,
        "server_port": profile.server_port,
        "method": profile.method,
        "password": profile.password,
        "local_address": "127.0.0.1",
        "local_port": port,
        "local_udp_address": "127.0.0.1",
        "local_udp_port": port,
        "mode": "tcp_and_udp",
        "dns": settings.dns_endpoint(),
    });

    if settings.ipv6_route && settings.prefer_ipv6 {
        doc["ipv6_first"] = Value::Bool(true);
    }

    if !profile.plugin.is_empty() {
        match plugins.resolve(&profile.plugin) {
            Ok(resolved) => {
                doc["plugin"] = Value::String(resolved.path.to_string_lossy().into_owned());
                doc["plugin_opts"] = Value::String(resolved.options);
            }
            Err(e) => {
                // Non-fatal: fall back to the plain transport.
                warn!(plugin = %profile.plugin, error = %e, "Plugin resolution failed, building without it");
            }
        }
    }

    doc
}

/// `ssr-local` configuration document.
fn shadowsocksr_document(profile: &Profile, settings: &Settings) -> Value {
    json!({
        "server": profile.server_address,
        "server_port": profile.server_port,
        "method": profile.method,
        "password": profile.password,
        "protocol": profile.protocol,
        "protocol_param": profile.protocol_param,
        "obfs": profile.obfs,
        "obfs_param": profile.obfs_param,
        "ipv6": settings.ipv6_route,
        "dns": settings.dns_endpoint(),
    })
}

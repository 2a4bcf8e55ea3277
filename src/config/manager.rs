//! Configuration Manager

use super::{RigConfig, Settings};
use crate::profile::BackendKind;
use crate::Result;
use anyhow::{bail, Context};
use std::path::Path;

/// Manages rig-file loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load a rig file (settings + profile) from disk
    pub fn load_from_file(path: &Path) -> Result<RigConfig> {
        tracing::info!("Loading rig file from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rig file: {}", path.display()))?;

        let config: RigConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse rig file: {}", path.display()))?;

        config.validate().context("Rig file validation failed")?;

        tracing::info!(
            profile = %config.profile.name,
            kind = ?config.profile.kind,
            "Rig file loaded and validated successfully"
        );
        Ok(config)
    }

    /// Apply environment variable overrides to the settings snapshot
    pub fn apply_env_overrides(settings: &mut Settings) -> Result<()> {
        if let Ok(port) = std::env::var("PROXYRIG_SOCKS_PORT") {
            settings.socks_port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid PROXYRIG_SOCKS_PORT: {}", port))?;
        }

        if let Ok(remote_dns) = std::env::var("PROXYRIG_REMOTE_DNS") {
            settings.remote_dns = remote_dns;
        }

        if let Ok(interval) = std::env::var("PROXYRIG_PERSIST_INTERVAL") {
            settings.persist_interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid PROXYRIG_PERSIST_INTERVAL: {}", interval))?;
        }

        if let Ok(tolerant) = std::env::var("PROXYRIG_LOCKED_TOLERANT") {
            settings.locked_storage_tolerant = tolerant
                .parse::<bool>()
                .with_context(|| format!("Invalid PROXYRIG_LOCKED_TOLERANT: {}", tolerant))?;
        }

        Ok(())
    }
}

impl RigConfig {
    /// Validate the rig file
    pub fn validate(&self) -> Result<()> {
        self.validate_settings()
            .context("Settings validation failed")?;
        self.validate_profile()
            .context("Profile validation failed")?;
        Ok(())
    }

    fn validate_settings(&self) -> Result<()> {
        let settings = &self.settings;

        if settings.socks_port == 0 {
            bail!("socks_port must be greater than 0");
        }

        // Derived ports must stay in range
        if settings.socks_port > u16::MAX - super::FORWARDER_PORT_OFFSET {
            bail!(
                "socks_port {} leaves no room for derived ports",
                settings.socks_port
            );
        }

        if !settings.enable_local_dns && settings.remote_dns.is_empty() {
            bail!("remote_dns must be set when local DNS forwarding is disabled");
        }

        if settings.persist_interval.as_secs() == 0 {
            bail!("persist_interval must be at least 1 second");
        }

        if settings.forwarder_retry_initial > settings.forwarder_retry_max {
            bail!("forwarder_retry_initial cannot exceed forwarder_retry_max");
        }

        Ok(())
    }

    fn validate_profile(&self) -> Result<()> {
        let profile = &self.profile;

        if profile.server_address.is_empty() {
            bail!("Profile has empty server_address");
        }

        if profile.server_port == 0 {
            bail!("Profile has invalid server_port 0");
        }

        match profile.kind {
            BackendKind::ExternalShadowsocks => {
                if profile.method.is_empty() {
                    bail!("Shadowsocks profile requires a cipher method");
                }
                if profile.password.is_empty() {
                    bail!("Shadowsocks profile requires a password");
                }
            }
            BackendKind::ShadowsocksR => {
                if profile.method.is_empty() {
                    bail!("ShadowsocksR profile requires a cipher method");
                }
                if profile.password.is_empty() {
                    bail!("ShadowsocksR profile requires a password");
                }
                if profile.protocol.is_empty() {
                    bail!("ShadowsocksR profile requires a protocol");
                }
                if profile.obfs.is_empty() {
                    bail!("ShadowsocksR profile requires an obfs mode");
                }
            }
            BackendKind::Xray | BackendKind::DirectV2ray => {
                if profile.transport.ws_use_browser_forwarder
                    && profile.transport.network != "ws"
                {
                    bail!("Browser forwarder requires the ws transport");
                }
            }
        }

        Ok(())
    }
}

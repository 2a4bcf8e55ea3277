//! Plugin Resolution
//!
//! Seam over the bundled-plugin installer/locator. Backend transport
//! plugins (SIP003 style) and the xray binary are both located through
//! this interface; the actual installer lives in the host platform.

use crate::Result;
use anyhow::{anyhow, bail};
use std::path::PathBuf;

/// A resolved transport plugin: executable path plus its option string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlugin {
    pub path: PathBuf,
    pub options: String,
}

/// Locates plugin executables for backend configs.
pub trait PluginResolver: Send + Sync {
    /// Resolve a plugin spec of the form `name;opt1=v1;opt2=v2`.
    ///
    /// Failure means the plugin is treated as absent by the config builder.
    fn resolve(&self, spec: &str) -> Result<ResolvedPlugin>;

    /// Resolve a bare plugin binary by name (e.g. `xtls-plugin`).
    fn resolve_binary(&self, name: &str) -> Result<PathBuf>;
}

/// Resolver backed by a directory of installed plugin executables.
pub struct DirPluginResolver {
    plugin_dir: PathBuf,
}

impl DirPluginResolver {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
        }
    }

    fn split_spec(spec: &str) -> (&str, String) {
        match spec.split_once(';') {
            Some((name, opts)) => (name, opts.to_string()),
            None => (spec, String::new()),
        }
    }
}

impl PluginResolver for DirPluginResolver {
    fn resolve(&self, spec: &str) -> Result<ResolvedPlugin> {
        let (name, options) = Self::split_spec(spec);
        if name.is_empty() {
            bail!("Empty plugin name in spec: {:?}", spec);
        }
        let path = self.resolve_binary(name)?;
        Ok(ResolvedPlugin { path, options })
    }

    fn resolve_binary(&self, name: &str) -> Result<PathBuf> {
        let candidates = [
            self.plugin_dir.join(name),
            self.plugin_dir.join(format!("{}.exe", name)),
        ];
        candidates
            .iter()
            .find(|p| p.exists())
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "Plugin binary {} not found under {}",
                    name,
                    self.plugin_dir.display()
                )
            })
    }
}

//! ProxyRig - Local Proxy-Instance Orchestrator
//!
//! CLI for inspecting a rig file: validates the settings/profile pair and
//! dumps the backend config documents that a session would generate. The
//! embedded engine and the stores are host collaborators, so no engine is
//! launched from here.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proxyrig::config::{self, ConfigManager, OutboundAssembler};
use proxyrig::plugin::DirPluginResolver;

/// CLI arguments for ProxyRig
#[derive(Parser, Debug)]
#[command(name = "proxyrig")]
#[command(about = "ProxyRig - Local proxy-instance orchestrator")]
#[command(version)]
pub struct CliArgs {
    /// Rig file (settings + profile)
    #[arg(short, long, default_value = "rig.toml", help = "Path to rig file")]
    pub config: PathBuf,

    /// Directory holding installed plugin binaries
    #[arg(long, default_value = "plugins", help = "Plugin binary directory")]
    pub plugin_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate the rig file and exit
    #[arg(long, help = "Validate the rig file and exit")]
    pub validate_config: bool,

    /// Build and print the generated backend config documents
    #[arg(long, help = "Dump the generated backend config documents")]
    pub dump_config: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_tracing(&args)?;

    info!("ProxyRig v{}", env!("CARGO_PKG_VERSION"));

    let mut rig = ConfigManager::load_from_file(&args.config)?;
    ConfigManager::apply_env_overrides(&mut rig.settings)
        .context("Applying environment overrides failed")?;
    rig.validate()
        .context("Final rig validation failed")?;

    info!("Rig file loaded successfully");
    info!("  Profile: {} ({:?})", rig.profile.name, rig.profile.kind);
    info!("  Server: {}", rig.profile.server_endpoint());
    info!("  Base SOCKS port: {}", rig.settings.socks_port);
    info!("  Local backend port: {}", rig.settings.local_backend_port());
    info!("  DNS: {}", rig.settings.dns_endpoint());
    info!(
        "  Locked-storage tolerance: {}",
        if rig.settings.locked_storage_tolerant {
            "enabled"
        } else {
            "disabled"
        }
    );

    if args.validate_config {
        info!("Rig file is valid");
        return Ok(());
    }

    if args.dump_config {
        let plugins = DirPluginResolver::new(&args.plugin_dir);
        let built = config::build(&rig.profile, &rig.settings, &plugins, &OutboundAssembler)
            .context("Failed to build session config")?;

        println!("# engine target: {}", built.engine_target);
        println!("# embedded engine config");
        println!("{}", serde_json::to_string_pretty(&built.engine_doc)?);

        if let Some(doc) = &built.backend_doc {
            println!("# local backend config ({:?})", built.kind);
            println!("{}", serde_json::to_string_pretty(doc)?);
        }
        if let Some(binary) = &built.xray_binary {
            println!("# xray binary: {}", binary.display());
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}

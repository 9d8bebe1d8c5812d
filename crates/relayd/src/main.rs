//! # relayd
//!
//! Chat relay server binary: loads settings, builds the backend registry,
//! and serves the WebSocket relay until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_llm::BackendRegistry;
use relay_server::RelayServer;
use relay_server::shutdown::shutdown_signal;
use relay_settings::RelaySettings;

/// Chat relay server.
#[derive(Parser, Debug)]
#[command(name = "relayd", about = "WebSocket chat relay", version)]
struct Cli {
    /// Settings file (defaults to `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Emit JSON log lines (overrides settings).
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Load settings and apply command-line overrides on top.
    fn resolve_settings(&self) -> Result<RelaySettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(relay_settings::settings_path);
        let mut settings = relay_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    if settings.logging.json {
        relay_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        relay_core::logging::init_subscriber(&settings.logging.level);
    }

    let metrics = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let registry =
        BackendRegistry::from_settings(&settings.backends, settings.session.default_backend)
            .context("Failed to build backend registry")?;
    for status in registry.status() {
        tracing::info!(backend = %status.id, enabled = status.enabled, "backend");
    }

    let server = RelayServer::new(settings, registry).with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "{} {} listening on ws://{addr}{}",
        relay_core::constants::NAME,
        relay_core::constants::VERSION,
        server.settings().server.ws_path
    );

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle]).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

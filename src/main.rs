//! # relay
//!
//! Chat relay binary: loads settings, opens the database, picks a push
//! provider and serves both chat domains until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::auth::JwtValidator;
use relay_server::config::ServerConfig;
use relay_server::metrics::install_recorder;
use relay_server::push::{DisabledProvider, FcmConfig, FcmService, PushProvider, ServiceAccount};
use relay_server::RelayServer;
use relay_settings::{PushSettings, RelaySettings};
use relay_store::ConnectionConfig;

/// Real-time chat relay with push notification fallback.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Real-time chat relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Settings file (defaults to `$RELAY_SETTINGS` or `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// Overlay command-line flags on loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.db_path {
            settings.database.path = path.display().to_string();
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// FCM when enabled and credentials are configured, otherwise a no-op provider.
fn build_push_provider(settings: &PushSettings) -> Result<Arc<dyn PushProvider>> {
    if !settings.enabled {
        tracing::info!("push disabled in settings");
        return Ok(Arc::new(DisabledProvider));
    }
    let Some(path) = settings.credentials_path.as_deref() else {
        tracing::warn!("no FCM credentials configured, push notifications disabled");
        return Ok(Arc::new(DisabledProvider));
    };

    let account = ServiceAccount::from_file(Path::new(path))
        .with_context(|| format!("Failed to load FCM credentials from {path}"))?;
    let mut config = FcmConfig {
        request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
        ..FcmConfig::default()
    };
    if let Some(base) = &settings.fcm_base_url {
        config.api_base_url.clone_from(base);
    }
    let service = FcmService::new(account, &config).context("Failed to initialize FCM")?;
    Ok(Arc::new(service))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match &args.settings {
        Some(path) => relay_settings::load_settings_from_path(path),
        None => relay_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    relay_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let metrics = match install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed, /metrics disabled");
            None
        }
    };

    let db_path = PathBuf::from(&settings.database.path);
    ensure_parent_dir(&db_path)?;
    let pool = relay_store::open(
        &settings.database.path,
        &ConnectionConfig {
            pool_size: settings.database.pool_size,
            busy_timeout_ms: settings.database.busy_timeout_ms,
        },
    )
    .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database ready");

    let provider = build_push_provider(&settings.push)?;
    let validator = Arc::new(JwtValidator::from_settings(&settings.auth));

    let mut server = RelayServer::new(
        ServerConfig::from(&settings.server),
        pool,
        validator,
        provider,
    )
    .with_push_pool(settings.push.workers, settings.push.queue_capacity);
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }

    let handle = server.listen().await.context("Failed to bind server")?;
    tracing::info!("relay listening on http://{}", handle.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    handle.shutdown(None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

//! inkframe daemon entry point.

use anyhow::{bail, Context};
use clap::Parser;
use inkframe::api::{self, AppState};
use inkframe::clock::{Clock, SystemClock};
use inkframe::config::{AppConfig, ConfigManager};
use inkframe::display::{DisplayController, MockDriver};
use inkframe::instances::InstanceStore;
use inkframe::orchestrator::ContentOrchestrator;
use inkframe::registry::PluginRegistry;
use inkframe::schedule::ScheduleStore;
use inkframe::storage::ensure_dir;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "inkframe",
    version,
    about = "Content orchestration daemon for electronic paper panels"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "inkframe.toml")]
    config: PathBuf,

    /// Data directory override
    #[arg(long, env = "INKFRAME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// IANA timezone override
    #[arg(long, env = "INKFRAME_TIMEZONE")]
    timezone: Option<String>,

    /// Listen address override, host:port
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("inkframe=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(Some(&cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data.dir = dir;
    }
    if let Some(tz) = cli.timezone {
        config.time.timezone = tz;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(&config.time.timezone)?);
    let data_dir = ensure_dir(&config.data.dir).context("data directory is not usable")?;
    info!(
        "Starting inkframe: data dir {}, timezone {}",
        data_dir.display(),
        config.time.timezone
    );

    let registry = Arc::new(build_registry(&config)?);
    let driver = build_driver(&config, &data_dir)?;
    let display = Arc::new(DisplayController::new(driver, clock.clone()));
    display.init().await.context("display init failed")?;

    let instances = Arc::new(InstanceStore::new(&data_dir, clock.clone(), registry.clone()));
    let schedule = Arc::new(ScheduleStore::new(&data_dir, clock.clone()));

    let device = config.device_config();
    let orchestrator = Arc::new(ContentOrchestrator::new(
        schedule.clone(),
        instances.clone(),
        registry.clone(),
        display.clone(),
        clock.clone(),
        device.clone(),
    ));

    let loop_handle = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_loop().await })
    };

    let listen = match cli.listen {
        Some(addr) => addr,
        None => format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("server.host/server.port is not a valid socket address")?,
    };

    let state = Arc::new(AppState {
        config: Arc::new(ConfigManager::new(cli.config.clone(), config)),
        registry,
        instances,
        schedule,
        orchestrator: orchestrator.clone(),
        display,
        device,
    });

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!("HTTP API listening on {}", listen);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown().await;
    let _ = loop_handle.await;
    info!("inkframe stopped");
    Ok(())
}

/// Compiled-in plugin factories go here before manifests are scanned.
fn build_registry(config: &AppConfig) -> anyhow::Result<PluginRegistry> {
    let registry = PluginRegistry::new();
    let count = registry.load_all(&config.plugins.dir)?;
    info!("Plugin registry ready ({} plugins)", count);
    Ok(registry)
}

fn build_driver(
    config: &AppConfig,
    data_dir: &std::path::Path,
) -> anyhow::Result<Box<dyn inkframe::display::DisplayDriver>> {
    match config.display.driver.as_str() {
        "mock" => Ok(Box::new(MockDriver::new(
            config.display.width,
            config.display.height,
            Some(data_dir.join("preview")),
        ))),
        other => bail!("Unknown display driver: {}", other),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

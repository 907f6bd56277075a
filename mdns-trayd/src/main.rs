mod actions;
mod api;
mod config;
mod index;
mod mdns;
mod notify;
mod presentation;
mod reconciler;

use std::path::PathBuf;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use shared::protocol::ANY_INTERFACE;
use crate::actions::exec::ShellExecutor;
use crate::actions::ConfiguredActions;
use crate::config::Config;
use crate::index::DiscoveryIndex;
use crate::mdns::browser::{BrowserSettings, MdnsTransport};
use crate::notify::{DesktopNotifier, NotificationToggle};
use crate::presentation::debounce::Debouncer;
use crate::presentation::render::SnapshotPublisher;
use crate::presentation::PresentationSync;
use crate::reconciler::{Reconciler, ReconcilerHandle};

/// Keeps a live menu of the services announced on the local network
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable (1) or disable (0) desktop notifications
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=1))]
    notify: Option<u8>,

    /// Extra configuration file, read after the default locations
    #[arg(short, long = "config", value_name = "PATH")]
    configs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "mdns_trayd=debug" } else { "mdns_trayd=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter))
        )
        .init();

    tracing::info!("Starting mdns-trayd");

    // Load config
    let mut paths = config::default_search_paths();
    paths.extend(cli.configs.iter().cloned());
    let config = Config::load_layered(&paths).context("Failed to load configuration")?;

    let notifications = NotificationToggle::new(match cli.notify {
        Some(flag) => flag == 1,
        None => config.notifications.enabled,
    });

    // Create mDNS daemon, optionally bound to one interface
    let mdns_daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;
    if let Some(interface) = &config.discovery.interface {
        mdns_daemon
            .disable_interface(mdns_sd::IfKind::All)
            .context("Failed to disable default interfaces")?;
        mdns_daemon
            .enable_interface(interface.as_str())
            .with_context(|| format!("Failed to enable interface {}", interface))?;
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn mDNS browser task
    let (transport, browse_rx) = MdnsTransport::new();
    let (event_tx, event_rx) = mpsc::channel(256);
    let settings = BrowserSettings {
        interface: config
            .discovery
            .interface
            .clone()
            .unwrap_or_else(|| ANY_INTERFACE.to_string()),
        domains: config.discovery.domains.clone(),
        resolve_timeout: config.discovery.resolve_timeout(),
    };
    let browser_cancel = cancel.clone();
    let browser_daemon = mdns_daemon.clone();
    let browser_handle = tokio::spawn(async move {
        if let Err(e) = mdns::browser::run_browser(browser_daemon, settings, browse_rx, event_tx, browser_cancel).await {
            tracing::error!("mDNS browser error: {}", e);
        }
    });

    // Spawn reconciler task
    let actions = ConfiguredActions::from_config(&config, Box::new(ShellExecutor));
    let notifier = DesktopNotifier::from_config(&config.notifications, notifications.clone(), Box::new(ShellExecutor));
    let sync = PresentationSync::new(config.aliases.clone(), Box::new(actions), Box::new(notifier));
    let (publisher, menu_rx) = SnapshotPublisher::new();
    let reconciler = Reconciler::new(
        DiscoveryIndex::new(Box::new(transport)),
        sync,
        Box::new(publisher),
        Debouncer::new(config.ui.debounce()),
    );
    let (reconciler_handle, command_rx) = ReconcilerHandle::new();
    let reconciler_cancel = cancel.clone();
    let reconciler_task = tokio::spawn(async move {
        if let Err(e) = reconciler.run(event_rx, command_rx, reconciler_cancel).await {
            tracing::error!("Reconciler error: {}", e);
        }
    });

    // Serve the menu API
    let server_handle = if config.api.enabled {
        let app = api::routes::router(api::routes::AppState {
            reconciler: reconciler_handle,
            menu_rx,
            notifications,
        });

        let listener = tokio::net::TcpListener::bind(&config.api.listen)
            .await
            .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

        tracing::info!("API listening on {}", config.api.listen);

        let server_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_cancel.cancelled().await })
                .await
            {
                tracing::error!("Server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(browser_handle, reconciler_task);
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }

    // Shutdown mDNS daemon
    if let Err(e) = mdns_daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

//! # commoniotd: commoniot daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and initialise logging
//! - Create the in-process bus, the device registry and the bus API
//! - Start one scanner per enabled discovery backend, feeding the registry
//! - Build the axum router and serve it
//! - Handle graceful shutdown (Ctrl-C): stop serving, then stop the scanners
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use commoniot_adapter_http_axum::router;
use commoniot_adapter_http_axum::state::AppState;
use commoniot_adapter_virtual::VirtualNetwork;
use commoniot_app::event_bus::InProcessBus;
use commoniot_app::scanner::{Scanner, ScannerHandle};
use commoniot_app::services::{BusApi, DeviceRegistry};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Bus and registry
    let bus = InProcessBus::new(BUS_CAPACITY);
    let registry = Arc::new(DeviceRegistry::new(bus.clone()));
    let api = Arc::new(BusApi::new(
        Arc::clone(&registry),
        config.dashboard.use_group_display,
    ));

    let requests = bus.subscribe();
    let bus_task = tokio::spawn({
        let api = Arc::clone(&api);
        let responses = bus.clone();
        async move { api.serve(requests, responses).await }
    });

    // Discovery
    let mut scanners: Vec<ScannerHandle> = Vec::new();
    if config.integrations.virtual_enabled {
        let network = VirtualNetwork::demo()?;
        let mut scanner = Scanner::new(network.discovery("virtual"), config.scanner_config());
        for (id, name) in &config.scanner.aliases {
            scanner = scanner.with_alias(id.as_str(), name.as_str());
        }
        scanners.push(scanner.spawn(Arc::clone(&registry)));
    }
    if scanners.is_empty() {
        tracing::warn!("no discovery backend enabled, the registry will stay empty");
    }

    // HTTP
    let app = router::build(AppState::new(api, bus));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "commoniotd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for scanner in scanners {
        scanner.shutdown().await;
    }
    bus_task.abort();
    tracing::info!("commoniotd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

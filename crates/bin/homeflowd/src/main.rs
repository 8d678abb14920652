//! # homeflowd — homeflow automation daemon
//!
//! Composition root that wires the automation engine to its adapters.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Connect to the MQTT broker
//! - Run the engine until SIGINT/SIGTERM, then drain and disconnect
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use homeflow_adapter_storage_sqlite_sqlx::SqliteAutomationRegistry;
use homeflow_app::engine::AutomationEngine;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    // Registry
    let db = homeflow_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open automation registry")?;
    let registry = Arc::new(SqliteAutomationRegistry::new(db.pool().clone()));

    // Bus
    let (bus, subscriber) = homeflow_adapter_mqtt::connect(&config.mqtt);
    tracing::info!(
        host = %config.mqtt.broker_host,
        port = config.mqtt.broker_port,
        "connecting to MQTT broker"
    );

    // Engine
    let engine = AutomationEngine::new(registry, Arc::new(bus), config.engine_config());

    let (sender, receiver) = mpsc::channel(config.engine.inbound_capacity.max(1));
    let shutdown = CancellationToken::new();
    let bus_shutdown = CancellationToken::new();

    let bus_task = tokio::spawn(subscriber.run(sender, bus_shutdown.clone()));
    tokio::spawn(wait_for_signal(shutdown.clone()));

    engine.run(receiver, shutdown).await;

    // The engine has published its last message; let the bus flush it.
    bus_shutdown.cancel();
    bus_task.await.context("MQTT subscriber task panicked")?;

    tracing::info!("homeflowd stopped");
    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}

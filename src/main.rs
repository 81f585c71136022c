use anyhow::Context;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::info;

use retail_ops_api::{
    api, config, db,
    events::{self, EventSender},
    services::{
        notifications::{LoggingNotificationService, LoggingReceiptService},
        AppServices,
    },
    AppState,
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(config.log_level(), config.log_json);

    let db = Arc::new(
        db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to the database")?,
    );
    if config.auto_migrate {
        db::run_migrations(db.as_ref())
            .await
            .context("failed to run migrations")?;
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let event_sender = EventSender::new(tx);
    let notifier = Arc::new(LoggingNotificationService);
    tokio::spawn(events::process_events(
        rx,
        notifier,
        config.alerts_notify_address.clone(),
    ));

    let receipts = Arc::new(LoggingReceiptService);
    let services = AppServices::new(db.clone(), event_sender, receipts, &config);
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        db,
        services,
        config: Arc::new(config),
    };

    let router = api::create_router(state);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

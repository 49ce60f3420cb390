//! causewayd — Causeway HTTP relay gateway daemon.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;

use causeway_core::config::CausewayConfig;
use causeway_gateway::{
    spawn_reaper, GatewayOptions, MessageHandler, SessionTable, TcpRelayConnector,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CausewayConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CausewayConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CausewayConfig::default()
    });

    tracing::info!(relay_server = %config.relay.server_addr, "causewayd starting");

    // Shared state
    let connector = Arc::new(TcpRelayConnector::new(config.relay.server_addr.clone()));
    let sessions = SessionTable::new();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();
    let reaper_task = spawn_reaper(sessions.clone(), closed_rx);

    let options = GatewayOptions {
        max_wait_for_data: Duration::from_secs(config.gateway.max_wait_for_data_secs),
        write_timeout: Duration::from_secs(config.gateway.write_timeout_secs),
    };
    let handler = Arc::new(MessageHandler::new(
        connector,
        sessions.clone(),
        closed_tx,
        options,
    ));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let api_task = {
        let state = causeway_api::ApiState {
            handler,
            sessions: sessions.clone(),
            started_at: Instant::now(),
        };
        let port = config.network.http_port;
        tokio::spawn(async move {
            if let Err(e) = causeway_api::serve(state, port).await {
                tracing::error!(error = %e, "gateway http server failed");
            }
        })
    };

    let snapshot_task = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                tracing::debug!(count = sessions.len(), "session table snapshot");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task      => tracing::error!("gateway http server exited: {:?}", r),
        r = reaper_task   => tracing::error!("session reaper exited: {:?}", r),
        r = snapshot_task => tracing::error!("session snapshot task exited: {:?}", r),
    }

    Ok(())
}

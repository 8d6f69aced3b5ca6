use std::sync::Arc;

use serde_json::Value;

use crate::configs::Settings;
use crate::services::BridgeService;

pub mod configs;
pub mod errors;
pub mod models;
pub mod services;

pub async fn run(settings: &Arc<Settings>) {
    let bridge = Arc::new(BridgeService::new(&settings.broker));

    bridge
        .register_handler("heartbeat", |data: &Value| {
            tracing::debug!("heartbeat: {data}");
            Ok(())
        })
        .await;
    bridge
        .register_handler("intruder", |data: &Value| {
            tracing::warn!("intruder event: {data}");
            Ok(())
        })
        .await;
    bridge
        .register_handler("alert", |data: &Value| {
            tracing::warn!("alert event: {data}");
            Ok(())
        })
        .await;

    bridge.connect().await;
    tracing::info!(
        "bridge started against {}:{}",
        settings.broker.host,
        settings.broker.port
    );

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
    }

    bridge.disconnect().await;
}

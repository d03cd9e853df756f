//! Background maintenance: periodic enrichment of store records that have
//! no place reference yet, plus a manual sync entry point for the
//! `sync_database` tool.

use crate::error::Result;
use crate::manager::RestaurantManager;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// One manual sync pass: reload the database and enrich whatever is missing
/// place data. Returns a summary the tool surface can render directly.
pub async fn manual_sync(manager: &RestaurantManager) -> Result<Value> {
    let started = std::time::Instant::now();
    let summary = manager.enrich_database().await?;
    let total = manager.database_snapshot().await?.len();
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "manual sync complete"
    );
    Ok(json!({
        "total_restaurants": total,
        "enrichment": summary,
        "elapsed_ms": started.elapsed().as_millis() as u64,
    }))
}

/// Run enrichment on a fixed interval until the process exits. Errors are
/// logged and the loop keeps going; a broken upstream should not kill the
/// server.
pub async fn run_periodic(manager: Arc<RestaurantManager>, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(60)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so startup stays quick.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match manual_sync(&manager).await {
            Ok(summary) => tracing::info!(%summary, "periodic sync finished"),
            Err(err) => tracing::warn!(error = %err, "periodic sync failed"),
        }
    }
}

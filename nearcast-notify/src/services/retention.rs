use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;

use nearcast_shared::errors::AppResult;

use crate::store::NotificationStore;

/// Delete notifications older than `retention_days` as of `now`.
/// A window shorter than one day purges nothing.
pub async fn sweep_once(
    store: &dyn NotificationStore,
    retention_days: i64,
    now: DateTime<Utc>,
) -> AppResult<usize> {
    if retention_days < 1 {
        tracing::warn!(retention_days, "skipping retention sweep with non-positive window");
        return Ok(0);
    }

    let cutoff = now - Duration::days(retention_days);
    let purged = store.purge_older_than(cutoff).await?;
    counter!("notifications_purged_total").increment(purged as u64);
    Ok(purged)
}

/// Spawn a background task that runs the retention sweep on a fixed interval.
pub fn spawn_retention_sweep(
    store: Arc<dyn NotificationStore>,
    retention_days: i64,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        // tokio panics on a zero period
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));

        loop {
            interval.tick().await;

            match sweep_once(store.as_ref(), retention_days, Utc::now()).await {
                Ok(purged) => {
                    tracing::info!(purged, retention_days, "notification retention sweep completed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "notification retention sweep failed");
                }
            }
        }
    });
}

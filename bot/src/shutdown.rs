use std::time::Duration;

use tokio::time::sleep;

use crate::app::SharedState;

pub async fn graceful_shutdown(state: &SharedState) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    if let Some(tx) = state.take_eventsub_shutdown().await {
        if tx.send(()).await.is_ok() {
            tracing::info!("Shutdown: EventSub stop signal sent");
        } else {
            tracing::warn!("Shutdown: failed to send EventSub stop signal");
        }
    }

    sleep(Duration::from_millis(200)).await;
    tracing::info!("Shutdown sequence completed");
}

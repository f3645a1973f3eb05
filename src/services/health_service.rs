use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report registry counters, or a degraded status when the registry does not answer.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let open_channels = state.session_hubs().open_channels();
    match state.registry().stats().await {
        Ok(stats) => HealthResponse::ok(state.started_at(), stats, open_channels),
        Err(err) => {
            warn!(error = %err, "session registry unavailable");
            HealthResponse::degraded(state.started_at(), open_channels)
        }
    }
}

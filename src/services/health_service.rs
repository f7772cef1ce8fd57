use crate::{dto::health::HealthResponse, state::SharedState};

/// Snapshot of live connections, queued players and unfinished matches.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(
        state.registry().connection_count(),
        state.queue().active_len().await,
        state.matches().active_count(),
    )
}

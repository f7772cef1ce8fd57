use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok").
    pub status: String,
    /// Live match connections.
    pub connections: usize,
    /// Players currently waiting in the queue.
    pub queued: usize,
    /// Matches not yet finished.
    pub active_matches: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(connections: usize, queued: usize, active_matches: usize) -> Self {
        Self {
            status: "ok".to_string(),
            connections,
            queued,
            active_matches,
        }
    }
}

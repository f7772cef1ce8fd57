use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the SmartStocks PvP service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::pvp::join_queue,
        crate::routes::pvp::leave_queue,
        crate::routes::pvp::submit_decision,
        crate::routes::pvp::history,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::ChartView,
            crate::dto::common::ScenarioView,
            crate::dto::pvp::JoinQueueResponse,
            crate::dto::pvp::SubmitDecisionRequest,
            crate::dto::pvp::WaitingResponse,
            crate::dto::pvp::RoundResultPayload,
            crate::dto::pvp::MatchFoundPayload,
            crate::dto::pvp::RoundStartPayload,
            crate::dto::pvp::MatchResultPayload,
            crate::dto::pvp::RoundSummary,
            crate::dto::pvp::WinnerView,
            crate::dto::pvp::OpponentLeftPayload,
            crate::dto::pvp::MatchHistoryItem,
            crate::dto::pvp::HistoryStats,
            crate::dto::pvp::HistoryResponse,
            crate::dto::ws::MessageType,
            crate::dto::ws::InboundMessage,
            crate::dto::ws::InboundKind,
            crate::state::tier::RankTier,
            crate::state::scenario::Decision,
            crate::state::scenario::Difficulty,
            crate::state::scoring::MatchOutcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "pvp", description = "Matchmaking, decisions and match history"),
    )
)]
/// OpenAPI document of the service.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/pvp/ws",
            "/pvp/queue/join",
            "/pvp/queue/leave",
            "/pvp/submit",
            "/pvp/history",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

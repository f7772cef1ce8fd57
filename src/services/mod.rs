/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match history and aggregate stats.
pub mod history_service;
/// WebSocket message encoding and delivery helpers.
pub mod match_events;
/// Match driver, decision intake and disconnect forfeits.
pub mod match_service;
/// Queue admission and opponent search.
pub mod matchmaking_service;
/// Periodic removal of stale queue entries.
pub mod queue_sweeper;
/// Scenario sources for match rounds.
pub mod scenario_provider;
/// WebSocket connection and message handling service.
pub mod websocket_service;

use axum::Router;

use crate::state::SharedState;

/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Health check route.
pub mod health;
/// Caller identity extractor.
pub mod identity;
/// Queue, decision and history routes.
pub mod pvp;
/// Match connection upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(pvp::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check route.
pub mod health;
/// JSON extractor with application errors.
pub mod json;
/// Matchmaking and answer routes.
pub mod session;
/// Session event streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(session::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

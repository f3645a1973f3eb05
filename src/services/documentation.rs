use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Relay Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::connect_to_session,
        crate::routes::session::submit_answer,
        crate::routes::session::get_session,
        crate::routes::sse::session_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinSessionResponse,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::SubmitAnswerResponse,
            crate::dto::session::SessionSummary,
            crate::dto::session::PlayerSummary,
            crate::dto::phase::VisibleSessionPhase,
            crate::dto::sse::QuestionPayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Matchmaking and answer submission"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket relay endpoint, and OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{ErrorResponse, StartSessionPayload, StartSessionResponse},
    session::SessionSnapshot,
    state::AppState,
    ws::ws_attach_handler,
};

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::start_session,
        handlers::end_session,
        handlers::list_sessions,
    ),
    components(
        schemas(StartSessionPayload, StartSessionResponse, ErrorResponse, SessionSnapshot)
    ),
    tags(
        (name = "Vaani Voice API", description = "Session lifecycle for the vaani voice relay")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let voice_router = Router::new()
        .route("/session", post(handlers::start_session))
        .route("/session/{id}", delete(handlers::end_session))
        .route("/session/{id}/ws", get(ws_attach_handler))
        .route("/sessions", get(handlers::list_sessions))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Merge the stateful routes with the stateless ones (Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1/voice", voice_router)
}

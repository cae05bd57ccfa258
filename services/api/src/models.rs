//! API request and response models for the session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, ToSchema)]
pub struct StartSessionPayload {
    #[schema(example = "en")]
    pub language: String,
    #[schema(example = "vaani-voice-1")]
    pub model: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct StartSessionResponse {
    #[schema(example = "vsn_9f2c1e7a4b5d48d0a1c2b3d4e5f60718")]
    pub session_id: String,
    /// Path the caller attaches its WebSocket to for the relay.
    #[schema(example = "/api/v1/voice/session/vsn_9f2c.../ws")]
    pub ws_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

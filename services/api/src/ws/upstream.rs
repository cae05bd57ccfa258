//! Dials and owns the WebSocket connection to the speech/AI backend.

use crate::{
    error::VoiceError,
    session::SessionConfig,
    ws::transport::{UpstreamHandle, wrap_upstream},
};
use async_trait::async_trait;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens the backend connection for a new session.
///
/// A trait so the lifecycle manager and relay can be exercised against an
/// in-memory backend in tests. A failed connect leaves nothing behind: the
/// caller must not register a session for a failed dial.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(
        &self,
        config: &SessionConfig,
        session_id: &str,
    ) -> Result<UpstreamHandle, VoiceError>;
}

/// Production connector dialing the configured backend WebSocket endpoint.
pub struct WsUpstreamConnector {
    url: String,
}

impl WsUpstreamConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl UpstreamConnector for WsUpstreamConnector {
    async fn connect(
        &self,
        config: &SessionConfig,
        session_id: &str,
    ) -> Result<UpstreamHandle, VoiceError> {
        // The session id is embedded in the dial URL so the backend can
        // correlate this connection with the session.
        let url = format!(
            "{}?session_id={}&language={}&model={}",
            self.url, session_id, config.language, config.model
        );

        let connect = tokio::time::timeout(DIAL_TIMEOUT, connect_async(url.as_str()));
        let (socket, _response) = match connect.await {
            Ok(Ok(ok)) => ok,
            Ok(Err(err)) => {
                warn!(%session_id, error = %err, "upstream handshake failed");
                return Err(VoiceError::UpstreamUnavailable(err.to_string()));
            }
            Err(_elapsed) => {
                warn!(%session_id, "upstream dial timed out");
                return Err(VoiceError::UpstreamUnavailable(format!(
                    "dial timed out after {DIAL_TIMEOUT:?}"
                )));
            }
        };

        info!(%session_id, "connected to upstream voice backend");
        Ok(wrap_upstream(socket))
    }
}

//! Session lifecycle orchestration.
//!
//! The manager is the only component that creates, transitions, or deletes
//! session records. The relay engine borrows a session's connections through
//! `attach` and reports back through `end_session`, which is safe to call
//! from either relay loop, from the HTTP boundary, and from the expiry sweep
//! concurrently.

use crate::{
    error::VoiceError,
    session::{
        record::{SESSION_ID_PREFIX, SessionRecord},
        store::SessionStore,
    },
    ws::{transport::UpstreamHandle, upstream::UpstreamConnector},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Maximum session lifetime before the sweep force-ends it.
const DEFAULT_TTL_MINUTES: i64 = 10;

/// Immutable per-session configuration chosen by the caller at start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub language: String,
    pub model: String,
}

/// What a successful start hands back to the HTTP boundary.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: String,
    /// Path the caller attaches its own WebSocket to.
    pub relay_path: String,
}

pub struct SessionManager {
    store: SessionStore,
    connector: Arc<dyn UpstreamConnector>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn UpstreamConnector>) -> Self {
        Self::with_ttl(connector, Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    pub fn with_ttl(connector: Arc<dyn UpstreamConnector>, ttl: Duration) -> Self {
        Self {
            store: SessionStore::new(),
            connector,
            ttl,
        }
    }

    /// The session registry, exposed for diagnostics endpoints.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Opens the upstream connection and registers a new `Active` session.
    ///
    /// Order matters: the upstream connection is established strictly before
    /// the record becomes visible in the store, and a connect failure
    /// registers nothing.
    pub async fn start_session(
        &self,
        config: SessionConfig,
        owner_id: &str,
    ) -> Result<StartedSession, VoiceError> {
        let session_id = format!("{}{}", SESSION_ID_PREFIX, Uuid::new_v4().simple());
        let upstream = self.connector.connect(&config, &session_id).await?;

        let record = Arc::new(SessionRecord::new(
            session_id.clone(),
            owner_id.to_string(),
            config.language,
            config.model,
            upstream,
            self.ttl,
        ));

        if let Err(err) = self.store.create(record.clone()) {
            // A v4 collision is not expected in practice, but a failed
            // insert must not leak the backend connection.
            if let Some(upstream) = record.take_upstream() {
                upstream.close().await;
            }
            return Err(err);
        }

        info!(
            session_id = %record.session_id,
            owner_id = %record.owner_id,
            language = %record.language,
            model = %record.model,
            "session started"
        );
        Ok(StartedSession {
            relay_path: format!("/api/v1/voice/session/{session_id}/ws"),
            session_id,
        })
    }

    /// Hands the upstream connection and the termination signal to the relay.
    pub fn attach(&self, id: &str) -> Result<(UpstreamHandle, CancellationToken), VoiceError> {
        let record = self.store.get(id)?;
        let upstream = record
            .take_upstream()
            .ok_or_else(|| VoiceError::AlreadyAttached(id.to_string()))?;
        Ok((upstream, record.cancel_token()))
    }

    /// Tears a session down. Idempotent: ending an unknown or already-ending
    /// session is success, and exactly one caller performs the teardown.
    pub async fn end_session(&self, id: &str) {
        let Ok(record) = self.store.get(id) else {
            return;
        };
        if !record.begin_ending() {
            // Another caller won the gate and owns the teardown.
            return;
        }
        let _ = self.store.update(record.clone());

        // Unblocks both relay loops wherever they are parked on a read.
        record.cancel_token().cancel();

        // If the relay attached, its pumps own the connection halves and
        // close them on cancellation; otherwise the handle is still here.
        if let Some(upstream) = record.take_upstream() {
            upstream.close().await;
        }

        record.mark_ended();
        self.store.delete(id);
        info!(session_id = %id, "session ended");
    }

    /// Ends every active session whose TTL has elapsed. Returns how many.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .store
            .list_active()
            .into_iter()
            .filter(|session| session.expires_at <= now)
            .map(|session| session.session_id)
            .collect();

        for id in &expired {
            warn!(session_id = %id, "session expired, forcing teardown");
            self.end_session(id).await;
        }
        expired.len()
    }

    /// Background task driving `sweep_expired` on a fixed interval.
    pub async fn run_expiry_sweep(self: Arc<Self>, every: std::time::Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_expired().await;
        }
    }
}

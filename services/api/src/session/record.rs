//! The per-session state record.
//!
//! A `SessionRecord` is created by the lifecycle manager only after the
//! upstream connection is established, so no observer can ever see a record
//! without a live backend connection behind it.

use crate::ws::transport::UpstreamHandle;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{
    Mutex,
    atomic::{AtomicU8, Ordering},
};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

/// Prefix for generated session ids.
pub const SESSION_ID_PREFIX: &str = "vsn_";

/// Session lifecycle state. Transitions only forward:
/// `Active -> Ending -> Ended`. `Ended` records are removed from the store,
/// never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SessionStatus {
    Active = 0,
    Ending = 1,
    Ended = 2,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionStatus::Active,
            1 => SessionStatus::Ending,
            _ => SessionStatus::Ended,
        }
    }
}

/// One active bridge between a caller and the speech backend.
///
/// The record exclusively owns the upstream connection for its lifetime;
/// `take_upstream` moves the handle out exactly once, either to the relay on
/// attach or to the lifecycle manager during an unattached teardown.
pub struct SessionRecord {
    pub session_id: String,
    pub owner_id: String,
    pub language: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    status: AtomicU8,
    upstream: Mutex<Option<UpstreamHandle>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("session_id", &self.session_id)
            .field("owner_id", &self.owner_id)
            .field("language", &self.language)
            .field("model", &self.model)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl SessionRecord {
    pub fn new(
        session_id: String,
        owner_id: String,
        language: String,
        model: String,
        upstream: UpstreamHandle,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            session_id,
            owner_id,
            language,
            model,
            created_at,
            expires_at: created_at + ttl,
            status: AtomicU8::new(SessionStatus::Active as u8),
            upstream: Mutex::new(Some(upstream)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// One-shot teardown gate: only the first caller to flip the record from
    /// `Active` to `Ending` runs the teardown sequence.
    pub fn begin_ending(&self) -> bool {
        self.status
            .compare_exchange(
                SessionStatus::Active as u8,
                SessionStatus::Ending as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn mark_ended(&self) {
        self.status
            .store(SessionStatus::Ended as u8, Ordering::SeqCst);
    }

    /// Moves the upstream connection out of the record. Returns `None` if it
    /// was already taken (relay attached, or teardown got there first).
    pub fn take_upstream(&self) -> Option<UpstreamHandle> {
        self.upstream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// The session's shared termination signal. Cancelling it makes both
    /// relay loops exit promptly, wherever they are blocked.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Point-in-time copy of the record's plain data, for diagnostics.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            owner_id: self.owner_id.clone(),
            language: self.language.clone(),
            model: self.model.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            status: self.status(),
        }
    }
}

/// Serializable view of a session record, detached from the live connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub owner_id: String,
    pub language: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[schema(value_type = String, example = "active")]
    pub status: SessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::transport::testing;

    fn record(ttl: Duration) -> SessionRecord {
        let (handle, _peer) = testing::upstream_pair();
        SessionRecord::new(
            "vsn_test".into(),
            "user-1".into(),
            "en".into(),
            "vaani-voice-1".into(),
            handle,
            ttl,
        )
    }

    #[test]
    fn status_only_moves_forward() {
        let rec = record(Duration::minutes(10));
        assert_eq!(rec.status(), SessionStatus::Active);
        assert!(rec.begin_ending());
        assert_eq!(rec.status(), SessionStatus::Ending);
        // Second teardown attempt loses the gate.
        assert!(!rec.begin_ending());
        rec.mark_ended();
        assert_eq!(rec.status(), SessionStatus::Ended);
        assert!(!rec.begin_ending());
    }

    #[test]
    fn upstream_handle_is_taken_at_most_once() {
        let rec = record(Duration::minutes(10));
        assert!(rec.take_upstream().is_some());
        assert!(rec.take_upstream().is_none());
    }

    #[test]
    fn expiry_is_based_on_ttl() {
        let rec = record(Duration::seconds(-1));
        assert!(rec.is_expired(Utc::now()));
        let rec = record(Duration::minutes(10));
        assert!(!rec.is_expired(Utc::now()));
    }
}

//! Domain error taxonomy for the voice relay.
//!
//! Creation-time errors surface synchronously to the HTTP caller; transport
//! errors during an active relay never do. Those are handled locally by
//! teardown and are only observable as the session disappearing.

/// Errors produced by session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Dial or handshake to the speech/AI backend failed. No session record
    /// exists for the attempt.
    #[error("upstream voice backend unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The session id is unknown or the session has already ended.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A freshly generated session id collided with a live one.
    #[error("session id already registered: {0}")]
    DuplicateSession(String),

    /// The session already has a relay running; a session accepts exactly
    /// one attached client connection for its lifetime.
    #[error("session already attached: {0}")]
    AlreadyAttached(String),
}

//! Session lifecycle: records, the concurrent registry, and the manager
//! that orchestrates creation, teardown, and expiry.

pub mod manager;
pub mod record;
pub mod store;

pub use manager::{SessionConfig, SessionManager, StartedSession};
pub use record::{SessionRecord, SessionSnapshot, SessionStatus};
pub use store::SessionStore;

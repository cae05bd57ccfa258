//! WebSocket relay engine.
//!
//! This module contains everything that moves frames for an active session:
//!
//! - `protocol`: the tagged control envelopes and the forward-or-drop policy.
//! - `transport`: the frame-level abstraction over both socket types.
//! - `upstream`: dialing the speech/AI backend.
//! - `relay`: the per-session pair of directional forwarding loops.

pub mod protocol;
pub mod relay;
pub mod transport;
pub mod upstream;

pub use relay::ws_attach_handler;

//! Vaani Voice Relay Library Crate
//!
//! This library contains all the core logic for the vaani voice service:
//! session lifecycle management, the concurrent session registry, the
//! upstream backend connector, the WebSocket relay engine, and the HTTP
//! boundary. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod session;
pub mod state;
pub mod ws;

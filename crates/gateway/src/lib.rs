//! Gateway: TLS HTTP/WebSocket server exposing registered extensions.
//!
//! Lifecycle:
//! 1. Build routes once from the extension registry snapshot
//! 2. `start()`: provision certificate, bind TLS listener, wire broadcasts
//! 3. Serve `/ping`, `/authenticate`, `/api/...`, `/api/ws`
//! 4. `stop()`: drop the listener and the active WebSocket set
//!
//! All domain logic lives in the extensions; the gateway only routes,
//! enforces bearer authorization, and fans broadcasts out to authorized
//! WebSocket clients.

pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    server::{Server, ServerConfig},
    state::GatewayState,
};

//! Authentication: rotating access code, token minting and verification.
//!
//! The gateway never stores issued tokens. A client trades the current
//! access code for a signed token (`AuthService::authenticate`), and every
//! later request is checked statelessly against the signature and expiry
//! (`AuthService::is_authorized`).

pub mod jwt;
pub mod service;

pub use {
    jwt::JsonWebToken,
    service::{AuthService, PASSWORD_LENGTH},
};

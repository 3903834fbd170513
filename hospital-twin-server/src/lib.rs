//! Thin axum HTTP/WebSocket surface over `hospital_twin_core`. See
//! `SPEC_FULL.md` at the workspace root §6 for the external interface this
//! crate implements.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod timefmt;
pub mod ws;

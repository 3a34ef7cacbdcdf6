//! Control-API client.
//!
//! Thin HTTP layer over the backend's session endpoints. The realtime
//! channel lives in [`crate::ws`]; everything request/response-shaped is
//! here.

mod client;
mod types;

pub use client::ApiClient;
pub use types::{
    CreateSessionResponse, EventsPage, RemoteStatus, ResolvedSession, RuntimeEndpoint,
    SessionDetailLegacy, SessionDetailV2, SessionPage, SessionSummary, StartSessionResponse,
};

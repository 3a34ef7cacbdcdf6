//! sesh - client for AI-agent session backends.
//!
//! The client owns the connection state machine against a remote agent
//! runtime: create a session, request compute, poll until the runtime is
//! routable, attach the realtime channel, stream normalized events, and
//! decide when a suspended session should be resumed.
//!
//! Control flows one way (caller -> [`session::SessionManager`] ->
//! [`ws::ConnectionHandle`]) and events flow one way (connection ->
//! normalizer -> caller). The [`session::RecoveryCoordinator`] sits beside
//! the manager and reacts only to user-intent signals, never to transport
//! failures.

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod ws;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::{
    RecoveryCoordinator, RecoveryDecision, RecoveryTrigger, Session, SessionManager, SessionStatus,
};
pub use ws::{ConnectionHandle, ConnectionSignal};

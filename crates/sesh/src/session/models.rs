//! Session data models.

use serde::{Deserialize, Serialize};

use crate::api::RuntimeEndpoint;

/// Client-side session status.
///
/// `Connected` exists only on this side of the wire: the backend never
/// reports it, it marks a live realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Allocated locally, nothing requested from the backend yet.
    Created,
    /// Backend call issued, runtime not yet routable.
    Starting,
    /// Runtime routable; realtime channel not yet attached.
    Ready,
    /// Realtime channel attached.
    Connected,
    /// Agent is working on a turn.
    Running,
    /// Agent finished a turn and waits for input.
    AwaitingInput,
    /// Compute suspended or torn down.
    Stopped,
    /// Conversation concluded.
    Finished,
    /// Unrecoverable failure.
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            SessionStatus::Created => "created",
            SessionStatus::Starting => "starting",
            SessionStatus::Ready => "ready",
            SessionStatus::Connected => "connected",
            SessionStatus::Running => "running",
            SessionStatus::AwaitingInput => "awaiting_input",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Finished => "finished",
            SessionStatus::Error => "error",
        };
        write!(f, "{}", word)
    }
}

/// One logical agent conversation plus its backend-allocated compute.
///
/// Owned exclusively by the lifecycle manager; everyone else gets clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque backend-allocated id; empty until `create()`.
    pub id: String,
    pub status: SessionStatus,
    /// Populated once the backend allocates a runtime.
    pub runtime_endpoint: Option<RuntimeEndpoint>,
    /// Sequence watermark for replay and history fetches.
    pub last_event_id: i64,
    /// Backend creation timestamp, RFC3339.
    pub created_at: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            status: SessionStatus::Created,
            runtime_endpoint: None,
            last_event_id: 0,
            created_at: None,
        }
    }

    /// A session shell for an already-known backend id (resume path).
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new()
        }
    }

    /// Whether user messages may be sent right now.
    pub fn can_send(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Connected | SessionStatus::Running | SessionStatus::AwaitingInput
        )
    }

    /// Whether the session counts as suspended for recovery purposes.
    pub fn is_suspended(&self) -> bool {
        matches!(self.status, SessionStatus::Stopped | SessionStatus::Finished)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

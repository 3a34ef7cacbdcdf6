//! Control-API request/response types.
//!
//! The backend has two generations of session representation: the newer
//! scheme reports `execution_status` + `sandbox_status`, the older scheme a
//! single `status` field. Both vocabularies normalize to [`RemoteStatus`]
//! before any lifecycle decision is made.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sesh_protocol::WireEvent;

/// Backend-side session status, normalized across both schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Compute is up and the agent is working (or still coming up).
    Running,
    /// Compute is up, agent is waiting for user input.
    AwaitingInput,
    /// Compute is suspended, paused, or finished. Resumable.
    Stopped,
    /// The backend reported a failure.
    Error,
}

impl RemoteStatus {
    /// Parse a raw status word from either vocabulary.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "awaiting_input" | "awaiting_user_input" | "awaiting-input" | "waiting_for_input" => {
                RemoteStatus::AwaitingInput
            }
            "error" | "failed" | "crashed" => RemoteStatus::Error,
            // Only explicitly suspended words count as suspended; they are
            // what gates a resume call.
            "paused" | "stopped" | "finished" => RemoteStatus::Stopped,
            // running, starting, created, and anything unrecognized: the
            // compute is up or still coming up. Never suspended, so an
            // unknown word can never trigger a spurious resume.
            _ => RemoteStatus::Running,
        }
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteStatus::Running => write!(f, "running"),
            RemoteStatus::AwaitingInput => write!(f, "awaiting_input"),
            RemoteStatus::Stopped => write!(f, "stopped"),
            RemoteStatus::Error => write!(f, "error"),
        }
    }
}

/// Where the allocated runtime can be reached, plus its short-lived
/// credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEndpoint {
    pub url: String,
    pub credential: String,
}

/// Session detail under the newer scheme.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetailV2 {
    pub id: String,
    pub execution_status: String,
    #[serde(default)]
    pub sandbox_status: Option<String>,
    #[serde(default)]
    pub runtime_endpoint: Option<String>,
    #[serde(default, alias = "session_api_key")]
    pub credential: Option<String>,
}

/// Session detail under the older scheme: one status field.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetailLegacy {
    pub id: String,
    pub status: String,
    #[serde(default, alias = "runtime_url")]
    pub runtime_endpoint: Option<String>,
    #[serde(default, alias = "session_api_key")]
    pub credential: Option<String>,
}

/// A session's backend representation after scheme resolution and status
/// normalization.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub id: String,
    pub status: RemoteStatus,
    pub endpoint: Option<RuntimeEndpoint>,
}

impl ResolvedSession {
    /// Runtime-ready condition: agent reachable AND a routable endpoint with
    /// credential is present.
    pub fn is_ready(&self) -> bool {
        matches!(
            self.status,
            RemoteStatus::Running | RemoteStatus::AwaitingInput
        ) && self.endpoint.is_some()
    }

    /// Whether the underlying compute is suspended and needs a resume call.
    pub fn is_suspended(&self) -> bool {
        self.status == RemoteStatus::Stopped
    }
}

impl From<SessionDetailV2> for ResolvedSession {
    fn from(detail: SessionDetailV2) -> Self {
        // A paused/stopped sandbox overrides whatever the execution status
        // claims; the agent cannot be reachable without its compute.
        let status = match detail.sandbox_status.as_deref() {
            Some(sandbox) if RemoteStatus::parse(sandbox) == RemoteStatus::Stopped => {
                RemoteStatus::Stopped
            }
            _ => RemoteStatus::parse(&detail.execution_status),
        };
        let endpoint = zip_endpoint(detail.runtime_endpoint, detail.credential);
        Self {
            id: detail.id,
            status,
            endpoint,
        }
    }
}

impl From<SessionDetailLegacy> for ResolvedSession {
    fn from(detail: SessionDetailLegacy) -> Self {
        Self {
            id: detail.id,
            status: RemoteStatus::parse(&detail.status),
            endpoint: zip_endpoint(detail.runtime_endpoint, detail.credential),
        }
    }
}

fn zip_endpoint(url: Option<String>, credential: Option<String>) -> Option<RuntimeEndpoint> {
    match (url, credential) {
        (Some(url), Some(credential)) => Some(RuntimeEndpoint { url, credential }),
        _ => None,
    }
}

/// Response from session creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub created_at: String,
    pub status: String,
}

/// Response from the start call.
#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionResponse {
    pub status: String,
}

/// One page of historical events.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsPage {
    pub events: Vec<WireEvent>,
    #[serde(default)]
    pub has_more: bool,
}

/// Summary entry from the session list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One page of the session list.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPage {
    pub sessions: Vec<SessionSummary>,
    #[serde(default)]
    pub has_more: bool,
}

/// Error body shape used by the backend.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Start-session request body.
#[derive(Debug, Serialize)]
pub struct StartSessionRequest {
    pub providers: Vec<Value>,
}

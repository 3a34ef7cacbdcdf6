//! Outbound user actions.
//!
//! These are the only two message shapes the client ever sends over the
//! realtime channel.

use serde::{Deserialize, Serialize};

/// An action sent from the client to the agent.
///
/// Serializes as `{"action": "...", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum UserAction {
    /// A user chat message.
    Message { content: String },
    /// Signal the agent to change state (e.g. start running after the first
    /// message of a turn).
    ChangeAgentState { agent_state: String },
}

impl UserAction {
    pub fn message(content: impl Into<String>) -> Self {
        UserAction::Message {
            content: content.into(),
        }
    }

    /// The run trigger sent after the settle delay.
    pub fn run() -> Self {
        UserAction::ChangeAgentState {
            agent_state: "running".to_string(),
        }
    }
}

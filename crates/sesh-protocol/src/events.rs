//! Canonical event types.
//!
//! A `CanonicalEvent` is the normalized, typed representation every
//! downstream consumer works with. It is produced only by the normalizer and
//! immutable once constructed; the original wire payload rides along in `raw`
//! for debugging.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRole {
    User,
    Agent,
    System,
}

impl EventRole {
    /// Map a wire `source` field to a role. Anything unrecognized (the
    /// environment, stat emitters, missing field) is attributed to the system.
    pub fn from_source(source: Option<&str>) -> Self {
        match source {
            Some("user") => EventRole::User,
            Some("agent") => EventRole::Agent,
            _ => EventRole::System,
        }
    }
}

/// What kind of content an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Thought,
    ToolCall,
    ToolResult,
    FileWrite,
    StateChange,
}

/// How a file change came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Modify,
}

/// A file write/edit surfaced as a side channel next to any text result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    /// Workspace-relative path of the touched file.
    pub path: String,
    /// New content (full file for creates, inserted/replacement text for edits).
    pub content: String,
    pub operation: FileOperation,
}

/// A normalized event. `id` is monotonic per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: i64,
    pub role: EventRole,
    pub kind: EventKind,
    /// Display text; empty for pure file-write events.
    pub text: String,
    /// Present only for `EventKind::FileWrite`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_change: Option<FileChange>,
    /// Original wire payload, retained for debugging.
    pub raw: Value,
}

impl CanonicalEvent {
    pub fn new(id: i64, role: EventRole, kind: EventKind, text: String, raw: Value) -> Self {
        Self {
            id,
            role,
            kind,
            text,
            file_change: None,
            raw,
        }
    }

    pub fn file_write(id: i64, role: EventRole, change: FileChange, raw: Value) -> Self {
        Self {
            id,
            role,
            kind: EventKind::FileWrite,
            text: String::new(),
            file_change: Some(change),
            raw,
        }
    }
}

//! Wire-event normalization.
//!
//! Maps raw payloads from either schema generation into canonical events.
//! Text resolution is fixed and first-match-wins; a rule only matches when it
//! actually yields text, otherwise resolution falls through to the next rule.
//! Events with no resolvable text (state transitions, heartbeats, stat
//! events) normalize to `None` and are dropped by callers without error.
//!
//! File writes are a side channel: they are surfaced as a distinct
//! `FileWrite` event in addition to any text result, even when the payload
//! produced no display text.

use std::collections::HashSet;

use serde_json::Value;

use crate::events::{CanonicalEvent, EventKind, EventRole, FileChange, FileOperation};
use crate::wire::WireEvent;

/// Normalize a wire event into its text representation, if it has one.
pub fn normalize(event: &WireEvent) -> Option<CanonicalEvent> {
    let (kind, text) = resolve_text(event)?;
    Some(CanonicalEvent::new(
        event.id(),
        EventRole::from_source(event.source()),
        kind,
        text,
        event.raw().clone(),
    ))
}

/// Extract the file-write side channel, if the event carries one.
///
/// `known_paths` is the set of paths the caller has already seen locally;
/// edit sub-commands against an unknown path degrade to a create rather than
/// failing.
pub fn file_change(event: &WireEvent, known_paths: &HashSet<String>) -> Option<CanonicalEvent> {
    let change = legacy_write(event).or_else(|| structured_edit(event, known_paths))?;
    Some(CanonicalEvent::file_write(
        event.id(),
        EventRole::from_source(event.source()),
        change,
        event.raw().clone(),
    ))
}

/// Normalize text and file-write channels together (at most two events).
pub fn normalize_full(event: &WireEvent, known_paths: &HashSet<String>) -> Vec<CanonicalEvent> {
    let mut out = Vec::with_capacity(2);
    if let Some(text_event) = normalize(event) {
        out.push(text_event);
    }
    if let Some(write_event) = file_change(event, known_paths) {
        out.push(write_event);
    }
    out
}

/// Fixed resolution order: reasoning, tool command, tool result, legacy
/// finish outputs, legacy message action, direct message field, direct
/// content field, legacy think action, extras content.
fn resolve_text(event: &WireEvent) -> Option<(EventKind, String)> {
    // Generation B: reasoning content.
    if let Some(text) = non_empty(event.str_at("/reasoning_content")) {
        return Some((EventKind::Thought, text));
    }

    // Generation B: structured action carrying a command.
    if event.action_object().is_some() {
        if let Some(text) = non_empty(event.str_at("/action/command")) {
            return Some((EventKind::ToolCall, text));
        }
    }

    // Generation B: structured observation content blocks.
    if let Some(text) = non_empty(event.str_at("/observation/content/0/text")) {
        return Some((EventKind::ToolResult, text));
    }

    // Generation A: finish action outputs.
    if event.action_name() == Some("finish") {
        if let Some(text) = non_empty(event.str_at("/args/outputs/content")) {
            return Some((EventKind::Message, text));
        }
    }

    // Generation A: message action.
    if event.action_name() == Some("message") {
        if let Some(text) = non_empty(event.str_at("/args/content")) {
            return Some((EventKind::Message, text));
        }
    }

    // Direct message field.
    if let Some(text) = non_empty(event.str_at("/message")) {
        return Some((EventKind::Message, text));
    }

    // Direct content field.
    if let Some(text) = non_empty(event.str_at("/content")) {
        return Some((EventKind::Message, text));
    }

    // Generation A: think action.
    if event.action_name() == Some("think") {
        if let Some(text) = non_empty(event.str_at("/args/thought")) {
            return Some((EventKind::Thought, text));
        }
    }

    // Last resort: extras content on observations.
    if let Some(text) = non_empty(event.str_at("/extras/content")) {
        return Some((EventKind::Message, text));
    }

    None
}

/// Generation A `write` action: full file content at a path.
fn legacy_write(event: &WireEvent) -> Option<FileChange> {
    if event.action_name() != Some("write") {
        return None;
    }
    let path = event.str_at("/args/path")?.to_string();
    let content = event.str_at("/args/content").unwrap_or_default().to_string();
    Some(FileChange {
        path,
        content,
        operation: FileOperation::Create,
    })
}

/// Generation B edit tool-call embedded in tool-call metadata.
///
/// The editor tool arrives as a model tool call whose `arguments` field is a
/// JSON string with `command` (create/str_replace/insert), `path`, and the
/// new text.
fn structured_edit(event: &WireEvent, known_paths: &HashSet<String>) -> Option<FileChange> {
    let function = event.value_at(
        "/tool_call_metadata/model_response/choices/0/message/tool_calls/0/function",
    )?;
    let name = function.get("name").and_then(Value::as_str)?;
    if !name.contains("str_replace_editor") && !name.contains("edit") {
        return None;
    }

    let arguments: Value =
        serde_json::from_str(function.get("arguments").and_then(Value::as_str)?).ok()?;
    let command = arguments.get("command").and_then(Value::as_str)?;
    let path = arguments.get("path").and_then(Value::as_str)?.to_string();

    let (content, operation) = match command {
        "create" => (
            arguments
                .get("file_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            FileOperation::Create,
        ),
        "str_replace" | "insert" => {
            let content = arguments
                .get("new_str")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            // An edit against a path we have never seen locally is treated
            // as a create.
            let operation = if known_paths.contains(&path) {
                FileOperation::Modify
            } else {
                FileOperation::Create
            };
            (content, operation)
        }
        _ => return None,
    };

    Some(FileChange {
        path,
        content,
        operation,
    })
}

fn non_empty(text: Option<&str>) -> Option<String> {
    match text {
        Some(t) if !t.is_empty() => Some(t.to_string()),
        _ => None,
    }
}

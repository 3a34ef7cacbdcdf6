//! Raw wire events.
//!
//! A `WireEvent` is whatever JSON object the backend pushed over the realtime
//! channel. There are two schema generations in the wild:
//!
//! - Generation A ("legacy"): discriminates on `action`/`observation` string
//!   fields, with message text under `args.content`, `message`, or `content`.
//! - Generation B ("current"): discriminates on the presence of
//!   `reasoning_content`, an `action` object carrying `command`, or
//!   `observation.content[0].text`.
//!
//! The payload stays untyped; accessors here only inspect structure. Nominal
//! type information is never trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An untyped event as received from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireEvent(pub Value);

impl WireEvent {
    /// Wrap a raw JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw payload.
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Sequence id assigned by the backend, 0 when absent.
    pub fn id(&self) -> i64 {
        self.0.get("id").and_then(Value::as_i64).unwrap_or(0)
    }

    /// The `source` field (`user`, `agent`, `environment`, ...).
    pub fn source(&self) -> Option<&str> {
        self.0.get("source").and_then(Value::as_str)
    }

    /// Generation A action name, when `action` is a plain string.
    pub fn action_name(&self) -> Option<&str> {
        self.0.get("action").and_then(Value::as_str)
    }

    /// Generation B action object, when `action` is structured.
    pub fn action_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.get("action").and_then(Value::as_object)
    }

    /// Look up a string at a JSON pointer (e.g. `/args/content`).
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.0.pointer(pointer).and_then(Value::as_str)
    }

    /// Look up any value at a JSON pointer.
    pub fn value_at(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }
}

impl From<Value> for WireEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

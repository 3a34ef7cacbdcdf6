//! Realtime channel types.

use sesh_protocol::WireEvent;

/// Where to dial the realtime channel.
///
/// The base URL is either the main API host or, once a runtime is
/// allocated, the runtime's own host and path prefix. The short-lived
/// credential travels as a query parameter because not every transport
/// supports custom headers on the initial handshake.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub base_url: String,
    pub session_id: String,
    pub credential: String,
    /// Replay watermark; events after this id are redelivered on attach.
    pub last_event_id: Option<i64>,
}

impl ConnectTarget {
    /// Full websocket URL for the handshake.
    pub fn handshake_url(&self) -> String {
        let mut base = ws_scheme(&self.base_url);
        while base.ends_with('/') {
            base.pop();
        }
        let mut url = format!(
            "{}/ws/sessions/{}?credential={}",
            base,
            self.session_id,
            urlencoding::encode(&self.credential)
        );
        if let Some(id) = self.last_event_id {
            url.push_str(&format!("&latest_event_id={}", id));
        }
        url
    }
}

/// Swap an http(s) scheme for ws(s); pass ws(s) URLs through.
fn ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{}", url)
    }
}

/// What subscribers receive from the connection.
#[derive(Debug, Clone)]
pub enum ConnectionSignal {
    /// Synthetic signal emitted once the handshake completes, before any
    /// wire event.
    Connected,
    /// An inbound wire event (either schema generation).
    Event(WireEvent),
    /// Mid-session transport failure. Logged by the owner; never triggers
    /// recovery.
    Error(String),
    /// The channel closed.
    Closed { reason: String },
}

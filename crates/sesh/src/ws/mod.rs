//! Realtime connection to a session's event channel.
//!
//! One live [`ConnectionHandle`] per session; a reconnect produces a new
//! handle, the old one is never mutated. Inbound frames are dispatched
//! synchronously to subscribers in registration order; outbound sends are
//! fire-and-forget.

mod connection;
mod subscribers;
mod types;

pub use connection::{connect, ConnectionHandle};
pub use subscribers::{SubscriberSet, SubscriptionId};
pub use types::{ConnectTarget, ConnectionSignal};

//! Protocol types for the sesh agent-session client.
//!
//! The backend speaks two generations of wire format over the realtime
//! channel. This crate decodes both into one canonical event representation
//! so downstream consumers never see the difference. Everything here is pure
//! data: no I/O, no async.

pub mod actions;
pub mod events;
pub mod normalize;
pub mod wire;

pub use actions::UserAction;
pub use events::{CanonicalEvent, EventKind, EventRole, FileChange, FileOperation};
pub use normalize::{file_change, normalize, normalize_full};
pub use wire::WireEvent;

//! Session lifecycle and recovery.

mod manager;
mod models;
mod recovery;

pub use manager::SessionManager;
pub use models::{Session, SessionStatus};
pub use recovery::{
    RecoveryCoordinator, RecoveryDecision, RecoveryGuard, RecoveryTrigger, SkipReason,
};

//! Recovery coordinator.
//!
//! Decides whether a suspended session should be resumed. Only two triggers
//! are legitimate: the initial mount of a session whose cached status is
//! suspended, and the host UI regaining foreground visibility. A transport
//! disconnect is deliberately NOT a trigger: backend suspension after
//! inactivity is an intended cost-control behavior, and resuming must always
//! originate from an observable user-intent signal.
//!
//! The in-flight guard is the core invariant: at most one resume per session
//! id at a time, even with interleaved evaluations from both triggers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::ClientResult;

use super::models::SessionStatus;

/// The user-intent signal that started an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTrigger {
    /// First mount/navigation to the session.
    InitialLoad,
    /// The host UI came back to the foreground.
    TabFocus,
}

/// Why an evaluation declined to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A resume for this session id is already in flight.
    AlreadyInFlight,
    /// Initial load already fired for this id during this mount.
    AlreadyEvaluatedThisMount,
    /// Cached status says the session is not suspended.
    CachedStatusNotStopped,
    /// Freshly fetched status says the session is not suspended.
    FreshStatusNotStopped,
}

/// Outcome of an evaluation.
#[derive(Debug)]
pub enum RecoveryDecision {
    /// Proceed with a resume. The guard occupies the session's in-flight
    /// slot; drop it when the resume attempt settles, success or not.
    Resume(RecoveryGuard),
    Skip(SkipReason),
}

/// RAII occupation of a session's in-flight slot.
#[derive(Debug)]
pub struct RecoveryGuard {
    session_id: String,
    slots: Arc<DashMap<String, RecoveryTrigger>>,
}

impl Drop for RecoveryGuard {
    fn drop(&mut self) {
        self.slots.remove(&self.session_id);
        debug!(session_id = %self.session_id, "recovery slot released");
    }
}

/// Evaluates resume requests, keyed by session id.
pub struct RecoveryCoordinator {
    api: Arc<ApiClient>,
    in_flight: Arc<DashMap<String, RecoveryTrigger>>,
    /// Ids whose initial-load trigger already fired this mount.
    mounted: StdMutex<HashSet<String>>,
}

impl RecoveryCoordinator {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            in_flight: Arc::new(DashMap::new()),
            mounted: StdMutex::new(HashSet::new()),
        }
    }

    /// Decide whether `session_id` should be resumed.
    ///
    /// The tab-focus path never trusts `cached_status`: it may have gone
    /// stale while the UI was backgrounded, so a fresh status is fetched and
    /// only a suspended result proceeds.
    pub async fn evaluate(
        &self,
        session_id: &str,
        cached_status: SessionStatus,
        trigger: RecoveryTrigger,
    ) -> ClientResult<RecoveryDecision> {
        if self.in_flight.contains_key(session_id) {
            return Ok(RecoveryDecision::Skip(SkipReason::AlreadyInFlight));
        }

        match trigger {
            RecoveryTrigger::InitialLoad => {
                let first_evaluation = self
                    .mounted
                    .lock()
                    .expect("mount set poisoned")
                    .insert(session_id.to_string());
                if !first_evaluation {
                    return Ok(RecoveryDecision::Skip(SkipReason::AlreadyEvaluatedThisMount));
                }
                if !matches!(
                    cached_status,
                    SessionStatus::Stopped | SessionStatus::Finished
                ) {
                    return Ok(RecoveryDecision::Skip(SkipReason::CachedStatusNotStopped));
                }
            }
            RecoveryTrigger::TabFocus => {
                let fresh = self.api.resolve_session(session_id).await?;
                if !fresh.is_suspended() {
                    debug!(
                        session_id,
                        status = %fresh.status,
                        "fresh status not suspended, skipping resume"
                    );
                    return Ok(RecoveryDecision::Skip(SkipReason::FreshStatusNotStopped));
                }
            }
        }

        // Atomic claim: interleaved evaluations race here and exactly one
        // wins the slot.
        match self.in_flight.entry(session_id.to_string()) {
            Entry::Occupied(_) => Ok(RecoveryDecision::Skip(SkipReason::AlreadyInFlight)),
            Entry::Vacant(vacant) => {
                vacant.insert(trigger);
                info!(session_id, ?trigger, "resume approved");
                Ok(RecoveryDecision::Resume(RecoveryGuard {
                    session_id: session_id.to_string(),
                    slots: Arc::clone(&self.in_flight),
                }))
            }
        }
    }

    /// Re-arm the initial-load trigger for an id (navigation away).
    pub fn reset_mount(&self, session_id: &str) {
        self.mounted
            .lock()
            .expect("mount set poisoned")
            .remove(session_id);
    }

    /// Whether a resume is currently in flight for an id.
    pub fn is_in_flight(&self, session_id: &str) -> bool {
        self.in_flight.contains_key(session_id)
    }
}

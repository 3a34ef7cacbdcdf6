//! Session lifecycle manager.
//!
//! Drives the create -> start -> poll-until-ready -> connect ->
//! (resume-after-suspend) -> stop state machine. Readiness polling retries
//! on transient errors inside a wall-clock budget; the realtime handshake
//! has its own budget and is not retried here once spent.
//!
//! An epoch counter guards against superseded work: teardown and new
//! lifecycle operations bump it, and in-flight poll loops abandon their
//! result when the epoch they captured has moved on. Identity, not a
//! boolean, so rapid re-navigation cannot revive a stale attempt.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sesh_protocol::{CanonicalEvent, EventKind, EventRole, UserAction, normalize_full};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::ws::{self, ConnectTarget, ConnectionHandle, ConnectionSignal, SubscriptionId};

use super::models::{Session, SessionStatus};

/// How many historical events one fallback fetch asks for.
const HISTORY_FETCH_LIMIT: u32 = 100;

/// A turn's event collector: subscribed when the user message goes out,
/// unsubscribed when the turn completes.
struct TurnCycle {
    rx: mpsc::UnboundedReceiver<CanonicalEvent>,
    subscription: SubscriptionId,
}

/// Owns one [`Session`] and its realtime connection.
pub struct SessionManager {
    api: Arc<ApiClient>,
    config: ClientConfig,
    session: Session,
    connection: Option<ConnectionHandle>,
    epoch: Arc<AtomicU64>,
    /// Paths already seen locally; edits against anything else degrade to
    /// creates during normalization.
    known_paths: Arc<StdMutex<HashSet<String>>>,
    turn: Option<TurnCycle>,
    sent_first_message: bool,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>, config: ClientConfig) -> Self {
        Self {
            api,
            config,
            session: Session::new(),
            connection: None,
            epoch: Arc::new(AtomicU64::new(0)),
            known_paths: Arc::new(StdMutex::new(HashSet::new())),
            turn: None,
            sent_first_message: false,
        }
    }

    /// Read-only view of the managed session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Allocate a backend session id.
    pub async fn create(&mut self) -> ClientResult<&Session> {
        if !self.session.id.is_empty() {
            return Err(ClientError::IllegalState(
                "session already created; use a fresh manager".into(),
            ));
        }
        let created = self.api.create_session().await?;
        info!(session_id = %created.id, "session created");
        self.session.id = created.id;
        self.session.created_at = Some(created.created_at);
        self.session.status = SessionStatus::Starting;
        Ok(&self.session)
    }

    /// Request runtime allocation, then poll until the runtime is routable.
    ///
    /// `ReadinessTimeout` is reported, not fatal: the caller may surface a
    /// retry or proceed best-effort with whatever state is present.
    pub async fn start(&mut self) -> ClientResult<()> {
        self.require_session_id()?;
        self.api.start_session(&self.session.id).await?;
        self.session.status = SessionStatus::Starting;
        self.wait_until_ready().await
    }

    /// Poll the backend at a fixed interval inside a wall-clock budget until
    /// the runtime-ready condition holds. Transient fetch failures are
    /// swallowed and retried.
    async fn wait_until_ready(&mut self) -> ClientResult<()> {
        let entry_epoch = self.epoch.load(Ordering::SeqCst);
        let start = Instant::now();
        let budget = self.config.readiness_budget();
        let interval = self.config.poll_interval();

        loop {
            if self.epoch.load(Ordering::SeqCst) != entry_epoch {
                return Err(ClientError::IllegalState(
                    "readiness poll superseded by a newer lifecycle operation".into(),
                ));
            }

            match self.api.resolve_session(&self.session.id).await {
                Ok(resolved) if resolved.is_ready() => {
                    // Endpoint and credential come from this same response;
                    // nothing from earlier polls is reused.
                    self.session.runtime_endpoint = resolved.endpoint;
                    self.session.status = SessionStatus::Ready;
                    debug!(
                        session_id = %self.session.id,
                        waited = ?start.elapsed(),
                        "runtime ready"
                    );
                    return Ok(());
                }
                Ok(resolved) => {
                    debug!(
                        session_id = %self.session.id,
                        status = %resolved.status,
                        "runtime not ready yet"
                    );
                }
                Err(err) if err.is_transient() => {
                    warn!(session_id = %self.session.id, error = %err, "readiness poll failed, retrying");
                }
                Err(err) => {
                    self.session.status = SessionStatus::Error;
                    return Err(err);
                }
            }

            if start.elapsed() >= budget {
                return Err(ClientError::ReadinessTimeout {
                    waited_secs: start.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Attach the realtime channel to the resolved runtime endpoint.
    pub async fn connect(&mut self) -> ClientResult<()> {
        self.require_session_id()?;
        let endpoint = self.session.runtime_endpoint.clone().ok_or_else(|| {
            ClientError::IllegalState("connect requires a resolved runtime endpoint".into())
        })?;

        let target = ConnectTarget {
            base_url: endpoint.url,
            session_id: self.session.id.clone(),
            credential: endpoint.credential,
            last_event_id: (self.session.last_event_id > 0).then_some(self.session.last_event_id),
        };

        let session_id = self.session.id.clone();
        let attempt = ws::connect(
            &target,
            self.config.connect_timeout(),
            move |signal| match signal {
                ConnectionSignal::Error(err) => {
                    // Logged only. A transport failure is never a recovery
                    // trigger; suspension after inactivity is intended
                    // backend behavior.
                    warn!(session_id = %session_id, error = %err, "transport error");
                }
                ConnectionSignal::Closed { reason } => {
                    info!(session_id = %session_id, reason = %reason, "realtime channel closed");
                }
                _ => {}
            },
        )
        .await;

        let handle = match attempt {
            Ok(handle) => handle,
            Err(err) => {
                self.session.status = SessionStatus::Error;
                return Err(err);
            }
        };

        self.connection = Some(handle);
        self.session.status = SessionStatus::Connected;
        Ok(())
    }

    /// Send one user message. Exactly one send per call; sequencing is the
    /// caller's responsibility.
    ///
    /// The first message of a session is followed, after a settle delay, by
    /// the run trigger, so the backend does not process the trigger before
    /// the message write lands.
    pub async fn send_message(&mut self, content: &str) -> ClientResult<()> {
        if !self.session.can_send() {
            return Err(ClientError::IllegalState(format!(
                "cannot send while session is {}",
                self.session.status
            )));
        }
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| ClientError::IllegalState("no live connection".into()))?;

        // Subscribe the turn collector before the send so nothing is missed.
        if self.turn.is_none() {
            let (tx, rx) = mpsc::unbounded_channel();
            let known_paths = Arc::clone(&self.known_paths);
            let subscription = connection.subscribe(Arc::new(move |signal| {
                if let ConnectionSignal::Event(wire) = signal {
                    let mut paths = known_paths.lock().expect("known paths poisoned");
                    for event in normalize_full(wire, &paths) {
                        if let Some(change) = &event.file_change {
                            paths.insert(change.path.clone());
                        }
                        let _ = tx.send(event);
                    }
                }
            }));
            self.turn = Some(TurnCycle { rx, subscription });
        }

        connection.send(&UserAction::message(content))?;

        if !self.sent_first_message {
            self.sent_first_message = true;
            tokio::time::sleep(self.config.run_trigger_delay()).await;
            if let Some(connection) = self.connection.as_ref() {
                connection.send(&UserAction::run())?;
            }
        }
        self.session.status = SessionStatus::Running;
        Ok(())
    }

    /// Collect the current turn's canonical events until the agent's final
    /// message arrives.
    ///
    /// If the turn ends with no content collected, whether by content
    /// timeout or because the event channel closed, a one-time fallback
    /// fetch of historical events runs before the turn completes with
    /// whatever content (possibly none) was found. Fallback failures are
    /// swallowed.
    pub async fn wait_for_turn(&mut self) -> ClientResult<Vec<CanonicalEvent>> {
        let mut turn = self
            .turn
            .take()
            .ok_or_else(|| ClientError::IllegalState("no turn in progress".into()))?;

        let mut collected = Vec::new();
        loop {
            match tokio::time::timeout(self.config.turn_content_timeout(), turn.rx.recv()).await {
                Ok(Some(event)) => {
                    self.session.last_event_id = self.session.last_event_id.max(event.id);
                    let terminal =
                        event.kind == EventKind::Message && event.role == EventRole::Agent;
                    collected.push(event);
                    if terminal {
                        break;
                    }
                }
                Ok(None) => {
                    self.backfill_if_empty(&mut collected).await;
                    break;
                }
                Err(_elapsed) => {
                    self.backfill_if_empty(&mut collected).await;
                    break;
                }
            }
        }

        if let Some(connection) = self.connection.as_ref() {
            connection.unsubscribe(turn.subscription);
        }
        self.session.status = SessionStatus::AwaitingInput;
        Ok(collected)
    }

    /// Run the history fallback for a turn that produced nothing.
    async fn backfill_if_empty(&mut self, collected: &mut Vec<CanonicalEvent>) {
        if !collected.is_empty() {
            return;
        }
        match self.fetch_history_fallback().await {
            Ok(events) => collected.extend(events),
            Err(err) => {
                warn!(
                    session_id = %self.session.id,
                    error = %err,
                    "history fallback failed, completing turn empty"
                );
            }
        }
    }

    /// One-time plain-HTTP history fetch used when the realtime channel
    /// stays silent for a whole turn.
    async fn fetch_history_fallback(&mut self) -> ClientResult<Vec<CanonicalEvent>> {
        debug!(session_id = %self.session.id, "turn silent, fetching history");
        let page = self
            .api
            .fetch_events(
                &self.session.id,
                self.session.last_event_id,
                HISTORY_FETCH_LIMIT,
            )
            .await
            .map_err(|err| ClientError::HistoryFetchFailed(err.to_string()))?;

        let mut events = Vec::new();
        let paths = self.known_paths.lock().expect("known paths poisoned");
        for wire in &page.events {
            events.extend(normalize_full(wire, &paths));
        }
        drop(paths);
        for event in &events {
            self.session.last_event_id = self.session.last_event_id.max(event.id);
        }
        Ok(events)
    }

    /// Reactivate a previously suspended session: resolve its backend
    /// representation (newer scheme first, older scheme as fallback), resume
    /// the compute when it is paused, re-poll readiness, reconnect.
    pub async fn resume(&mut self, session_id: &str) -> ClientResult<()> {
        self.teardown_connection();
        self.session = Session::with_id(session_id);
        self.sent_first_message = false;

        let resolved = self.api.resolve_session(session_id).await?;
        if resolved.is_suspended() {
            info!(session_id, "compute suspended, requesting resume");
            self.api.resume_session(session_id).await?;
        }

        self.session.status = SessionStatus::Starting;
        self.wait_until_ready().await?;
        self.connect().await
    }

    /// Stop the session. Idempotent: once stopped, further calls do nothing
    /// and no second backend stop is issued.
    pub async fn stop(&mut self) -> ClientResult<()> {
        if self.session.status == SessionStatus::Stopped {
            return Ok(());
        }
        self.teardown_connection();

        if !self.session.id.is_empty() {
            if let Err(err) = self.api.stop_session(&self.session.id).await {
                // Local state still moves to Stopped; the backend reconciles
                // on its own schedule.
                warn!(session_id = %self.session.id, error = %err, "backend stop failed");
            }
        }
        self.session.status = SessionStatus::Stopped;
        Ok(())
    }

    /// Drop the connection and invalidate in-flight polls.
    fn teardown_connection(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.turn = None;
        if let Some(connection) = self.connection.take() {
            connection.disconnect();
        }
    }

    fn require_session_id(&self) -> ClientResult<()> {
        if self.session.id.is_empty() {
            return Err(ClientError::IllegalState(
                "no session id; call create() first".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session.id)
            .field("status", &self.session.status)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

//! Websocket connection to the event channel.
//!
//! Dialing retries with linear backoff inside the handshake budget; once the
//! budget is spent the attempt fails with `ConnectionTimeout` and is not
//! retried here. Retry-after-failure is the lifecycle manager's call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use sesh_protocol::UserAction;

use crate::error::{ClientError, ClientResult};

use super::subscribers::{SignalHandler, SubscriberSet, SubscriptionId};
use super::types::{ConnectTarget, ConnectionSignal};

/// Outbound send buffer; sends are fire-and-forget, a full buffer is a
/// transport error rather than backpressure.
const OUTBOUND_BUFFER_SIZE: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live realtime channel for one session.
///
/// Replaced, never mutated, on reconnect; its lifetime is bounded by the
/// owning session's.
pub struct ConnectionHandle {
    outbound: mpsc::Sender<String>,
    subscribers: Arc<SubscriberSet>,
    shutdown: watch::Sender<bool>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Register a signal subscriber.
    pub fn subscribe(&self, handler: SignalHandler) -> SubscriptionId {
        self.subscribers.subscribe(handler)
    }

    /// Remove a signal subscriber; unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }

    /// Queue an outbound action. Returns as soon as the frame is buffered;
    /// no acknowledgment is awaited.
    pub fn send(&self, action: &UserAction) -> ClientResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection is closed".into()));
        }
        let frame = serde_json::to_string(action)
            .map_err(|e| ClientError::Transport(format!("serializing action: {}", e)))?;
        self.outbound
            .try_send(frame)
            .map_err(|e| ClientError::Transport(format!("queueing frame: {}", e)))
    }

    /// Tear the channel down. Idempotent.
    pub fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("disconnecting realtime channel");
            let _ = self.shutdown.send(true);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("closed", &self.is_closed())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Dial the realtime channel and complete the handshake within `budget`.
///
/// `on_signal` is registered before anything is dispatched, so it observes
/// the synthetic [`ConnectionSignal::Connected`] that precedes all wire
/// events.
pub async fn connect<F>(
    target: &ConnectTarget,
    budget: Duration,
    on_signal: F,
) -> ClientResult<ConnectionHandle>
where
    F: Fn(&ConnectionSignal) + Send + Sync + 'static,
{
    let url = target.handshake_url();
    let stream = dial(&url, budget).await?;
    info!(session_id = %target.session_id, "realtime channel established");

    let subscribers = Arc::new(SubscriberSet::new());
    subscribers.subscribe(Arc::new(on_signal));
    // Synthetic connected signal, before the reader can deliver anything.
    subscribers.dispatch(&ConnectionSignal::Connected);

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let closed = Arc::new(AtomicBool::new(false));

    let (sink, source) = stream.split();
    tokio::spawn(writer_task(
        sink,
        outbound_rx,
        shutdown_rx.clone(),
        Arc::clone(&subscribers),
    ));
    tokio::spawn(reader_task(
        source,
        shutdown_rx,
        Arc::clone(&subscribers),
        Arc::clone(&closed),
    ));

    Ok(ConnectionHandle {
        outbound: outbound_tx,
        subscribers,
        shutdown: shutdown_tx,
        closed,
    })
}

/// Connect with linear backoff until the handshake budget is spent.
async fn dial(url: &str, budget: Duration) -> ClientResult<WsStream> {
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let remaining = budget.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(ClientError::ConnectionTimeout {
                budget_secs: budget.as_secs(),
            });
        }

        match tokio::time::timeout(remaining, connect_async(url)).await {
            Ok(Ok((stream, _response))) => return Ok(stream),
            Ok(Err(err)) => {
                let backoff = Duration::from_millis(u64::from(attempts.min(20)) * 100);
                debug!(
                    attempt = attempts,
                    error = %err,
                    "handshake failed, retrying in {:?}",
                    backoff
                );
                tokio::time::sleep(backoff.min(budget.saturating_sub(start.elapsed()))).await;
            }
            Err(_) => {
                return Err(ClientError::ConnectionTimeout {
                    budget_secs: budget.as_secs(),
                });
            }
        }
    }
}

async fn writer_task(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
    subscribers: Arc<SubscriberSet>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => match frame {
                None => break,
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %err, "outbound send failed");
                        subscribers.dispatch(&ConnectionSignal::Error(err.to_string()));
                        break;
                    }
                }
            }
        }
    }
    debug!("writer task ended");
}

async fn reader_task(
    mut source: SplitStream<WsStream>,
    mut shutdown: watch::Receiver<bool>,
    subscribers: Arc<SubscriberSet>,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            inbound = source.next() => match inbound {
                None => {
                    subscribers.dispatch(&ConnectionSignal::Closed {
                        reason: "closed by peer".to_string(),
                    });
                    break;
                }
                Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                    Ok(value) => {
                        subscribers.dispatch(&ConnectionSignal::Event(
                            sesh_protocol::WireEvent::new(value),
                        ));
                    }
                    Err(err) => {
                        warn!(error = %err, "dropping unparseable frame");
                    }
                },
                Some(Ok(Message::Close(_))) => {
                    subscribers.dispatch(&ConnectionSignal::Closed {
                        reason: "close frame".to_string(),
                    });
                    break;
                }
                Some(Ok(_)) => {} // ping/pong/binary: nothing to dispatch
                Some(Err(err)) => {
                    warn!(error = %err, "realtime channel failed");
                    subscribers.dispatch(&ConnectionSignal::Error(err.to_string()));
                    break;
                }
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    debug!("reader task ended");
}

//! Long-lived connection to the upstream WebSocket feed.
//!
//! A single background task owns the socket, the dedup cache and the sending
//! half of the event channel. It dials with exponential backoff, reads frames
//! until the scheduled rotation, then dials again. Events already admitted to
//! the channel are never dropped; a slow consumer slows upstream reads.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use namazu_types::Event;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::processor::{FrameOutcome, FrameProcessor};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on a single dial, including the WebSocket handshake.
const DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close` waits for the read loop to wind down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A producer of normalized events consumed by the pipeline.
#[async_trait]
pub trait EventSource: Send {
    /// Start producing. The returned channel closes when the source stops.
    async fn connect(&mut self, cancel: &CancellationToken) -> Result<mpsc::Receiver<Event>>;

    /// Stop producing. Safe to call more than once.
    async fn close(&mut self);
}

/// Self-healing client for the P2PQuake WebSocket feed.
pub struct StreamClient {
    config: StreamConfig,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    started: bool,
}

impl StreamClient {
    pub fn new(config: StreamConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            state_tx,
            state_rx,
            shutdown: CancellationToken::new(),
            task: None,
            started: false,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Validate the configuration and spawn the connection task.
    ///
    /// Only configuration problems are reported; dial failures are retried
    /// in the background until `cancel` fires or [`close`](Self::close) is
    /// called. The client can be started once.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<mpsc::Receiver<Event>> {
        if self.started {
            return Err(StreamError::AlreadyStarted);
        }
        self.config.validate()?;
        self.started = true;

        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer);
        self.shutdown = cancel.child_token();

        let connection = Connection {
            processor: FrameProcessor::new(
                self.config.source.clone(),
                self.config.seen_cache_capacity,
            ),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            events: events_tx,
            state: self.state_tx.clone(),
        };

        info!(endpoint = %self.config.endpoint, "Starting upstream stream client");
        self.task = Some(tokio::spawn(connection.run()));
        Ok(events_rx)
    }

    /// Stop the connection task and close the event channel.
    pub async fn close(&mut self) {
        self.started = true;
        self.shutdown.cancel();

        if let Some(task) = self.task.take() {
            join_or_abort(task, CLOSE_TIMEOUT).await;
        }
        self.state_tx.send_replace(ConnectionState::Closed);
    }
}

/// Wait up to `limit` for `task`, then abort it. Either way the task and the
/// event sender it owns are gone when this returns.
async fn join_or_abort(mut task: JoinHandle<()>, limit: Duration) {
    match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(())) => debug!("Stream client task finished"),
        Ok(Err(e)) => warn!(error = %e, "Stream client task failed"),
        Err(_) => {
            warn!("Timed out waiting for stream client task, aborting it");
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl EventSource for StreamClient {
    async fn connect(&mut self, cancel: &CancellationToken) -> Result<mpsc::Receiver<Event>> {
        StreamClient::connect(self, cancel).await
    }

    async fn close(&mut self) {
        StreamClient::close(self).await
    }
}

/// Why a connected read loop ended.
enum ReadEnd {
    Shutdown,
    Rotate,
    ConsumerGone,
    Lost(String),
}

/// State owned by the background task.
struct Connection {
    config: StreamConfig,
    processor: FrameProcessor,
    shutdown: CancellationToken,
    events: mpsc::Sender<Event>,
    state: watch::Sender<ConnectionState>,
}

impl Connection {
    async fn run(mut self) {
        let mut backoff = self.config.dial_backoff_initial;

        loop {
            self.state.send_replace(ConnectionState::Connecting);

            let dial = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                dial = tokio::time::timeout(DIAL_TIMEOUT, connect_async(self.config.endpoint.as_str())) => dial,
            };

            let failure = match dial {
                Ok(Ok((socket, _response))) => {
                    backoff = self.config.dial_backoff_initial;
                    self.state.send_replace(ConnectionState::Connected);
                    info!(endpoint = %self.config.endpoint, "Connected to upstream");

                    match self.read_frames(socket).await {
                        ReadEnd::Shutdown => break,
                        ReadEnd::ConsumerGone => {
                            debug!("Event consumer dropped, stopping stream client");
                            break;
                        }
                        ReadEnd::Rotate => {
                            info!(
                                interval_secs = self.config.reconnect_interval.as_secs(),
                                "Scheduled reconnect"
                            );
                            continue;
                        }
                        ReadEnd::Lost(reason) => format!("connection lost: {reason}"),
                    }
                }
                Ok(Err(e)) => format!("dial failed: {e}"),
                Err(_) => format!("dial timed out after {DIAL_TIMEOUT:?}"),
            };

            self.state.send_replace(ConnectionState::Disconnected);
            warn!(
                endpoint = %self.config.endpoint,
                reason = %failure,
                retry_in_ms = backoff.as_millis() as u64,
                "Upstream unavailable"
            );

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.dial_backoff_max);
        }

        self.state.send_replace(ConnectionState::Closed);
        info!("Upstream stream client stopped");
    }

    async fn read_frames(&mut self, mut socket: Socket) -> ReadEnd {
        let rotation = tokio::time::sleep(self.config.reconnect_interval);
        tokio::pin!(rotation);

        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    let _ = socket.close(None).await;
                    return ReadEnd::Shutdown;
                }
                _ = &mut rotation => {
                    let _ = socket.close(None).await;
                    return ReadEnd::Rotate;
                }
                message = socket.next() => message,
            };

            let raw = match message {
                Some(Ok(Message::Text(text))) => Bytes::from(text),
                Some(Ok(Message::Binary(data))) => Bytes::from(data),
                Some(Ok(Message::Close(_))) => return ReadEnd::Lost("closed by upstream".to_string()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return ReadEnd::Lost(e.to_string()),
                None => return ReadEnd::Lost("stream ended".to_string()),
            };

            let event = match self.processor.process(raw, Utc::now()) {
                Ok(FrameOutcome::Event(event)) => event,
                Ok(FrameOutcome::Ignored { code }) => {
                    debug!(code, "Ignoring non-earthquake frame");
                    continue;
                }
                Ok(FrameOutcome::Duplicate { id }) => {
                    debug!(event_id = %id, "Dropping duplicate frame");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping malformed frame");
                    continue;
                }
            };

            debug!(event_id = %event.id, severity = event.severity, "Emitting event");
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    let _ = socket.close(None).await;
                    return ReadEnd::Shutdown;
                }
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        let _ = socket.close(None).await;
                        return ReadEnd::ConsumerGone;
                    }
                }
            }
        }
    }
}

//! WebSocket streaming channel.
//!
//! Owns a single duplex connection, correlates replies to outbound requests,
//! and fans every inbound frame out to event subscribers.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open──► Connected
//!      ▲                          │                    │
//!      │                       failure           close / error
//!      │                          ▼                    ▼
//!      └──── reconnect delay ◄── Disconnected ◄────────┘
//! ```
//!
//! There is no terminal state; the channel keeps reconnecting until
//! [`StreamingChannel::dispose`] is called. At most one reconnect timer is
//! pending at any time.
//!
//! Outgoing requests are never queued while disconnected. Pending requests
//! are not failed on disconnect either; they expire through their own
//! timeout.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{OutboundFrame, StreamMessage};

use super::correlator::RequestCorrelator;

// ============================================================================
// Constants
// ============================================================================

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection; a reconnect may be scheduled.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Open and accepting correlated requests.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

// ============================================================================
// StreamInner
// ============================================================================

/// State shared between the handle, the event loop and the reconnect timer.
struct StreamInner {
    url: Url,
    reconnect_delay: Duration,
    state: Mutex<ConnectionState>,
    /// Writer half of the live connection, `None` while disconnected.
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    correlator: RequestCorrelator,
    events: broadcast::Sender<Arc<StreamMessage>>,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    reconnect_attempts: AtomicU64,
    cancel: CancellationToken,
}

// ============================================================================
// StreamingChannel
// ============================================================================

/// Handle to the streaming connection.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct StreamingChannel {
    inner: Arc<StreamInner>,
}

impl fmt::Debug for StreamingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingChannel")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl StreamingChannel {
    /// Creates a disconnected channel for `url`.
    #[must_use]
    pub fn new(url: Url, reconnect_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(StreamInner {
                url,
                reconnect_delay,
                state: Mutex::new(ConnectionState::Disconnected),
                outbound: Mutex::new(None),
                correlator: RequestCorrelator::new(),
                events,
                reconnect_timer: Mutex::new(None),
                reconnect_attempts: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Opens the connection.
    ///
    /// A no-op when already connecting or connected. On failure a reconnect
    /// is scheduled before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the handshake fails
    /// - [`Error::Connection`] if the channel was disposed
    pub async fn connect(&self) -> Result<()> {
        StreamInner::open(Arc::clone(&self.inner)).await
    }

    /// Sends a correlated request and waits for its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::StreamUnavailable`] if not connected (caller falls back to HTTP)
    /// - [`Error::ConnectionClosed`] if the connection dropped before the write
    /// - [`Error::RequestAbandoned`] if the channel was disposed after the write
    /// - [`Error::RequestTimeout`] if no reply arrived within `request_timeout`
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send_correlated(
        &self,
        command: &str,
        payload: Value,
        request_timeout: Duration,
    ) -> Result<StreamMessage> {
        if self.state() != ConnectionState::Connected {
            return Err(Error::StreamUnavailable);
        }
        let outbound = self
            .inner
            .outbound
            .lock()
            .clone()
            .ok_or(Error::StreamUnavailable)?;

        let correlator = &self.inner.correlator;
        let reply = correlator.register()?;
        let request_id = reply.request_id().clone();

        let frame = OutboundFrame {
            command: command.to_string(),
            payload,
            request_id: request_id.clone(),
        };
        let json = match to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                correlator.remove(&request_id);
                return Err(Error::Json(e));
            }
        };

        if outbound.send(Message::Text(json.into())).is_err() {
            correlator.remove(&request_id);
            return Err(Error::ConnectionClosed);
        }

        trace!(%request_id, command, "Request sent");

        correlator.wait(reply, request_timeout).await
    }

    /// Subscribes to every inbound frame, replies included.
    ///
    /// A slow subscriber receives [`broadcast::error::RecvError::Lagged`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StreamMessage>> {
        self.inner.events.subscribe()
    }

    /// Current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns `true` if connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The stream endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Number of correlated requests awaiting replies.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.len()
    }

    /// Number of reconnect timers that have fired.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Returns `true` while a reconnect timer is pending.
    #[must_use]
    pub fn reconnect_scheduled(&self) -> bool {
        self.inner
            .reconnect_timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Closes the connection and stops reconnecting for good.
    ///
    /// Pending requests fail with [`Error::RequestAbandoned`].
    pub fn dispose(&self) {
        self.inner.cancel.cancel();

        if let Some(timer) = self.inner.reconnect_timer.lock().take() {
            timer.abort();
        }
        self.inner.outbound.lock().take();
        *self.inner.state.lock() = ConnectionState::Disconnected;
        self.inner.correlator.clear();

        info!(url = %self.inner.url, "Stream disposed");
    }
}

// ============================================================================
// StreamInner - Lifecycle
// ============================================================================

impl StreamInner {
    /// Opens a connection if disconnected.
    ///
    /// Boxed so the reconnect timer can await it from a spawned task.
    fn open(self: Arc<Self>) -> BoxFuture<'static, Result<()>> {
        async move {
            if self.cancel.is_cancelled() {
                return Err(Error::connection("stream disposed"));
            }

            {
                let mut state = self.state.lock();
                let current = *state;
                if current != ConnectionState::Disconnected {
                    trace!(state = %current, "Connect skipped");
                    return Ok(());
                }
                *state = ConnectionState::Connecting;
            }

            debug!(url = %self.url, "Connecting stream");

            let ws_stream = match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((ws_stream, _response)) => ws_stream,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Stream connect failed");
                    self.handle_disconnect();
                    return Err(Error::WebSocket(e));
                }
            };

            if self.cancel.is_cancelled() {
                *self.state.lock() = ConnectionState::Disconnected;
                return Err(Error::connection("stream disposed"));
            }

            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            *self.outbound.lock() = Some(outbound_tx);
            *self.state.lock() = ConnectionState::Connected;

            if let Some(timer) = self.reconnect_timer.lock().take() {
                timer.abort();
            }

            info!(url = %self.url, "Stream connected");

            tokio::spawn(Self::run_event_loop(
                Arc::clone(&self),
                ws_stream,
                outbound_rx,
            ));

            Ok(())
        }
        .boxed()
    }

    /// Marks the channel disconnected and schedules a reconnect.
    ///
    /// Returns `true` if this call scheduled a new timer.
    fn handle_disconnect(self: &Arc<Self>) -> bool {
        *self.state.lock() = ConnectionState::Disconnected;
        self.outbound.lock().take();
        self.schedule_reconnect()
    }

    /// Schedules exactly one reconnect after the fixed delay.
    ///
    /// A second call while a timer is pending is a no-op.
    fn schedule_reconnect(self: &Arc<Self>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let mut timer = self.reconnect_timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Reconnect already scheduled");
            return false;
        }

        let inner = Arc::clone(self);
        let delay = self.reconnect_delay;
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        *timer = Some(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }

            inner.reconnect_timer.lock().take();
            inner.reconnect_attempts.fetch_add(1, Ordering::Relaxed);

            // Failure schedules the next attempt itself.
            let _ = Self::open(Arc::clone(&inner)).await;
        }));

        true
    }
}

// ============================================================================
// StreamInner - Event Loop
// ============================================================================

impl StreamInner {
    /// Pumps one connection until it closes, then hands off to reconnect.
    async fn run_event_loop(
        self: Arc<Self>,
        ws_stream: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    let _ = ws_write.close().await;
                    break;
                }

                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.handle_incoming(&text),

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "Stream closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Stream error");
                            break;
                        }

                        None => {
                            debug!("Stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                outbound = outbound_rx.recv() => {
                    let Some(message) = outbound else {
                        debug!("Outbound channel closed");
                        break;
                    };

                    if let Err(e) = ws_write.send(message).await {
                        warn!(error = %e, "Stream write failed");
                        break;
                    }
                }
            }
        }

        if !self.cancel.is_cancelled() {
            info!(url = %self.url, "Stream disconnected");
            self.handle_disconnect();
        }

        debug!("Stream event loop terminated");
    }

    /// Resolves a matching pending request, then forwards the frame to subscribers.
    fn handle_incoming(&self, text: &str) {
        let message = match from_str::<StreamMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse stream frame");
                return;
            }
        };

        if let Some(request_id) = &message.request_id {
            self.correlator.resolve(request_id, message.clone());
        }

        // No subscribers is not an error.
        let _ = self.events.send(Arc::new(message));
    }
}

// ============================================================================
// Tests
// ============================================================================

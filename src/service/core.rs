//! Command service facade.
//!
//! [`CommandService`] is the single entry point for callers. It routes each
//! command to the local bridge, the stream or HTTP, deduplicates concurrent
//! identical calls, caches on request, and always answers with a
//! [`CommandEnvelope`]. Nothing on this surface returns `Err`.
//!
//! # Routing
//!
//! | Mode | Stream connected | Path |
//! |------|------------------|------|
//! | Local | n/a | bridge `invoke(name, payload)` |
//! | Network | yes (and `prefer_stream`) | correlated stream request |
//! | Network | no | `POST /api/command` with bounded retry |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::protocol::{CommandEnvelope, StreamMessage};
use crate::transport::{ConnectionState, HttpChannel, LocalBridge, LocalChannel, StreamingChannel};

use super::builder::ServiceBuilder;
use super::cache::ResponseCache;
use super::inflight::{InFlightRegistry, command_key};

// ============================================================================
// Constants
// ============================================================================

/// Bridge command that carries REST-style calls in Local mode.
pub const API_REQUEST_COMMAND: &str = "api_request";

// ============================================================================
// Types
// ============================================================================

/// State owned by one service instance.
pub(crate) struct ServiceInner {
    config: TransportConfig,
    local: LocalChannel,
    http: Option<HttpChannel>,
    stream: Option<StreamingChannel>,
    cache: ResponseCache,
    inflight: Arc<InFlightRegistry>,
}

// ============================================================================
// CommandService
// ============================================================================

/// Unified command transport.
///
/// Cheap to clone; clones share caches, in-flight state and the stream.
#[derive(Clone)]
pub struct CommandService {
    inner: Arc<ServiceInner>,
}

impl fmt::Debug for CommandService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandService")
            .field("mode", &self.inner.config.mode)
            .field("connection", &self.connection_state())
            .field("inflight", &self.inflight_count())
            .field("cached", &self.cache_len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CommandService - Construction
// ============================================================================

impl CommandService {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    pub(crate) fn new(
        config: TransportConfig,
        bridge: Option<Arc<dyn LocalBridge>>,
        http_client: Option<reqwest::Client>,
    ) -> Result<Self> {
        let http = match (&config.base_url, http_client) {
            (Some(base), Some(client)) => Some(HttpChannel::with_client(client, base.clone())),
            (Some(base), None) => Some(HttpChannel::new(base.clone())?),
            (None, _) => None,
        };

        let stream = match (&config.stream_url, config.is_network()) {
            (Some(url), true) => Some(StreamingChannel::new(url.clone(), config.reconnect_delay)),
            _ => None,
        };

        debug!(
            mode = %config.mode,
            http = http.is_some(),
            stream = stream.is_some(),
            "Command service created"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                local: LocalChannel::new(bridge),
                config,
                http,
                stream,
                cache: ResponseCache::new(),
                inflight: Arc::new(InFlightRegistry::new()),
            }),
        })
    }

    /// Opens the stream, if one is configured.
    ///
    /// A failed first connect is logged and left to the reconnect timer.
    pub async fn init(&self) {
        let Some(stream) = &self.inner.stream else {
            return;
        };

        if let Err(e) = stream.connect().await {
            warn!(error = %e, "Initial stream connect failed, will retry");
        }
    }

    /// Closes the stream for good and empties the cache.
    pub fn dispose(&self) {
        if let Some(stream) = &self.inner.stream {
            stream.dispose();
        }
        let evicted = self.inner.cache.evict(None);
        info!(evicted, "Command service disposed");
    }
}

// ============================================================================
// CommandService - Commands
// ============================================================================

impl CommandService {
    /// Sends a named command.
    ///
    /// Concurrent calls with the same name and payload share one round-trip.
    pub async fn command(&self, name: &str, payload: Value) -> CommandEnvelope {
        let key = command_key(name, &payload);
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();

        self.inner
            .inflight
            .run(key, async move { inner.dispatch(&name, payload).await })
            .await
    }

    /// Sends a command, answering from cache when an entry is younger than `ttl`.
    ///
    /// Successful replies are cached under the same key as the dedup entry,
    /// unless another call for that key has started in the meantime.
    pub async fn cached_command(&self, name: &str, payload: Value, ttl: Duration) -> CommandEnvelope {
        let key = command_key(name, &payload);

        if let Some(value) = self.inner.cache.get(&key, ttl) {
            debug!(key = %key, "Serving command from cache");
            return CommandEnvelope::success(value);
        }

        let envelope = self.command(name, payload).await;
        if envelope.success {
            let data = envelope.data.clone().unwrap_or(Value::Null);
            self.inner
                .inflight
                .settle_into(&self.inner.cache, key, data);
        }
        envelope
    }

    /// Evicts cache entries whose key contains `pattern`, or all of them.
    ///
    /// Keys have the form `name:payload`, so a command name works as a pattern.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        self.inner.cache.evict(pattern)
    }

    /// `GET {path}`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> CommandEnvelope<T> {
        self.request(Method::GET, path, None).await.into_typed()
    }

    /// `POST {path}` with a JSON body.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> CommandEnvelope<T> {
        self.request(Method::POST, path, Some(body)).await.into_typed()
    }

    /// `PUT {path}` with a JSON body.
    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> CommandEnvelope<T> {
        self.request(Method::PUT, path, Some(body)).await.into_typed()
    }

    /// `DELETE {path}`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> CommandEnvelope<T> {
        self.request(Method::DELETE, path, None).await.into_typed()
    }

    /// REST-style call, deduplicated like [`command`](Self::command).
    ///
    /// Network mode issues the HTTP verb against `{base_url}{path}`. Local
    /// mode invokes the bridge command `api_request` with
    /// `{method, path, body}`.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> CommandEnvelope {
        let payload = json!({
            "method": method.as_str(),
            "path": path,
            "body": body,
        });
        let key = command_key(API_REQUEST_COMMAND, &payload);
        let inner = Arc::clone(&self.inner);
        let path = path.to_string();

        self.inner
            .inflight
            .run(key, async move {
                inner.dispatch_request(method, &path, body, payload).await
            })
            .await
    }
}

// ============================================================================
// CommandService - Events & Diagnostics
// ============================================================================

impl CommandService {
    /// Subscribes to every stream frame. `None` without a stream.
    #[must_use]
    pub fn subscribe(&self) -> Option<EventSubscription> {
        let stream = self.inner.stream.as_ref()?;
        Some(EventSubscription {
            receiver: stream.subscribe(),
            event: None,
        })
    }

    /// Subscribes to push events named `event`. `None` without a stream.
    #[must_use]
    pub fn subscribe_event(&self, event: impl Into<String>) -> Option<EventSubscription> {
        let stream = self.inner.stream.as_ref()?;
        Some(EventSubscription {
            receiver: stream.subscribe(),
            event: Some(event.into()),
        })
    }

    /// The configuration this service was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Stream state, or `None` without a stream.
    #[must_use]
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.inner.stream.as_ref().map(StreamingChannel::state)
    }

    /// Correlated stream requests awaiting replies.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .stream
            .as_ref()
            .map_or(0, StreamingChannel::pending_count)
    }

    /// Stream reconnect attempts so far.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner
            .stream
            .as_ref()
            .map_or(0, StreamingChannel::reconnect_attempts)
    }

    /// Commands currently in flight.
    #[inline]
    #[must_use]
    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Cache entries, fresh or stale.
    #[inline]
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }
}

// ============================================================================
// ServiceInner - Dispatch
// ============================================================================

impl ServiceInner {
    async fn dispatch(&self, name: &str, payload: Value) -> CommandEnvelope {
        if self.config.is_local() {
            return self.local.execute(name, payload).await;
        }

        if self.config.prefer_stream
            && let Some(stream) = &self.stream
            && stream.is_connected()
        {
            match stream
                .send_correlated(name, payload.clone(), self.config.timeout)
                .await
            {
                Ok(reply) => return reply.into_envelope(),
                // Nothing was written, so HTTP cannot duplicate the command.
                Err(Error::StreamUnavailable | Error::ConnectionClosed) => {
                    debug!(command = name, "Stream dropped, falling back to HTTP");
                }
                Err(e) => return CommandEnvelope::from(e),
            }
        }

        match self.http_channel() {
            Ok(http) => http.execute(name, &payload, self.config.max_retries).await,
            Err(e) => CommandEnvelope::from(e),
        }
    }

    async fn dispatch_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        local_payload: Value,
    ) -> CommandEnvelope {
        if self.config.is_local() {
            return self.local.execute(API_REQUEST_COMMAND, local_payload).await;
        }

        match self.http_channel() {
            Ok(http) => {
                http.request(method, path, body.as_ref(), self.config.max_retries)
                    .await
            }
            Err(e) => CommandEnvelope::from(e),
        }
    }

    fn http_channel(&self) -> Result<&HttpChannel> {
        self.http
            .as_ref()
            .ok_or_else(|| Error::config("HTTP channel not configured"))
    }
}

// ============================================================================
// EventSubscription
// ============================================================================

/// Receiver for stream frames, optionally filtered to one event name.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<Arc<StreamMessage>>,
    event: Option<String>,
}

impl EventSubscription {
    /// Waits for the next matching frame. `None` once the stream is gone.
    ///
    /// Frames missed by a lagging subscriber are skipped.
    pub async fn recv(&mut self) -> Option<Arc<StreamMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.matches(&message) => return Some(message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, message: &StreamMessage) -> bool {
        match &self.event {
            Some(event) => message.is_event() && message.event.as_deref() == Some(event.as_str()),
            None => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

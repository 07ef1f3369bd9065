//! Request/response correlation for the stream.
//!
//! Each correlated request owns a oneshot sender keyed by its [`RequestId`].
//! An entry leaves the map exactly once: on a matching reply, on timeout, or
//! when the write fails. Removal is a presence check under the lock, so a
//! late reply after a timeout is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::StreamMessage;

// ============================================================================
// Constants
// ============================================================================

/// Maximum pending requests before rejecting new ones.
pub const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// A correlated request waiting for its reply.
#[derive(Debug)]
struct PendingRequest {
    sender: oneshot::Sender<StreamMessage>,
    created_at: Instant,
}

/// Receiving half handed to the caller of [`RequestCorrelator::register`].
#[derive(Debug)]
pub struct PendingReply {
    request_id: RequestId,
    receiver: oneshot::Receiver<StreamMessage>,
}

impl PendingReply {
    /// The id the reply must carry.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

// ============================================================================
// RequestCorrelator
// ============================================================================

/// Tracks pending streaming requests.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: Mutex<FxHashMap<RequestId, PendingRequest>>,
}

impl RequestCorrelator {
    /// Creates an empty correlator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request under a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if [`MAX_PENDING_REQUESTS`] are outstanding.
    pub fn register(&self) -> Result<PendingReply> {
        let mut pending = self.pending.lock();

        if pending.len() >= MAX_PENDING_REQUESTS {
            warn!(
                pending = pending.len(),
                max = MAX_PENDING_REQUESTS,
                "Too many pending requests"
            );
            return Err(Error::protocol(format!(
                "Too many pending requests: {}/{}",
                pending.len(),
                MAX_PENDING_REQUESTS
            )));
        }

        let request_id = RequestId::generate();
        let (sender, receiver) = oneshot::channel();
        pending.insert(
            request_id.clone(),
            PendingRequest {
                sender,
                created_at: Instant::now(),
            },
        );

        Ok(PendingReply {
            request_id,
            receiver,
        })
    }

    /// Delivers `message` to the request it answers.
    ///
    /// Returns `false` when no pending request has that id.
    pub fn resolve(&self, request_id: &RequestId, message: StreamMessage) -> bool {
        let Some(entry) = self.pending.lock().remove(request_id) else {
            debug!(%request_id, "Reply for unknown or expired request");
            return false;
        };

        debug!(
            %request_id,
            elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
            "Request resolved"
        );
        // Receiver may already be gone if the caller abandoned the request.
        let _ = entry.sender.send(message);
        true
    }

    /// Drops a pending request. Returns `true` if it was still pending.
    pub fn remove(&self, request_id: &RequestId) -> bool {
        self.pending.lock().remove(request_id).is_some()
    }

    /// Waits for the reply to `reply`, rejecting after `request_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no reply arrived in time
    /// - [`Error::RequestAbandoned`] if the entry was dropped without a reply
    pub async fn wait(&self, reply: PendingReply, request_timeout: Duration) -> Result<StreamMessage> {
        let PendingReply {
            request_id,
            receiver,
        } = reply;

        match timeout(request_timeout, receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(Error::RequestAbandoned { request_id }),
            Err(_) => {
                self.remove(&request_id);
                debug!(%request_id, "Removed timed-out correlation");
                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Returns `true` if `request_id` is pending.
    #[inline]
    #[must_use]
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.pending.lock().contains_key(request_id)
    }

    /// Drops every pending request; their waiters see [`Error::RequestAbandoned`].
    pub fn clear(&self) {
        let count = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };

        if count > 0 {
            debug!(count, "Dropped pending requests");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

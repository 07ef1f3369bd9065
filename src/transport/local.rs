//! In-process bridge channel.
//!
//! A desktop or embedded host supplies a [`LocalBridge`] implementation; the
//! channel invokes it and normalizes whatever it returns.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{CommandEnvelope, RawReply};

// ============================================================================
// LocalBridge
// ============================================================================

/// RPC primitive exposed by the host runtime.
///
/// Return [`Error::bridge`] to report a host-side failure; its message is
/// surfaced verbatim in the failure envelope.
#[async_trait]
pub trait LocalBridge: Send + Sync {
    /// Invokes `command` with `payload` and returns the raw result.
    async fn invoke(&self, command: &str, payload: Value) -> Result<Value>;
}

// ============================================================================
// LocalChannel
// ============================================================================

/// Command channel over an optional [`LocalBridge`].
#[derive(Clone, Default)]
pub struct LocalChannel {
    bridge: Option<Arc<dyn LocalBridge>>,
}

impl fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChannel")
            .field("available", &self.is_available())
            .finish()
    }
}

impl LocalChannel {
    /// Creates a channel over `bridge`, or an unavailable channel for `None`.
    #[inline]
    #[must_use]
    pub fn new(bridge: Option<Arc<dyn LocalBridge>>) -> Self {
        Self { bridge }
    }

    /// Returns `true` if the host supplied a bridge.
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.bridge.is_some()
    }

    /// Invokes the bridge and normalizes the result.
    ///
    /// Never retried: a missing bridge cannot appear on a second attempt.
    pub async fn execute(&self, command: &str, payload: Value) -> CommandEnvelope {
        match self.invoke(command, payload).await {
            Ok(raw) => {
                trace!(command, "Local bridge replied");
                RawReply::from_local(raw).normalize()
            }
            Err(e) => {
                debug!(command, error = %e, "Local bridge call failed");
                CommandEnvelope::from(e)
            }
        }
    }

    async fn invoke(&self, command: &str, payload: Value) -> Result<Value> {
        let bridge = self.bridge.as_ref().ok_or(Error::BridgeUnavailable)?;
        bridge.invoke(command, payload).await
    }
}

// ============================================================================
// Tests
// ============================================================================

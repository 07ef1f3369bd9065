//! Error types for the command transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors only travel between internal layers. The public
//! [`CommandService`](crate::CommandService) surface renders every error into
//! a failure [`CommandEnvelope`](crate::CommandEnvelope) so callers branch on
//! `success` and never on `Err`.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Local bridge | [`Error::BridgeUnavailable`], [`Error::Bridge`] |
//! | Network | [`Error::Http`], [`Error::HttpStatus`] |
//! | Streaming | [`Error::StreamUnavailable`], [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestAbandoned`], [`Error::RequestTimeout`], [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a transport configuration fails validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Local Bridge Errors
    // ========================================================================
    /// Local mode was selected but no bridge was supplied by the host.
    #[error("Local bridge not available")]
    BridgeUnavailable,

    /// The local bridge rejected the call.
    #[error("{message}")]
    Bridge {
        /// Error message reported by the host.
        message: String,
    },

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request completed with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    // ========================================================================
    // Streaming Errors
    // ========================================================================
    /// The streaming channel is not connected.
    ///
    /// Callers fall back to the HTTP path when they see this.
    #[error("Streaming channel not connected")]
    StreamUnavailable,

    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed before the request was written.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A request was written but its pending entry was dropped before a reply.
    ///
    /// The server may have acted on it, so it must not be resent.
    #[error("Request {request_id} abandoned before a reply arrived")]
    RequestAbandoned {
        /// The request ID that was abandoned.
        request_id: RequestId,
    },

    /// Correlated request did not receive a response in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Protocol violation or unexpected frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bridge error from a host-reported message.
    #[inline]
    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    #[inline]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::RequestTimeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::RequestAbandoned { .. }
                | Self::StreamUnavailable
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the HTTP retry loop may re-issue the call.
    ///
    /// A missing bridge or a bad configuration can never succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::HttpStatus { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

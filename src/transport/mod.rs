//! Transport backends.
//!
//! Each backend turns a named command into a [`CommandEnvelope`](crate::CommandEnvelope)
//! or, for the stream, a correlated [`StreamMessage`](crate::protocol::StreamMessage).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   invoke(name, payload)   ┌────────────────┐
//! │  LocalChannel  │──────────────────────────►│  Host bridge   │
//! └────────────────┘                           └────────────────┘
//! ┌────────────────┐   POST /api/command       ┌────────────────┐
//! │  HttpChannel   │──────────────────────────►│                │
//! └────────────────┘                           │    Backend     │
//! ┌────────────────┐   {command, request_id}   │                │
//! │StreamingChannel│◄─────────────────────────►│                │
//! └────────────────┘   events + replies        └────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `local` | In-process bridge channel |
//! | `http` | HTTP command endpoint with bounded retry |
//! | `correlator` | Pending request map with timeouts |
//! | `stream` | WebSocket connection, reconnect and event bus |

// ============================================================================
// Submodules
// ============================================================================

/// Pending request map with timeouts.
pub mod correlator;

/// HTTP command endpoint with bounded retry.
pub mod http;

/// In-process bridge channel.
pub mod local;

/// WebSocket connection, reconnect and event bus.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlator::{PendingReply, RequestCorrelator};
pub use http::HttpChannel;
pub use local::{LocalBridge, LocalChannel};
pub use stream::{ConnectionState, StreamingChannel};

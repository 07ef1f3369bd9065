//! Protocol message types.
//!
//! This module defines the normalized reply shape and the frames exchanged
//! with the network backends.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `CommandRequest` | Client → HTTP | `POST /api/command` body |
//! | `OutboundFrame` | Client → Stream | Correlated request |
//! | `StreamMessage` | Stream → Client | Push event or correlated reply |
//! | `CommandEnvelope` | Layer → Caller | Normalized `{success, data, error}` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope and reply normalization |
//! | `message` | HTTP body and stream frames |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope and reply normalization.
pub mod envelope;

/// HTTP body and stream frames.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{CommandEnvelope, RawReply};
pub use message::{CommandRequest, MessageKind, OutboundFrame, StreamMessage};

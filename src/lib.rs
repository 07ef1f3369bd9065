//! Wallet transport - one command API over a host bridge, HTTP and WebSocket.
//!
//! A client issues named commands with JSON payloads and always receives a
//! normalized [`CommandEnvelope`]. Where the command travels is decided once,
//! from the host environment.
//!
//! # Architecture
//!
//! - **Local mode**: commands go to an in-process [`LocalBridge`]
//! - **Network mode**: commands go over a correlated WebSocket stream when
//!   connected, otherwise to `POST /api/command` with bounded retry
//!
//! Key design principles:
//!
//! - Failures are values: the command surface never returns `Err`
//! - Concurrent identical commands share one round-trip
//! - The stream reconnects on its own and fans push events out to subscribers
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use wallet_transport::config::{HostEnvironment, detect};
//! use wallet_transport::{CommandService, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = CommandService::builder()
//!         .config(detect(&HostEnvironment::from_env()))
//!         .build()?;
//!     service.init().await;
//!
//!     let reply = service.command("wallet.balance", json!({})).await;
//!     println!("{reply:?}");
//!
//!     service.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Mode detection and [`TransportConfig`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Correlation id wrapper |
//! | [`protocol`] | Envelope and wire frames |
//! | [`service`] | [`CommandService`] facade, dedup and cache |
//! | [`transport`] | Local, HTTP and stream backends |

// ============================================================================
// Modules
// ============================================================================

/// Transport mode detection and configuration.
pub mod config;

/// Error types and result aliases.
///
/// Construction and transport internals return [`Result<T>`]; the command
/// surface converts every [`Error`] into a failed envelope.
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Envelope and wire frame types.
pub mod protocol;

/// Command service facade.
pub mod service;

/// Transport backends.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{HostEnvironment, TransportConfig, TransportConfigBuilder, TransportMode, detect};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::RequestId;

// Protocol types
pub use protocol::{CommandEnvelope, MessageKind, StreamMessage};

// Service types
pub use service::{CommandService, EventSubscription, ServiceBuilder};

// Transport types
pub use transport::{ConnectionState, LocalBridge};

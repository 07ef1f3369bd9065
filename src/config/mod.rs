//! Transport configuration and environment detection.
//!
//! A [`TransportConfig`] is constructed once at process start and injected
//! into [`CommandService`](crate::CommandService). It is never mutated
//! afterwards; the HTTP retry budget is carried per call.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TransportConfig`] | Immutable transport settings |
//! | [`TransportConfigBuilder`] | Fluent, validated configuration builder |
//! | [`TransportMode`] | Local bridge or network routing |
//! | [`HostEnvironment`] | Explicit host inputs for [`detect`] |
//!
//! # Example
//!
//! ```no_run
//! use wallet_transport::config::{HostEnvironment, detect};
//!
//! let env = HostEnvironment::new()
//!     .with_location("https://wallet.example.com/app".parse().unwrap());
//! let config = detect(&env);
//! assert!(config.is_network());
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder and the immutable config it produces.
pub mod builder;

/// Pure environment detection.
pub mod environment;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{TransportConfig, TransportConfigBuilder, TransportMode};
pub use environment::{HostEnvironment, detect};

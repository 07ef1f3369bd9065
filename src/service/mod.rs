//! Command service: routing, deduplication and caching.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use wallet_transport::CommandService;
//! use wallet_transport::config::{HostEnvironment, detect};
//!
//! # async fn example() -> wallet_transport::Result<()> {
//! let service = CommandService::builder()
//!     .config(detect(&HostEnvironment::from_env()))
//!     .build()?;
//! service.init().await;
//!
//! let balance = service
//!     .cached_command("wallet.balance", json!({}), Duration::from_secs(10))
//!     .await;
//! if !balance.success {
//!     eprintln!("{}", balance.error_message().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`ServiceBuilder`] |
//! | `cache` | TTL response cache |
//! | `core` | [`CommandService`] facade and [`EventSubscription`] |
//! | `inflight` | Concurrent call deduplication |

// ============================================================================
// Submodules
// ============================================================================

/// Builder for [`CommandService`].
pub mod builder;

/// TTL response cache.
pub mod cache;

/// Command service facade.
pub mod core;

/// Concurrent call deduplication.
pub mod inflight;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ServiceBuilder;
pub use cache::ResponseCache;
pub use core::{API_REQUEST_COMMAND, CommandService, EventSubscription};
pub use inflight::{InFlightRegistry, SharedReply, command_key};

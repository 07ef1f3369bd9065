//! Builder pattern for [`CommandService`].
//!
//! # Example
//!
//! ```no_run
//! use wallet_transport::config::{HostEnvironment, detect};
//! use wallet_transport::CommandService;
//!
//! # async fn example() -> wallet_transport::Result<()> {
//! let service = CommandService::builder()
//!     .config(detect(&HostEnvironment::from_env()))
//!     .build()?;
//! service.init().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::transport::LocalBridge;

use super::core::CommandService;

// ============================================================================
// ServiceBuilder
// ============================================================================

/// Builder for a [`CommandService`].
///
/// Use [`CommandService::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ServiceBuilder {
    config: Option<TransportConfig>,
    bridge: Option<Arc<dyn LocalBridge>>,
    http_client: Option<reqwest::Client>,
}

impl fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("config", &self.config)
            .field("bridge", &self.bridge.is_some())
            .field("http_client", &self.http_client.is_some())
            .finish()
    }
}

impl ServiceBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the host bridge used in Local mode.
    #[inline]
    #[must_use]
    pub fn bridge(mut self, bridge: Arc<dyn LocalBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Uses a pre-built HTTP client instead of the default one.
    #[inline]
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the service with validation.
    ///
    /// A Local-mode service without a bridge is allowed; every command then
    /// fails with "Local bridge not available".
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no configuration was set
    /// - [`Error::Config`] if Network mode has no base URL
    /// - [`Error::Http`] if the default HTTP client cannot be built
    pub fn build(self) -> Result<CommandService> {
        let config = self.validate_config()?;

        if config.is_local() && self.bridge.is_none() {
            warn!("Local mode selected without a bridge; commands will fail");
        }

        CommandService::new(config, self.bridge, self.http_client)
    }

    fn validate_config(&self) -> Result<TransportConfig> {
        let config = self.config.clone().ok_or_else(|| {
            Error::config(
                "Transport configuration is required. Use .config() to set it.\n\
                 Example: CommandService::builder().config(detect(&env))",
            )
        })?;

        if config.is_network() && config.base_url.is_none() {
            return Err(Error::config("Network mode requires a base URL"));
        }

        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

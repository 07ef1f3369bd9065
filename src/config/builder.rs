//! Builder pattern for transport configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wallet_transport::config::{TransportConfig, TransportMode};
//!
//! # fn example() -> wallet_transport::Result<()> {
//! let config = TransportConfig::builder()
//!     .mode(TransportMode::Network)
//!     .base_url("https://wallet.example.com")?
//!     .stream_url("wss://wallet.example.com/ws")?
//!     .timeout(Duration::from_secs(10))
//!     .max_retries(2)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for correlated streaming requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of HTTP retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Fixed delay before a dropped stream is reopened.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

// ============================================================================
// TransportMode
// ============================================================================

/// Which backend commands are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// In-process bridge supplied by a desktop or embedded host.
    Local,
    /// HTTP command endpoint plus optional WebSocket stream.
    Network,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Network => f.write_str("network"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "network" | "http" => Ok(Self::Network),
            other => Err(Error::config(format!("unknown transport mode '{other}'"))),
        }
    }
}

// ============================================================================
// TransportConfig
// ============================================================================

/// Immutable transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Backend selection.
    pub mode: TransportMode,

    /// Origin of the HTTP API (`{base_url}/api/command`).
    pub base_url: Option<Url>,

    /// WebSocket endpoint for push events and correlated requests.
    pub stream_url: Option<Url>,

    /// Timeout for correlated streaming requests.
    pub timeout: Duration,

    /// HTTP retries after the first failed attempt.
    pub max_retries: u32,

    /// Delay before reopening a dropped stream.
    pub reconnect_delay: Duration,

    /// Route `command()` over the stream while it is connected.
    pub prefer_stream: bool,
}

impl TransportConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }

    /// Local-mode configuration with default timings.
    #[must_use]
    pub fn local() -> Self {
        Self {
            mode: TransportMode::Local,
            base_url: None,
            stream_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            prefer_stream: true,
        }
    }

    /// Network-mode configuration with default timings.
    #[must_use]
    pub fn network(base_url: Url, stream_url: Option<Url>) -> Self {
        Self {
            mode: TransportMode::Network,
            base_url: Some(base_url),
            stream_url,
            ..Self::local()
        }
    }

    /// Returns `true` when commands go through the local bridge.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.mode == TransportMode::Local
    }

    /// Returns `true` when commands go over the network.
    #[inline]
    #[must_use]
    pub fn is_network(&self) -> bool {
        self.mode == TransportMode::Network
    }
}

/// Joins an absolute path onto a base URL, keeping any base path prefix.
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url> {
    let mut prefix = base.as_str().trim_end_matches('/').to_string();
    prefix.push('/');
    Ok(Url::parse(&prefix)?.join(path.trim_start_matches('/'))?)
}

// ============================================================================
// TransportConfigBuilder
// ============================================================================

/// Builder for [`TransportConfig`].
///
/// Use [`TransportConfig::builder()`] to create a new builder.
#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    mode: Option<TransportMode>,
    base_url: Option<Url>,
    stream_url: Option<Url>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    reconnect_delay: Option<Duration>,
    prefer_stream: Option<bool>,
}

impl TransportConfigBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport mode.
    #[inline]
    #[must_use]
    pub fn mode(mut self, mode: TransportMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the HTTP base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `url` does not parse.
    pub fn base_url(mut self, url: &str) -> Result<Self> {
        self.base_url = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Sets the WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `url` does not parse.
    pub fn stream_url(mut self, url: &str) -> Result<Self> {
        self.stream_url = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Sets the correlated request timeout.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the HTTP retry budget.
    #[inline]
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the stream reconnect delay.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Enables or disables command routing over the stream.
    #[inline]
    #[must_use]
    pub fn prefer_stream(mut self, prefer: bool) -> Self {
        self.prefer_stream = Some(prefer);
        self
    }

    /// Builds the configuration with validation.
    ///
    /// Mode defaults to `Network` when a base URL was given, `Local` otherwise.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if Network mode has no base URL
    /// - [`Error::Config`] if a URL has the wrong scheme
    pub fn build(self) -> Result<TransportConfig> {
        let mode = self.mode.unwrap_or(if self.base_url.is_some() {
            TransportMode::Network
        } else {
            TransportMode::Local
        });

        if mode == TransportMode::Network && self.base_url.is_none() {
            return Err(Error::config(
                "Network mode requires a base URL. Use .base_url() to set it.",
            ));
        }

        if let Some(url) = &self.base_url
            && !matches!(url.scheme(), "http" | "https")
        {
            return Err(Error::config(format!(
                "base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if let Some(url) = &self.stream_url
            && !matches!(url.scheme(), "ws" | "wss")
        {
            return Err(Error::config(format!(
                "stream URL must be ws or wss, got '{}'",
                url.scheme()
            )));
        }

        Ok(TransportConfig {
            mode,
            base_url: self.base_url,
            stream_url: self.stream_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            reconnect_delay: self.reconnect_delay.unwrap_or(DEFAULT_RECONNECT_DELAY),
            prefer_stream: self.prefer_stream.unwrap_or(true),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Environment detection.
//!
//! [`detect`] is a pure function of a [`HostEnvironment`]. Nothing here reads
//! ambient state except [`HostEnvironment::from_env`], which only gathers
//! inputs for `detect`.
//!
//! Priority:
//!
//! 1. Explicit override mode or base URL
//! 2. Local bridge present
//! 3. Network, derived from the page location (dev server exception applies)
//!
//! In Network mode a stream URL override is used whenever it is set, and
//! overrides with the wrong scheme are ignored in favour of derived values.

// ============================================================================
// Imports
// ============================================================================

use std::env;

use tracing::{debug, warn};
use url::Url;

use super::builder::{TransportConfig, TransportMode};

// ============================================================================
// Constants
// ============================================================================

/// Host of the front-end dev server.
const DEV_HOST: &str = "localhost";

/// Port of the front-end dev server.
const DEV_PORT: u16 = 4200;

/// Backend the dev server talks to, and the fallback when nothing is known.
const DEV_SERVER_URL: &str = "http://localhost:8000";

/// Path of the WebSocket endpoint relative to the API origin.
const STREAM_PATH: &str = "/ws";

/// Environment variable overriding the mode.
pub const ENV_MODE: &str = "WALLET_TRANSPORT_MODE";

/// Environment variable overriding the HTTP base URL.
pub const ENV_BASE_URL: &str = "WALLET_API_BASE_URL";

/// Environment variable overriding the WebSocket URL.
pub const ENV_STREAM_URL: &str = "WALLET_STREAM_URL";

// ============================================================================
// HostEnvironment
// ============================================================================

/// Explicit inputs describing the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Whether the host exposes an in-process bridge.
    pub bridge_available: bool,

    /// Location of the page or app embedding the client.
    pub location: Option<Url>,

    /// Forced transport mode.
    pub override_mode: Option<TransportMode>,

    /// Forced HTTP base URL.
    pub override_base_url: Option<Url>,

    /// Forced WebSocket URL.
    pub override_stream_url: Option<Url>,
}

impl HostEnvironment {
    /// Creates an empty environment (no bridge, no location).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from `WALLET_TRANSPORT_MODE`, `WALLET_API_BASE_URL`
    /// and `WALLET_STREAM_URL`.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let override_mode = env::var(ENV_MODE).ok().and_then(|raw| {
            raw.parse()
                .inspect_err(|e| warn!(var = ENV_MODE, error = %e, "Ignoring override"))
                .ok()
        });

        Self {
            override_mode,
            override_base_url: url_from_env(ENV_BASE_URL),
            override_stream_url: url_from_env(ENV_STREAM_URL),
            ..Self::default()
        }
    }

    /// Marks the local bridge as present.
    #[inline]
    #[must_use]
    pub fn with_bridge(mut self) -> Self {
        self.bridge_available = true;
        self
    }

    /// Sets the page location.
    #[inline]
    #[must_use]
    pub fn with_location(mut self, location: Url) -> Self {
        self.location = Some(location);
        self
    }

    /// Forces a transport mode.
    #[inline]
    #[must_use]
    pub fn with_override_mode(mut self, mode: TransportMode) -> Self {
        self.override_mode = Some(mode);
        self
    }

    /// Forces an HTTP base URL.
    #[inline]
    #[must_use]
    pub fn with_override_base_url(mut self, url: Url) -> Self {
        self.override_base_url = Some(url);
        self
    }

    /// Forces a WebSocket URL.
    #[inline]
    #[must_use]
    pub fn with_override_stream_url(mut self, url: Url) -> Self {
        self.override_stream_url = Some(url);
        self
    }
}

fn url_from_env(var: &str) -> Option<Url> {
    let raw = env::var(var).ok()?;
    Url::parse(&raw)
        .inspect_err(|e| warn!(var, error = %e, "Ignoring override"))
        .ok()
}

// ============================================================================
// Detection
// ============================================================================

/// Picks a transport configuration for the host.
///
/// Always returns a usable config: Network is the universal fallback.
#[must_use]
pub fn detect(env: &HostEnvironment) -> TransportConfig {
    let config = match env.override_mode {
        Some(TransportMode::Local) => TransportConfig::local(),
        Some(TransportMode::Network) => network_config(env),
        // An override base URL without a mode means Network.
        None if env.override_base_url.is_some() => network_config(env),
        None if env.bridge_available => TransportConfig::local(),
        None => network_config(env),
    };

    debug!(
        mode = %config.mode,
        base_url = ?config.base_url.as_ref().map(Url::as_str),
        stream_url = ?config.stream_url.as_ref().map(Url::as_str),
        "Transport detected"
    );

    config
}

/// Network config from overrides where their schemes fit, derived values otherwise.
fn network_config(env: &HostEnvironment) -> TransportConfig {
    let base = accepted_override(env.override_base_url.as_ref(), &["http", "https"])
        .unwrap_or_else(|| derive_base_url(env.location.as_ref()));
    let stream = accepted_override(env.override_stream_url.as_ref(), &["ws", "wss"])
        .or_else(|| stream_url_for(&base));
    TransportConfig::network(base, stream)
}

fn accepted_override(url: Option<&Url>, schemes: &[&str]) -> Option<Url> {
    let url = url?;
    if schemes.contains(&url.scheme()) {
        Some(url.clone())
    } else {
        warn!(url = %url, expected = ?schemes, "Ignoring override with unsupported scheme");
        None
    }
}

/// Origin of the page, or the dev server when running under the dev host.
fn derive_base_url(location: Option<&Url>) -> Url {
    let dev_server = || Url::parse(DEV_SERVER_URL).expect("dev server URL is valid");

    let Some(location) = location else {
        return dev_server();
    };

    if location.host_str() == Some(DEV_HOST) && location.port() == Some(DEV_PORT) {
        return dev_server();
    }

    match Url::parse(&location.origin().ascii_serialization()) {
        Ok(origin) if matches!(origin.scheme(), "http" | "https") => origin,
        _ => dev_server(),
    }
}

/// `http(s)://host[:port]/...` becomes `ws(s)://host[:port]/ws`.
fn stream_url_for(base: &Url) -> Option<Url> {
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        _ => return None,
    };

    let mut stream = base.clone();
    stream.set_scheme(scheme).ok()?;
    stream.set_path(STREAM_PATH);
    stream.set_query(None);
    stream.set_fragment(None);
    Some(stream)
}

// ============================================================================
// Tests
// ============================================================================

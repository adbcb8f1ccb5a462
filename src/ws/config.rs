#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::fmt;
use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;
use url::Url;

use crate::Result;
use crate::error::Error;

const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_secs(3);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_HEARTBEAT_TIMEOUT_DURATION: Duration = Duration::from_secs(15);

/// Subpath used when none is given.
pub const DEFAULT_SUBPATH: &str = "/";

/// Hostname that marks a local development origin.
const LOCAL_DEVELOPMENT_HOST: &str = "localhost";

/// Configuration for a [`ConnectionManager`](super::ConnectionManager).
///
/// Immutable once handed to the manager.
///
/// ```
/// use live_channel::ws::config::{Config, Endpoint};
///
/// # fn main() -> live_channel::Result<()> {
/// let config = Config::builder()
///     .endpoint(Endpoint::new("ws://127.0.0.1:8080", "/live")?)
///     .reload_on_disconnect(false)
///     .build();
///
/// assert_eq!(config.endpoint.as_str(), "ws://127.0.0.1:8080/live");
/// # Ok(())
/// # }
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Server address the channel connects to (`url` + `subpath`)
    pub endpoint: Endpoint,
    /// Restart the whole application instead of reconnecting when the channel drops
    #[builder(default)]
    pub reload_on_disconnect: bool,
    /// Delay applied before every reconnect or restart
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// PING/PONG liveness probing while connected. `None` relies on transport events only.
    pub heartbeat: Option<HeartbeatConfig>,
}

impl Config {
    /// Build the default configuration for an application served from `origin`.
    ///
    /// The WebSocket address is the origin with its scheme mapped `http`→`ws` and
    /// `https`→`wss`, the subpath is `/`, and reload-on-disconnect is enabled only
    /// when the origin host is `localhost`.
    pub fn for_origin(origin: &str) -> Result<Self> {
        let endpoint = Endpoint::from_origin(origin, DEFAULT_SUBPATH)?;
        let reload_on_disconnect = endpoint.is_local_development();

        Ok(Self::builder()
            .endpoint(endpoint)
            .reload_on_disconnect(reload_on_disconnect)
            .build())
    }
}

/// Full WebSocket address of the channel: a base `url` with a `subpath` appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
    subpath: String,
    url: Url,
}

impl Endpoint {
    /// Join a `ws://` or `wss://` base address with `subpath`.
    pub fn new(url: &str, subpath: &str) -> Result<Self> {
        let base = url.trim_end_matches('/').to_owned();
        let subpath = if subpath.starts_with('/') {
            subpath.to_owned()
        } else {
            format!("/{subpath}")
        };

        let url = Url::parse(&format!("{base}{subpath}"))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "endpoint scheme must be ws or wss, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::validation("endpoint must name a host"));
        }

        Ok(Self { base, subpath, url })
    }

    /// Derive the endpoint from a page or service origin such as `https://example.com`.
    pub fn from_origin(origin: &str, subpath: &str) -> Result<Self> {
        Self::new(&websocket_origin(origin)?, subpath)
    }

    /// Base address without the subpath.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn subpath(&self) -> &str {
        &self.subpath
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Whether this endpoint points at a local development server.
    #[must_use]
    pub fn is_local_development(&self) -> bool {
        self.url.host_str() == Some(LOCAL_DEVELOPMENT_HOST)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an `http(s)` origin to its `ws(s)` counterpart. `ws(s)` origins pass through.
pub fn websocket_origin(origin: &str) -> Result<String> {
    let origin = origin.trim_end_matches('/');
    let (scheme, rest) = origin
        .split_once("://")
        .ok_or_else(|| Error::validation(format!("origin {origin} has no scheme")))?;

    let mapped = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::validation(format!(
                "origin scheme must be http or https, got {other}"
            )));
        }
    };

    Ok(format!("{mapped}://{rest}"))
}

/// Configuration for reconnection timing.
///
/// The delay is fixed: every attempt waits the same amount of time. A handshake
/// that has not completed within `connect_timeout` counts as a failed attempt.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait between losing the channel and the next attempt (or restart)
    pub delay: Duration,
    /// Upper bound on the TCP connect plus WebSocket handshake of one attempt
    pub connect_timeout: Duration,
}

impl ReconnectConfig {
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY_DURATION,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_DURATION,
        }
    }
}

impl From<ReconnectConfig> for Constant {
    fn from(config: ReconnectConfig) -> Self {
        Constant::new(config.delay)
    }
}

/// Configuration for PING/PONG liveness probing.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval for sending PING frames to keep the connection alive
    pub interval: Duration,
    /// Maximum time to wait for a PONG before considering the connection dead
    pub timeout: Duration,
}

impl HeartbeatConfig {
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL_DURATION,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT_DURATION,
        }
    }
}

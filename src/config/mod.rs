//! Client configuration — endpoint address, transport order, and reconnection policy.
//!
//! The endpoint is read from the [`ENDPOINT_ENV`] environment variable and falls
//! back to [`DEFAULT_ENDPOINT`] when the variable is unset or empty. Everything
//! else uses the defaults listed on [`ClientConfig::default`] unless a JSON
//! document overrides it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the transport endpoint address.
///
/// Replaces `VITE_SOCKET_URL` from the browser client; the bundler prefix is
/// dropped and the old name is not read.
pub const ENDPOINT_ENV: &str = "SOCKET_URL";

/// Endpoint used when [`ENDPOINT_ENV`] is unset or empty.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid client configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A transport mechanism the underlying channel may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Persistent bidirectional socket.
    WebSocket,
    /// Long-polling fallback.
    Polling,
}

impl TransportKind {
    /// Returns the wire name of the transport.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        }
    }
}

/// Reconnection policy handed to the transport.
///
/// The connection manager never retries on its own; transports consult this
/// policy and the manager only reflects the resulting lifecycle events.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use chatlink::config::ReconnectPolicy;
///
/// let policy = ReconnectPolicy::default();
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
/// assert!(policy.allows_attempt(1_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Whether the transport reconnects at all.
    pub enabled: bool,
    /// Upper bound on consecutive attempts; `None` means unbounded.
    pub attempts: Option<u32>,
    /// Delay before the first attempt, in milliseconds.
    pub delay_ms: u64,
    /// Cap on the delay between attempts, in milliseconds.
    pub delay_max_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: None,
            delay_ms: 1_000,
            delay_max_ms: 5_000,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Returns the delay before the zero-based `attempt`.
    ///
    /// The delay doubles on every attempt starting from `delay_ms` and never
    /// exceeds `delay_max_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self.delay_ms.saturating_mul(factor).min(self.delay_max_ms);
        Duration::from_millis(millis)
    }

    /// Returns `true` if the zero-based `attempt` may be made.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        if !self.enabled {
            return false;
        }
        match self.attempts {
            Some(limit) => attempt < limit,
            None => true,
        }
    }
}

/// Configuration for the single real-time connection owned by a
/// [`ConnectionManager`](crate::session::ConnectionManager).
///
/// # Examples
///
/// ```
/// use chatlink::config::{ClientConfig, TransportKind, DEFAULT_ENDPOINT};
///
/// let config = ClientConfig::from_lookup(|_| None);
/// assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
/// assert_eq!(config.transports, vec![TransportKind::WebSocket, TransportKind::Polling]);
/// assert!(config.auto_connect);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Address of the messaging backend.
    pub endpoint: String,
    /// Transport preference order.
    pub transports: Vec<TransportKind>,
    /// Reconnection policy passed through to the transport.
    pub reconnection: ReconnectPolicy,
    /// Connect as soon as the connection instance is created.
    pub auto_connect: bool,
}

impl Default for ClientConfig {
    /// | Setting            | Default                       |
    /// |--------------------|-------------------------------|
    /// | Endpoint           | `http://localhost:3000`       |
    /// | Transports         | `websocket`, then `polling`   |
    /// | Reconnection       | enabled, unbounded attempts   |
    /// | Reconnect delay    | 1 s growing to a 5 s cap      |
    /// | Auto-connect       | `true`                        |
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnection: ReconnectPolicy::default(),
            auto_connect: true,
        }
    }
}

impl ClientConfig {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration, resolving [`ENDPOINT_ENV`] through `lookup`.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_ENV)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());

        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Parses a JSON configuration document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid JSON or a
    /// field has the wrong type.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Replaces the endpoint address.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Enables or disables connecting on creation.
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Replaces the reconnection policy.
    pub fn with_reconnection(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    /// The transport tried first.
    pub fn preferred_transport(&self) -> Option<TransportKind> {
        self.transports.first().copied()
    }
}

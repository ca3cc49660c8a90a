//! Connection state and its transition function.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::realtime::{EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT, TransportError};

/// Where a managed connection is in its lifecycle.
///
/// ```text
/// Uninitialized ──acquire──▶ Connecting ──open──▶ Connected
///                               ▲                    │ close / error
///                               └── transport ◀── Disconnected
///                                   reconnects
/// any ──release──▶ Released (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
    Released,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport lifecycle event, decoded from its wire name and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The handshake completed; carries the session id read from the transport.
    Open { session_id: Option<String> },
    /// An open session ended.
    Close { reason: String },
    /// A connection attempt failed.
    Error { message: String },
}

impl LifecycleEvent {
    /// Decodes a lifecycle event. Returns `None` for any other event name.
    pub fn from_wire(event: &str, payload: &Value, session_id: Option<String>) -> Option<Self> {
        match event {
            EVENT_CONNECT => Some(Self::Open { session_id }),
            EVENT_DISCONNECT => Some(Self::Close {
                reason: payload.as_str().unwrap_or("unknown").to_owned(),
            }),
            EVENT_CONNECT_ERROR => {
                let message = match TransportError::from_connect_payload(payload) {
                    TransportError::Connect { message } => message,
                    other => other.to_string(),
                };
                Some(Self::Error { message })
            }
            _ => None,
        }
    }
}

/// Observable view of the managed connection.
///
/// Only the connection manager mutates it, and only through
/// [`apply`](Self::apply) in response to transport events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    status: ConnectionStatus,
    session_id: Option<String>,
    reason: Option<String>,
}

impl ConnectionState {
    /// State before any activation.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// State of a freshly created instance whose handshake has started.
    pub fn connecting() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            ..Self::default()
        }
    }

    /// State of a freshly created instance that has not been told to connect.
    pub fn idle() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            ..Self::default()
        }
    }

    /// State after teardown.
    pub fn released() -> Self {
        Self {
            status: ConnectionStatus::Released,
            ..Self::default()
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Session id; present only while connected.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Why the last close or error happened. Diagnostic only.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Applies one lifecycle event. `Released` absorbs every event.
    ///
    /// Returns `true` if the state changed.
    pub fn apply(&mut self, event: &LifecycleEvent) -> bool {
        if self.status == ConnectionStatus::Released {
            return false;
        }

        let next = match event {
            LifecycleEvent::Open { session_id } => Self {
                status: ConnectionStatus::Connected,
                session_id: session_id.clone(),
                reason: None,
            },
            LifecycleEvent::Close { reason } => Self {
                status: ConnectionStatus::Disconnected,
                session_id: None,
                reason: Some(reason.clone()),
            },
            LifecycleEvent::Error { message } => Self {
                status: ConnectionStatus::Disconnected,
                session_id: None,
                reason: Some(message.clone()),
            },
        };

        if *self == next {
            return false;
        }
        *self = next;
        true
    }
}

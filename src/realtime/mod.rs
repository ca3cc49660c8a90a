//! Real-time transport boundary — the event channel a connection manager drives.
//!
//! A transport is a bidirectional channel carrying named, JSON-typed events in
//! both directions. This module defines the contract the rest of the crate
//! depends on and nothing more; framing, reconnection backoff, and polling
//! fallback belong to the transport implementation.
//!
//! ## Core types
//!
//! - [`Transport`] — one session with the messaging backend.
//! - [`Connector`] — constructs transports from a [`ClientConfig`].
//! - [`Listeners`] — ordered handler registry transports can build on.
//! - [`local`] — an in-process transport for tests and demos.
//!
//! ## Lifecycle events
//!
//! | Event                   | Payload                                   |
//! |-------------------------|-------------------------------------------|
//! | [`EVENT_CONNECT`]       | none (`null`)                             |
//! | [`EVENT_DISCONNECT`]    | reason string                             |
//! | [`EVENT_CONNECT_ERROR`] | `{ "message": string }` or a bare string  |

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;

pub mod listeners;
pub mod local;

pub use listeners::{Handler, ListenerId, Listeners};

/// Fired once the session handshake completes and [`Transport::id`] is populated.
pub const EVENT_CONNECT: &str = "connect";

/// Fired when an open session ends, with a human-readable reason.
pub const EVENT_DISCONNECT: &str = "disconnect";

/// Fired when a connection attempt fails (bad endpoint, handshake rejection,
/// network failure).
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

/// Errors produced by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot emit `{event}`: transport is not connected")]
    NotConnected { event: String },

    #[error("transport has been terminated")]
    Terminated,

    #[error("connection failed: {message}")]
    Connect { message: String },

    #[error("failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    /// Builds a [`TransportError::Connect`] from a `connect_error` payload.
    ///
    /// Accepts either `{ "message": ... }` or a bare string.
    pub fn from_connect_payload(payload: &Value) -> Self {
        let message = match payload {
            Value::String(message) => message.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown connection error")
                .to_owned(),
            _ => "unknown connection error".to_owned(),
        };
        Self::Connect { message }
    }
}

/// The state of the underlying transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportStatus {
    /// A handshake is in flight.
    Connecting,
    /// The session is established.
    Open,
    /// No session; either never connected, dropped, or terminated.
    Closed,
}

impl TransportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One session with the messaging backend.
///
/// Handlers registered with [`on`](Self::on) for the same event must be invoked
/// in registration order. Implementations must not hold internal locks while
/// invoking handlers, since handlers may call back into the transport.
pub trait Transport: Send + Sync + 'static {
    /// Starts (or restarts) the handshake.
    fn connect(&self);

    /// Terminates the session. Terminated transports are never reused.
    fn disconnect(&self);

    /// Registers `handler` for `event` and returns an id for [`off`](Self::off).
    fn on(&self, event: &str, handler: Handler) -> ListenerId;

    /// Removes one handler, or every handler for `event` when `listener` is `None`.
    fn off(&self, event: &str, listener: Option<ListenerId>);

    /// Sends a named event to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] when no session is open and
    /// [`TransportError::Terminated`] after [`disconnect`](Self::disconnect).
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// The session identifier assigned by the backend; `None` until open.
    fn id(&self) -> Option<String>;

    /// Current session state.
    fn status(&self) -> TransportStatus;

    /// The configured endpoint address.
    fn endpoint(&self) -> &str;
}

/// Constructs transports.
///
/// Construction never fails: problems with the endpoint or the handshake are
/// reported through [`EVENT_CONNECT_ERROR`] once the transport connects.
/// Implementations must not connect inside [`create`](Self::create); the
/// caller decides when to call [`Transport::connect`].
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn create(&self, config: &ClientConfig) -> Arc<Self::Transport>;
}

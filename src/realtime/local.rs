//! In-process transport — a loopback stand-in for the messaging backend.
//!
//! [`LocalTransport`] implements [`Transport`] without any network. The
//! "remote" side is driven by the owner of the transport through
//! [`accept`](LocalTransport::accept), [`drop_connection`](LocalTransport::drop_connection),
//! [`reject`](LocalTransport::reject), and [`deliver`](LocalTransport::deliver),
//! which makes it the event-dispatch shim for exercising a
//! [`ConnectionManager`](crate::session::ConnectionManager) deterministically.
//!
//! Remote-side controls dispatch to whatever handlers are still registered,
//! even after the transport has been terminated, so late arrivals can be
//! simulated.
//!
//! # Examples
//!
//! ```
//! use chatlink::config::ClientConfig;
//! use chatlink::realtime::{Connector, Transport, TransportStatus};
//! use chatlink::realtime::local::LocalConnector;
//!
//! let connector = LocalConnector::new();
//! let transport = connector.create(&ClientConfig::default());
//! transport.connect();
//! assert_eq!(transport.status(), TransportStatus::Connecting);
//!
//! transport.accept("abc123");
//! assert_eq!(transport.id().as_deref(), Some("abc123"));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use super::{
    Connector, EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT, Handler, ListenerId,
    Listeners, Transport, TransportError, TransportStatus,
};
use crate::config::{ClientConfig, ReconnectPolicy, TransportKind};

/// Reason reported when the client side terminates the session.
pub const CLIENT_DISCONNECT_REASON: &str = "io client disconnect";

/// Endpoint schemes the local transport accepts.
const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

#[derive(Debug)]
struct Inner {
    status: TransportStatus,
    session_id: Option<String>,
    listeners: Listeners,
    outbox: Vec<(String, Value)>,
    terminated: bool,
    connect_calls: u32,
    // Failed attempts since the last successful open.
    failures: u32,
}

/// A loopback [`Transport`] controlled from the same process.
#[derive(Debug)]
pub struct LocalTransport {
    endpoint: String,
    kind: Option<TransportKind>,
    policy: ReconnectPolicy,
    honor_off: bool,
    inner: Mutex<Inner>,
}

impl LocalTransport {
    /// Creates a closed transport for `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            kind: config.preferred_transport(),
            policy: config.reconnection.clone(),
            honor_off: true,
            inner: Mutex::new(Inner {
                status: TransportStatus::Closed,
                session_id: None,
                listeners: Listeners::new(),
                outbox: Vec::new(),
                terminated: false,
                connect_calls: 0,
                failures: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: &str, payload: Value) {
        // Snapshot first: handlers may call back into the transport.
        let handlers = self.lock().listeners.matching(event);
        debug!(event, handlers = handlers.len(), "dispatching local event");
        for handler in handlers {
            handler(&payload);
        }
    }

    /// Completes the handshake and assigns `session_id`.
    pub fn accept(&self, session_id: impl Into<String>) {
        {
            let mut inner = self.lock();
            if !inner.terminated {
                inner.status = TransportStatus::Open;
                inner.session_id = Some(session_id.into());
                inner.failures = 0;
            }
        }
        self.dispatch(EVENT_CONNECT, Value::Null);
    }

    /// Drops an open session from the remote side.
    pub fn drop_connection(&self, reason: &str) {
        {
            let mut inner = self.lock();
            if !inner.terminated {
                inner.status = TransportStatus::Closed;
                inner.session_id = None;
                inner.failures += 1;
            }
        }
        self.dispatch(EVENT_DISCONNECT, Value::String(reason.to_owned()));
    }

    /// Fails the pending handshake with `message`.
    pub fn reject(&self, message: &str) {
        {
            let mut inner = self.lock();
            if !inner.terminated {
                inner.status = TransportStatus::Closed;
                inner.session_id = None;
                inner.failures += 1;
            }
        }
        self.dispatch(EVENT_CONNECT_ERROR, json!({ "message": message }));
    }

    /// Delivers an arbitrary server event to registered handlers.
    pub fn deliver(&self, event: &str, payload: Value) {
        self.dispatch(event, payload);
    }

    /// Events emitted by the client side, oldest first.
    pub fn outbox(&self) -> Vec<(String, Value)> {
        self.lock().outbox.clone()
    }

    /// Returns `true` once [`Transport::disconnect`] has been called.
    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    /// How many times [`Transport::connect`] has been called.
    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    /// Number of handlers registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().listeners.count(event)
    }

    /// The transport mechanism this session would use first.
    pub fn kind(&self) -> Option<TransportKind> {
        self.kind
    }

    /// Delay before the next reconnection attempt under the configured policy.
    ///
    /// `None` when nothing has failed since the last open, when the policy has
    /// run out of attempts, or after termination.
    pub fn next_reconnect_delay(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.terminated || inner.failures == 0 {
            return None;
        }
        let attempt = inner.failures - 1;
        self.policy
            .allows_attempt(attempt)
            .then(|| self.policy.delay_for_attempt(attempt))
    }
}

impl Transport for LocalTransport {
    fn connect(&self) {
        let bad_endpoint = {
            let mut inner = self.lock();
            if inner.terminated {
                debug!(endpoint = %self.endpoint, "connect on terminated transport ignored");
                return;
            }
            inner.connect_calls += 1;
            if has_supported_scheme(&self.endpoint) {
                inner.status = TransportStatus::Connecting;
                false
            } else {
                inner.status = TransportStatus::Closed;
                inner.failures += 1;
                true
            }
        };

        if bad_endpoint {
            let message = format!("bad endpoint `{}`", self.endpoint);
            self.dispatch(EVENT_CONNECT_ERROR, json!({ "message": message }));
        }
    }

    fn disconnect(&self) {
        let was_open = {
            let mut inner = self.lock();
            if inner.terminated {
                return;
            }
            let was_open = inner.status == TransportStatus::Open;
            inner.terminated = true;
            inner.status = TransportStatus::Closed;
            inner.session_id = None;
            was_open
        };

        if was_open {
            self.dispatch(
                EVENT_DISCONNECT,
                Value::String(CLIENT_DISCONNECT_REASON.to_owned()),
            );
        }
    }

    fn on(&self, event: &str, handler: Handler) -> ListenerId {
        self.lock().listeners.add(event, handler)
    }

    fn off(&self, event: &str, listener: Option<ListenerId>) {
        if !self.honor_off {
            debug!(event, "off ignored: transport retains listeners");
            return;
        }
        self.lock().listeners.remove(event, listener);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.terminated {
            return Err(TransportError::Terminated);
        }
        if inner.status != TransportStatus::Open {
            return Err(TransportError::NotConnected {
                event: event.to_owned(),
            });
        }
        inner.outbox.push((event.to_owned(), payload));
        Ok(())
    }

    fn id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    fn status(&self) -> TransportStatus {
        self.lock().status
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn has_supported_scheme(endpoint: &str) -> bool {
    endpoint
        .split_once("://")
        .is_some_and(|(scheme, rest)| {
            !rest.is_empty()
                && SUPPORTED_SCHEMES
                    .iter()
                    .any(|supported| scheme.eq_ignore_ascii_case(supported))
        })
}

/// Creates [`LocalTransport`]s and keeps a handle to each one.
///
/// Clones share the same record of created transports, so a harness can keep
/// a clone after handing the connector to a manager.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector {
    created: Arc<Mutex<Vec<Arc<LocalTransport>>>>,
    retain_listeners: bool,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose transports ignore [`Transport::off`], modelling a
    /// channel that keeps delivering to handlers after they were removed.
    pub fn retaining_listeners() -> Self {
        Self {
            retain_listeners: true,
            ..Self::default()
        }
    }

    /// The most recently created transport.
    pub fn latest(&self) -> Option<Arc<LocalTransport>> {
        self.lock().last().cloned()
    }

    /// Every transport created so far, oldest first.
    pub fn created(&self) -> Vec<Arc<LocalTransport>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<LocalTransport>>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for LocalConnector {
    type Transport = LocalTransport;

    fn create(&self, config: &ClientConfig) -> Arc<LocalTransport> {
        let mut transport = LocalTransport::new(config);
        transport.honor_off = !self.retain_listeners;
        let transport = Arc::new(transport);
        self.lock().push(Arc::clone(&transport));
        transport
    }
}

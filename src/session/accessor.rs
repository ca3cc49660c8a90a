//! Connection accessor — read-only lookup of the live connection and its state.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use super::manager::Shared;
use super::state::ConnectionState;
use crate::protocol::ClientEvent;
use crate::realtime::{Connector, Transport, TransportError};

/// The accessor was used before its manager was ever activated.
///
/// This is a programming error in the calling consumer, not a runtime
/// condition to recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connection accessed outside a connection scope: the manager was never activated")]
pub struct ScopeError;

/// A consistent snapshot of the live instance and its state.
pub struct Connection<T> {
    transport: Option<Arc<T>>,
    state: ConnectionState,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("has_transport", &self.transport.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Transport> Connection<T> {
    /// The live transport, or `None` once the instance has been released.
    pub fn transport(&self) -> Option<&Arc<T>> {
        self.transport.as_ref()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Sends a typed client event over the live transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] when there is no transport or
    /// no open session, and [`TransportError::Encode`] if the payload cannot be
    /// serialized.
    pub fn emit(&self, event: &ClientEvent) -> Result<(), TransportError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| TransportError::NotConnected {
                event: event.name().to_owned(),
            })?;
        transport.emit(event.name(), event.payload()?)
    }
}

/// Read-only handle onto a [`ConnectionManager`](super::ConnectionManager) scope.
///
/// Accessors are cheap to clone and never mutate anything.
pub struct ConnectionAccessor<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for ConnectionAccessor<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionAccessor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAccessor").finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionAccessor<C> {
    pub(super) fn new(shared: Arc<Shared<C>>) -> Self {
        Self { shared }
    }

    /// Returns the live instance and its state.
    ///
    /// Once the last activation has been released, including while teardown is
    /// still running, the instance is `None` and the state is `Released`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] if the manager was never activated.
    pub fn current(&self) -> Result<Connection<C::Transport>, ScopeError> {
        let slot = self.shared.lock_slot();
        if !slot.ever_activated {
            return Err(ScopeError);
        }
        Ok(Connection {
            transport: slot
                .live
                .as_ref()
                .and_then(|live| live.visible_transport())
                .map(Arc::clone),
            state: self.shared.state.borrow().clone(),
        })
    }

    /// Subscribes to state changes for reactive reads.
    ///
    /// The receiver keeps observing across teardown, so it sees the final
    /// `Released` state.
    ///
    /// # Errors
    ///
    /// Same as [`current`](Self::current).
    pub fn subscribe(&self) -> Result<watch::Receiver<ConnectionState>, ScopeError> {
        self.current()?;
        Ok(self.shared.state.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::protocol::{ConversationRef, SendMessage};
    use crate::realtime::local::LocalConnector;
    use crate::session::{ConnectionManager, ConnectionStatus};

    fn manager() -> (ConnectionManager<LocalConnector>, LocalConnector) {
        let connector = LocalConnector::new();
        (
            ConnectionManager::new(connector.clone(), ClientConfig::default()),
            connector,
        )
    }

    #[test]
    fn current_inside_scope_returns_instance() {
        let (manager, connector) = manager();
        let activation = manager.activate();
        let current = activation.accessor().current().unwrap();

        assert!(Arc::ptr_eq(
            current.transport().unwrap(),
            &connector.latest().unwrap()
        ));
        assert_eq!(current.state().status(), ConnectionStatus::Connecting);
        assert!(!current.is_connected());
    }

    #[test]
    fn current_after_release_has_no_instance() {
        let (manager, _) = manager();
        let accessor = manager.accessor();
        manager.activate().release();

        let current = accessor.current().unwrap();
        assert!(current.transport().is_none());
        assert_eq!(current.state().status(), ConnectionStatus::Released);
        assert!(!current.is_connected());
        assert_eq!(
            accessor.subscribe().unwrap().borrow().status(),
            ConnectionStatus::Released
        );
    }

    #[test]
    fn emit_after_release_is_not_connected() {
        let (manager, connector) = manager();
        let activation = manager.activate();
        connector.latest().unwrap().accept("abc123");
        let accessor = activation.accessor();
        activation.release();

        let event = ClientEvent::TypingStop(ConversationRef {
            conversation_id: "general".into(),
        });
        let err = accessor.current().unwrap().emit(&event).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected { ref event } if event == "typing:stop"));
        assert!(connector.latest().unwrap().outbox().is_empty());
    }

    #[test]
    fn current_before_activation_fails() {
        let (manager, _) = manager();
        let accessor = manager.accessor();
        assert_eq!(accessor.current().unwrap_err(), ScopeError);
        assert!(accessor.subscribe().is_err());
        assert!(ScopeError.to_string().contains("never activated"));
    }

    #[test]
    fn snapshot_does_not_track_later_events() {
        let (manager, connector) = manager();
        let _activation = manager.activate();
        let before = manager.accessor().current().unwrap();
        connector.latest().unwrap().accept("abc123");

        assert!(!before.is_connected());
        assert!(manager.accessor().current().unwrap().is_connected());
    }

    #[test]
    fn emit_requires_open_session() {
        let (manager, connector) = manager();
        let _activation = manager.activate();
        let event = ClientEvent::TypingStart(ConversationRef {
            conversation_id: "general".into(),
        });

        let err = manager.accessor().current().unwrap().emit(&event).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected { .. }));

        connector.latest().unwrap().accept("abc123");
        manager.accessor().current().unwrap().emit(&event).unwrap();
        let outbox = connector.latest().unwrap().outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, "typing:start");
        assert_eq!(outbox[0].1["conversationId"], "general");
    }

    #[test]
    fn emit_encodes_message_send() {
        let (manager, connector) = manager();
        let _activation = manager.activate();
        connector.latest().unwrap().accept("abc123");

        let event = ClientEvent::MessageSend(SendMessage::text("general", "hello"));
        manager.accessor().current().unwrap().emit(&event).unwrap();

        let (name, payload) = connector.latest().unwrap().outbox().remove(0);
        assert_eq!(name, "message:send");
        assert_eq!(payload["content"], "hello");
        assert_eq!(payload["type"], "text");
    }

    #[tokio::test]
    async fn subscriber_sees_transitions() {
        let (manager, connector) = manager();
        let activation = manager.activate();
        let mut rx = manager.accessor().subscribe().unwrap();
        let transport = connector.latest().unwrap();

        let waiter = tokio::spawn(async move {
            let state = rx
                .wait_for(|state| state.is_connected())
                .await
                .map(|state| state.clone())
                .unwrap();
            (state, rx)
        });

        transport.accept("abc123");
        let (state, mut rx) = waiter.await.unwrap();
        assert_eq!(state.session_id(), Some("abc123"));

        activation.release();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status(), ConnectionStatus::Released);
    }
}

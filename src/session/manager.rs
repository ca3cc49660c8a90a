//! Connection manager — owns the single live transport and keeps
//! [`ConnectionState`] in step with it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::accessor::ConnectionAccessor;
use super::state::{ConnectionState, LifecycleEvent};
use crate::config::ClientConfig;
use crate::realtime::{
    Connector, EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT, ListenerId, Transport,
};

/// The lifecycle events every live instance is observed for.
const OBSERVED_EVENTS: [&str; 3] = [EVENT_CONNECT, EVENT_DISCONNECT, EVENT_CONNECT_ERROR];

/// The live instance and its bookkeeping.
pub(super) struct Live<T> {
    pub(super) transport: Arc<T>,
    observers: [(&'static str, ListenerId); 3],
    activations: usize,
    generation: u64,
    // Set once the last activation is gone and teardown has started.
    pub(super) releasing: bool,
}

impl<T> Live<T> {
    /// The transport, unless teardown has started.
    pub(super) fn visible_transport(&self) -> Option<&Arc<T>> {
        (!self.releasing).then_some(&self.transport)
    }
}

pub(super) struct Slot<T> {
    pub(super) live: Option<Live<T>>,
    pub(super) ever_activated: bool,
}

/// State shared by a manager, its activations, and its accessors.
///
/// Lock order: `lifecycle`, then `slot`, then the `state` channel.
pub(super) struct Shared<C: Connector> {
    connector: C,
    config: ClientConfig,
    // Held for the whole of create and teardown so they never overlap.
    lifecycle: Mutex<()>,
    slot: Mutex<Slot<C::Transport>>,
    pub(super) state: watch::Sender<ConnectionState>,
    // Generation whose observers may mutate `state`. Only read or written
    // inside `state` modify closures, which serializes it with state updates.
    generation: AtomicU64,
}

impl<C: Connector> Shared<C> {
    pub(super) fn lock_slot(&self) -> MutexGuard<'_, Slot<C::Transport>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new generation and publishes `initial` as its state, atomically.
    fn begin_generation(&self, initial: ConnectionState) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = initial;
        });
        generation
    }

    /// Registers the lifecycle observers for `transport`, in order.
    fn observe(
        self: &Arc<Self>,
        transport: &Arc<C::Transport>,
        generation: u64,
    ) -> [(&'static str, ListenerId); 3] {
        OBSERVED_EVENTS.map(|event| {
            let shared = Arc::downgrade(self);
            let source = Arc::downgrade(transport);
            let id = transport.on(
                event,
                Arc::new(move |payload: &Value| {
                    let Some(shared) = shared.upgrade() else {
                        return;
                    };
                    let session_id = source.upgrade().and_then(|transport| transport.id());
                    shared.on_lifecycle(generation, event, payload, session_id);
                }),
            );
            (event, id)
        })
    }

    fn on_lifecycle(
        &self,
        generation: u64,
        event: &str,
        payload: &Value,
        session_id: Option<String>,
    ) {
        let Some(lifecycle) = LifecycleEvent::from_wire(event, payload, session_id) else {
            return;
        };

        let mut stale = false;
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                stale = true;
                return false;
            }
            state.apply(&lifecycle)
        });
        if stale {
            debug!(event, generation, "stale lifecycle event ignored");
            return;
        }

        match &lifecycle {
            LifecycleEvent::Open { session_id } => {
                info!(session_id = session_id.as_deref().unwrap_or("-"), "socket connected");
            }
            LifecycleEvent::Close { reason } => {
                warn!(reason = %reason, "socket disconnected");
            }
            LifecycleEvent::Error { message } => {
                error!(error = %message, "socket connection error");
            }
        }
    }

    /// Drops one activation of `generation`; the last one tears the instance down.
    ///
    /// Teardown invalidates the observers and publishes `Released`, then
    /// deregisters the observers, terminates the transport, and finally clears
    /// the slot. The slot lock is not held across transport calls, since the
    /// transport may dispatch to consumer handlers that read the accessor; the
    /// lifecycle lock keeps a concurrent [`ConnectionManager::activate`] out
    /// until the slot is clear.
    fn release(&self, generation: u64) {
        let _lifecycle = self.lock_lifecycle();
        let (transport, observers) = {
            let mut slot = self.lock_slot();
            let Some(live) = slot.live.as_mut() else {
                return;
            };
            if live.generation != generation || live.releasing {
                return;
            }
            live.activations -= 1;
            if live.activations > 0 {
                debug!(generation, remaining = live.activations, "activation released");
                return;
            }
            live.releasing = true;
            self.state.send_modify(|state| {
                self.generation.fetch_add(1, Ordering::SeqCst);
                *state = ConnectionState::released();
            });
            (Arc::clone(&live.transport), live.observers)
        };

        info!(endpoint = %transport.endpoint(), generation, "cleaning up socket connection");
        for (event, id) in observers {
            transport.off(event, Some(id));
        }
        transport.disconnect();

        let mut slot = self.lock_slot();
        if slot
            .live
            .as_ref()
            .is_some_and(|live| live.generation == generation)
        {
            slot.live = None;
        }
    }
}

/// Owns the single real-time connection for a scope.
///
/// [`activate`](Self::activate) lazily creates the transport through the
/// [`Connector`] and registers lifecycle observers; dropping (or
/// [`release`](Activation::release)-ing) the last [`Activation`] deregisters the
/// observers, terminates the transport, and clears the instance so the next
/// activation starts over with a fresh one.
///
/// Cloning the manager shares the same scope.
///
/// # Examples
///
/// ```
/// use chatlink::config::ClientConfig;
/// use chatlink::realtime::local::LocalConnector;
/// use chatlink::session::{ConnectionManager, ConnectionStatus};
///
/// let connector = LocalConnector::new();
/// let manager = ConnectionManager::new(connector.clone(), ClientConfig::default());
/// let accessor = manager.accessor();
///
/// let activation = manager.activate();
/// connector.latest().unwrap().accept("abc123");
///
/// let current = accessor.current().unwrap();
/// assert_eq!(current.state().session_id(), Some("abc123"));
///
/// activation.release();
/// assert_eq!(manager.state().status(), ConnectionStatus::Released);
/// assert!(accessor.current().unwrap().transport().is_none());
/// ```
pub struct ConnectionManager<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.config.endpoint)
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates an inactive manager. Nothing connects until [`activate`](Self::activate).
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::uninitialized());
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                lifecycle: Mutex::new(()),
                slot: Mutex::new(Slot {
                    live: None,
                    ever_activated: false,
                }),
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Acquires the live instance, creating it if none exists.
    ///
    /// Activations while an instance is live share it; the instance is torn
    /// down when the last of them is released. A call that races a teardown
    /// waits for it to finish, then creates a fresh instance. Must not be
    /// called from a transport handler while that transport is being torn down.
    pub fn activate(&self) -> Activation<C> {
        let shared = &self.shared;
        let _lifecycle = shared.lock_lifecycle();
        let mut slot = shared.lock_slot();
        slot.ever_activated = true;

        match slot.live.as_mut() {
            Some(live) if !live.releasing => {
                live.activations += 1;
                debug!(
                    generation = live.generation,
                    activations = live.activations,
                    "reusing live socket"
                );
                return Activation {
                    shared: Arc::clone(shared),
                    transport: Arc::clone(&live.transport),
                    generation: live.generation,
                    released: false,
                };
            }
            // Only reachable if a teardown unwound before clearing the slot.
            Some(live) => {
                warn!(generation = live.generation, "discarding interrupted teardown");
                slot.live = None;
            }
            None => {}
        }

        let auto_connect = shared.config.auto_connect;
        let transport = shared.connector.create(&shared.config);
        let generation = shared.begin_generation(if auto_connect {
            ConnectionState::connecting()
        } else {
            ConnectionState::idle()
        });
        let observers = shared.observe(&transport, generation);

        info!(
            endpoint = %shared.config.endpoint,
            transport = shared.config.preferred_transport().map_or("none", |kind| kind.as_str()),
            generation,
            "socket created"
        );

        slot.live = Some(Live {
            transport: Arc::clone(&transport),
            observers,
            activations: 1,
            generation,
            releasing: false,
        });
        drop(slot);

        if auto_connect {
            transport.connect();
        }

        Activation {
            shared: Arc::clone(shared),
            transport,
            generation,
            released: false,
        }
    }

    /// A read-only handle for consumers of this scope.
    pub fn accessor(&self) -> ConnectionAccessor<C> {
        ConnectionAccessor::new(Arc::clone(&self.shared))
    }

    /// Returns `true` while at least one activation is live.
    pub fn is_active(&self) -> bool {
        self.shared
            .lock_slot()
            .live
            .as_ref()
            .is_some_and(|live| !live.releasing)
    }

    /// A snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// The configuration every instance is created from.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }
}

/// One activation of a [`ConnectionManager`] scope.
///
/// Released exactly once: either explicitly through [`release`](Self::release)
/// or when dropped, including during unwinding.
#[must_use = "dropping an activation releases it immediately"]
pub struct Activation<C: Connector> {
    shared: Arc<Shared<C>>,
    transport: Arc<C::Transport>,
    generation: u64,
    released: bool,
}

impl<C: Connector> Activation<C> {
    /// The live transport this activation holds.
    pub fn transport(&self) -> &Arc<C::Transport> {
        &self.transport
    }

    /// Identifies the instance this activation belongs to. A new instance
    /// always has a higher generation than any before it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A read-only handle for consumers of this scope.
    pub fn accessor(&self) -> ConnectionAccessor<C> {
        ConnectionAccessor::new(Arc::clone(&self.shared))
    }

    /// Ends this activation.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.shared.release(self.generation);
    }
}

impl<C: Connector> Drop for Activation<C> {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl<C: Connector> fmt::Debug for Activation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("generation", &self.generation)
            .field("released", &self.released)
            .finish()
    }
}

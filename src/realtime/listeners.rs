//! Ordered event handler registry.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// A type-erased, reference-counted event handler.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handlers keyed by event name, kept in registration order.
///
/// `Listeners` does no locking itself; transports wrap it in whatever guard
/// they use and call [`matching`](Self::matching) to snapshot the handlers
/// before invoking them.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::Value;
/// use chatlink::realtime::Listeners;
///
/// let mut listeners = Listeners::new();
/// let id = listeners.add("connect", Arc::new(|_: &Value| {}));
/// listeners.add("connect", Arc::new(|_: &Value| {}));
/// assert_eq!(listeners.matching("connect").len(), 2);
///
/// assert_eq!(listeners.remove("connect", Some(id)), 1);
/// assert_eq!(listeners.remove("connect", None), 1);
/// assert!(listeners.is_empty());
/// ```
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(String, ListenerId, Handler)>,
    next_id: u64,
}

impl Listeners {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` for `event`.
    pub fn add(&mut self, event: &str, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((event.to_owned(), id, handler));
        id
    }

    /// Removes the handler `id` for `event`, or every handler for `event` when
    /// `id` is `None`. Returns how many were removed.
    pub fn remove(&mut self, event: &str, id: Option<ListenerId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(name, listener, _)| {
            name != event || id.is_some_and(|wanted| *listener != wanted)
        });
        before - self.entries.len()
    }

    /// Returns the handlers for `event` in registration order.
    pub fn matching(&self, event: &str) -> Vec<Handler> {
        self.entries
            .iter()
            .filter(|(name, _, _)| name == event)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect()
    }

    /// Number of handlers registered for `event`.
    pub fn count(&self, event: &str) -> usize {
        self.entries.iter().filter(|(name, _, _)| name == event).count()
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, id, _)| (name, id)))
            .finish()
    }
}

//! Connection session — lifecycle management and scoped read access.
//!
//! A [`ConnectionManager`] owns at most one live transport at a time. Each
//! [`Activation`] is a scope: while any activation is held the instance stays
//! alive, and [`ConnectionAccessor`]s resolve to it. When the last activation
//! is released the manager
//!
//! 1. stops honoring events from the instance and publishes `Released`,
//! 2. deregisters its `connect` / `disconnect` / `connect_error` observers,
//! 3. terminates the transport,
//! 4. clears the instance.
//!
//! From step 1 on, accessors see no instance and a `Released` state. An
//! activation racing a teardown waits for step 4. The next activation creates a brand-new instance; a terminated transport is
//! never reused.
//!
//! State only changes in response to transport events, through
//! [`ConnectionState::apply`]. Transport failures never surface as errors from
//! this module; they are folded into the state. The one error that crosses the
//! boundary is [`ScopeError`], returned when an accessor is used before its
//! manager was ever activated.

mod accessor;
mod manager;
mod state;

pub use accessor::{Connection, ConnectionAccessor, ScopeError};
pub use manager::{Activation, ConnectionManager};
pub use state::{ConnectionState, ConnectionStatus, LifecycleEvent};

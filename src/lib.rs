//! # chatlink
//!
//! Connection lifecycle and session state for real-time chat clients.
//!
//! A [`ConnectionManager`] owns the single connection to the messaging backend,
//! keeps a [`ConnectionState`] in step with transport events, and tears the
//! connection down deterministically when its scope ends. Consumers read the
//! connection through a [`ConnectionAccessor`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatlink::config::ClientConfig;
//! use chatlink::realtime::local::LocalConnector;
//! use chatlink::session::ConnectionManager;
//!
//! let manager = ConnectionManager::new(LocalConnector::new(), ClientConfig::from_env());
//! let activation = manager.activate();
//!
//! let current = activation.accessor().current().expect("inside the scope");
//! println!("connected: {}", current.is_connected());
//!
//! activation.release();
//! ```

// ── Connection lifecycle ──────────────────────────────────────────────────────
pub mod config;
pub mod realtime;
pub mod session;

// ── Chat vocabulary and presentation helpers ─────────────────────────────────
pub mod chat;
pub mod protocol;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ClientConfig, ConfigError, ReconnectPolicy, TransportKind};
pub use realtime::{Connector, Transport, TransportError, TransportStatus};
pub use session::{
    Activation, Connection, ConnectionAccessor, ConnectionManager, ConnectionState,
    ConnectionStatus, ScopeError,
};

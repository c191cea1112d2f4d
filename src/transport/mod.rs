//! TCP transport to Firefox's debugger server.
//!
//! This module handles communication between the local end (Rust) and the
//! debugger server Firefox starts with `-start-debugger-server <port>`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  RemoteFirefox  │                              │  Firefox        │
//! │                 │       length-prefixed        │  debugger       │
//! │  Connection     │◄────────────────────────────►│  server         │
//! │  RequestRegistry│      localhost:PORT          │  (actors)       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `find_free_port` - Pick a port nothing listens on
//! 2. Launch Firefox with the debugger server on that port
//! 3. `connect_with_retry` - Connect once Firefox stops refusing
//! 4. `Connection` - Send requests, receive replies and events
//! 5. `Connection::disconnect` - Reject outstanding requests and close
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Socket event loop and request routing |
//! | `connector` | Bounded retry and free-port discovery |
//! | `registry` | Per-actor active and pending requests |

// ============================================================================
// Submodules
// ============================================================================

/// Debugger server connection and event loop.
pub mod connection;

/// Bounded retry and port discovery.
pub mod connector;

/// Per-actor request bookkeeping.
pub(crate) mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionEvent};
pub use connector::{
    Attempt, DEBUGGER_HOST, DEFAULT_DEBUGGER_PORT, DEFAULT_PORT_CANDIDATES, RetryPolicy,
    connect_with_retry, find_free_port, probe_ports, retry,
};

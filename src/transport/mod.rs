//! WebSocket transport layer.
//!
//! This module negotiates and maintains one WebSocket connection per
//! [`ClientTransport::start`] call, relays text frames, and turns socket
//! events into notifications on the owning [`ConnectionContext`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  ConnectionContext   │                         │  Server         │
//! │         ▲            │      ws(s)://…/connect  │                 │
//! │         │ on_error   │◄───────────────────────►│  WebSocket      │
//! │  WebSocketTransport  │      text frames        │  endpoint       │
//! │   → SocketHandle     │                         │                 │
//! │   → TransportHandler │                         │                 │
//! └──────────────────────┘                         └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `connect_url` - Build the connect/reconnect URL from session state
//! 2. `tls` - Build a TLS connector for `wss` (best effort)
//! 3. `socket` - Spawn the socket task and start the handshake
//! 4. `handler` - Resolve the start future, forward frames, report closes
//! 5. `SocketHandle::close` - Idempotent teardown
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connect_url` | Connect URL construction |
//! | `handler` | Socket event state machine |
//! | `socket` | Socket handle and I/O task |
//! | `tls` | TLS connector construction |
//! | `websocket` | The WebSocket transport |

// ============================================================================
// Submodules
// ============================================================================

/// Connect URL construction.
pub mod connect_url;

/// Socket event state machine.
pub mod handler;

/// Socket handle and I/O task.
pub mod socket;

/// TLS connector construction.
pub mod tls;

/// The WebSocket transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::context::ConnectionContext;
use crate::future::AsyncResult;

// ============================================================================
// Re-exports
// ============================================================================

pub use connect_url::ConnectUrl;
pub use handler::{SocketEvents, TransportHandler};
pub use socket::SocketHandle;
pub use websocket::WebSocketTransport;

// ============================================================================
// Types
// ============================================================================

/// Inbound frame callback.
///
/// Invoked once per text frame, in arrival order, on the socket task.
pub type DataCallback = Arc<dyn Fn(String) + Send + Sync>;

// ============================================================================
// ConnectionType
// ============================================================================

/// Whether a start call opens a new session or resumes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// First connection of a session.
    InitialConnection,
    /// Resumption after a lost connection.
    Reconnect,
}

impl ConnectionType {
    /// Returns the URL path segment for this connection type.
    #[inline]
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::InitialConnection => "connect",
            Self::Reconnect => "reconnect",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

// ============================================================================
// TransportState
// ============================================================================

/// Lifecycle state of a transport's current socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No start call yet.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Handshake completed.
    Open,
    /// Closed locally or by the remote end.
    Closed,
    /// Socket error.
    Failed,
}

impl TransportState {
    /// Returns `true` for [`TransportState::Closed`] and [`TransportState::Failed`].
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

// ============================================================================
// ClientTransport
// ============================================================================

/// A client transport the connection layer can negotiate.
pub trait ClientTransport: Send + Sync {
    /// Transport identifier used by server-side negotiation.
    fn name(&self) -> &'static str;

    /// Whether the transport carries keep-alive pings natively.
    fn supports_keep_alive(&self) -> bool;

    /// Opens a connection.
    ///
    /// Returns immediately; the result resolves when the handshake
    /// completes or fails.
    fn start(
        &self,
        context: Arc<dyn ConnectionContext>,
        connection_type: ConnectionType,
        callback: DataCallback,
    ) -> AsyncResult<()>;

    /// Sends one text frame on the open connection.
    fn send(
        &self,
        context: &dyn ConnectionContext,
        data: &str,
        callback: Option<DataCallback>,
    ) -> AsyncResult<()>;
}

// ============================================================================
// Tests
// ============================================================================

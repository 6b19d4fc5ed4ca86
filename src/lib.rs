//! WebSocket client transport for SignalR-style persistent connections.
//!
//! This library opens, maintains and tears down one WebSocket connection per
//! session, relaying text frames between a connection context and the server.
//!
//! # Architecture
//!
//! The transport is a plug-in for a higher-level connection object:
//!
//! - **Connection context**: Owns session state (URL, tokens, headers) and
//!   receives error and close notifications
//! - **Transport**: Builds the connect URL, performs the handshake, forwards
//!   inbound frames and sends outbound frames
//!
//! Key design principles:
//!
//! - Each start call owns: one socket task + one [`AsyncResult`] + one handler
//! - Start never blocks; the handshake outcome arrives through the result
//! - Only a remote close after open is reported as a lost connection
//! - TLS setup failures degrade to the default connector instead of failing
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ws_transport::{
//!     ClientTransport, ConnectionType, Result, SessionContext, WebSocketTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Arc::new(
//!         SessionContext::new("https://example.com/signalr/")
//!             .with_connection_token("token")
//!             .with_connection_data("[{\"name\":\"chat\"}]"),
//!     );
//!
//!     let transport = WebSocketTransport::new();
//!     transport
//!         .start(
//!             session.clone(),
//!             ConnectionType::InitialConnection,
//!             Arc::new(|frame: String| println!("received: {frame}")),
//!         )
//!         .await?;
//!
//!     transport.send(&*session, "{\"H\":\"chat\"}", None).await?;
//!     session.close();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Transport configuration and user agent |
//! | [`context`] | Connection context trait and [`SessionContext`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`future`] | Single-assignment cancellable [`AsyncResult`] |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Transport configuration.
///
/// Use [`TransportConfig::new()`] and its `with_*` methods to customize.
pub mod config;

/// Connection context seen by the transport.
pub mod context;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Completion handles for asynchronous operations.
pub mod future;

/// WebSocket transport layer.
///
/// Connect URL construction, socket task and event handling.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Config types
pub use config::{TlsRoots, TransportConfig, platform_user_agent};

// Context types
pub use context::{CloseNotification, ConnectionContext, Headers, SessionContext};

// Error types
pub use error::{Error, Result};

// Future types
pub use future::{AsyncResult, Outcome};

// Transport types
pub use transport::{
    ClientTransport, ConnectionType, DataCallback, TransportState, WebSocketTransport,
};

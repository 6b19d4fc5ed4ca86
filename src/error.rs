//! Error types for the WebSocket transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_transport::{Result, Error};
//!
//! async fn example(transport: &WebSocketTransport) -> Result<()> {
//!     transport.start(context, ConnectionType::InitialConnection, callback).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Construction | [`Error::UrlConstruction`], [`Error::InvalidHeader`] |
//! | Handshake | [`Error::Handshake`], [`Error::TlsUpgrade`] |
//! | Steady state | [`Error::ConnectionLost`], [`Error::NotOpen`] |
//! | Lifecycle | [`Error::Cancelled`], [`Error::Connection`] |
//! | External | [`Error::Io`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// `Error` is `Clone` so a resolved [`AsyncResult`](crate::AsyncResult) can
/// hand the same failure to every waiter. External errors are kept behind an
/// [`Arc`] for that reason.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// The computed connect URL could not be encoded or parsed.
    ///
    /// Fatal to the start attempt. No socket is created.
    #[error("URL construction failed for '{url}': {message}")]
    UrlConstruction {
        /// The URL string that failed to parse.
        url: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A context header cannot be sent in an HTTP upgrade request.
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader {
        /// Header name as supplied by the context.
        name: String,
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Socket error before the WebSocket handshake completed.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// The TLS connector could not be built.
    ///
    /// Only ever logged; the connect proceeds with the default connector.
    #[error("TLS upgrade failed: {message}")]
    TlsUpgrade {
        /// Description of the TLS failure.
        message: String,
    },

    // ========================================================================
    // Steady-State Errors
    // ========================================================================
    /// An open connection was closed by the remote end or dropped.
    ///
    /// Reported through [`ConnectionContext::on_error`](crate::ConnectionContext::on_error)
    /// with `was_open = true`, never through the start future.
    #[error("Connection lost (code {code}): {reason}")]
    ConnectionLost {
        /// Close reason, or the I/O error text for abnormal closure.
        reason: String,
        /// WebSocket close code (1006 when no close frame was received).
        code: u16,
    },

    /// `send` was called while no socket is open.
    #[error("Socket is not open")]
    NotOpen,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic connection-level failure.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(Arc<IoError>),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(Arc<WsError>),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        match err {
            WsError::Io(io_err) => Self::from(io_err),
            other => Self::WebSocket(Arc::new(other)),
        }
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a URL construction error.
    #[inline]
    pub fn url_construction(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UrlConstruction {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid header error.
    #[inline]
    pub fn invalid_header(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a TLS upgrade error.
    #[inline]
    pub fn tls_upgrade(message: impl Into<String>) -> Self {
        Self::TlsUpgrade {
            message: message.into(),
        }
    }

    /// Creates a connection lost error.
    #[inline]
    pub fn connection_lost(code: u16, reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
            code,
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the error happened before any socket I/O.
    #[inline]
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::UrlConstruction { .. } | Self::InvalidHeader { .. }
        )
    }

    /// Returns `true` if the error ended a previously open connection.
    ///
    /// The outer layer uses this to choose between reconnecting and
    /// renegotiating.
    #[inline]
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }

    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Handshake { .. }
                | Self::ConnectionLost { .. }
                | Self::NotOpen
                | Self::Connection { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if a fresh start attempt may succeed.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Handshake { .. } | Self::ConnectionLost { .. } | Self::Io(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("no runtime");
        assert_eq!(err.to_string(), "Connection failed: no runtime");
    }

    #[test]
    fn test_connection_lost_display() {
        let err = Error::connection_lost(1001, "going away");
        assert_eq!(err.to_string(), "Connection lost (code 1001): going away");
    }

    #[test]
    fn test_url_construction_display() {
        let err = Error::url_construction("nope", "relative URL without a base");
        assert!(err.to_string().contains("'nope'"));
        assert!(err.to_string().contains("relative URL"));
    }

    #[test]
    fn test_is_construction_error() {
        assert!(Error::url_construction("x", "y").is_construction_error());
        assert!(Error::invalid_header("X-A", "bad").is_construction_error());
        assert!(!Error::handshake("refused").is_construction_error());
    }

    #[test]
    fn test_is_connection_lost() {
        assert!(Error::connection_lost(1006, "eof").is_connection_lost());
        assert!(!Error::handshake("refused").is_connection_lost());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::handshake("refused").is_connection_error());
        assert!(Error::NotOpen.is_connection_error());
        assert!(!Error::Cancelled.is_connection_error());
        assert!(!Error::tls_upgrade("no roots").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::connection_lost(1006, "eof").is_recoverable());
        assert!(!Error::url_construction("x", "y").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_ws_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_ws_io_error_maps_to_io() {
        let ws_err = WsError::Io(IoError::new(ErrorKind::ConnectionReset, "reset"));
        let err: Error = ws_err.into();

        assert!(matches!(err, Error::Io(ref io) if io.kind() == ErrorKind::ConnectionReset));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_is_clone() {
        let err: Error = WsError::AlreadyClosed.into();
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}

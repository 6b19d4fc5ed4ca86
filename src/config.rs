//! Transport configuration.
//!
//! Provides a type-safe interface for the knobs a [`WebSocketTransport`]
//! reads when opening a socket: the `User-Agent` it injects, where TLS trust
//! anchors come from, and frame size limits.
//!
//! # Example
//!
//! ```ignore
//! use ws_transport::{TransportConfig, WebSocketTransport};
//!
//! let config = TransportConfig::new()
//!     .with_user_agent("my-app/1.0")
//!     .with_max_message_size(1 << 20);
//!
//! let transport = WebSocketTransport::with_config(config);
//! ```
//!
//! [`WebSocketTransport`]: crate::WebSocketTransport

// ============================================================================
// Imports
// ============================================================================

use rustls::pki_types::CertificateDer;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

// ============================================================================
// Constants
// ============================================================================

/// Product name reported in the `User-Agent` header.
const USER_AGENT_PRODUCT: &str = "SignalR";

/// Client protocol version reported in the `User-Agent` header.
const CLIENT_PROTOCOL_VERSION: &str = "2.0";

// ============================================================================
// Platform
// ============================================================================

/// Returns the platform `User-Agent` string.
///
/// Format: `SignalR (lang=Rust; os=<os>; version=2.0)`
#[must_use]
pub fn platform_user_agent() -> String {
    format!(
        "{USER_AGENT_PRODUCT} (lang=Rust; os={}; version={CLIENT_PROTOCOL_VERSION})",
        std::env::consts::OS
    )
}

// ============================================================================
// TlsRoots
// ============================================================================

/// Source of trust anchors for `wss` connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsRoots {
    /// The platform's native certificate store.
    #[default]
    Native,

    /// An explicit certificate list, replacing the platform store.
    ///
    /// Useful for servers with self-signed certificates.
    Custom(Vec<CertificateDer<'static>>),
}

// ============================================================================
// TransportConfig
// ============================================================================

/// Configuration for [`WebSocketTransport`](crate::WebSocketTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Value injected as the `User-Agent` handshake header.
    pub user_agent: String,

    /// Trust anchors for secure connections.
    pub tls_roots: TlsRoots,

    /// Maximum inbound message size in bytes (`None` = library default).
    pub max_message_size: Option<usize>,

    /// Maximum inbound frame size in bytes (`None` = library default).
    pub max_frame_size: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: platform_user_agent(),
            tls_roots: TlsRoots::Native,
            max_message_size: None,
            max_frame_size: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the `User-Agent` header value.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the trust anchor source.
    #[inline]
    #[must_use]
    pub fn with_tls_roots(mut self, roots: TlsRoots) -> Self {
        self.tls_roots = roots;
        self
    }

    /// Sets the maximum inbound message size.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    /// Sets the maximum inbound frame size.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = Some(bytes);
        self
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl TransportConfig {
    /// Builds the tungstenite socket configuration.
    ///
    /// Returns `None` when every limit is left at the library default.
    pub(crate) fn websocket_config(&self) -> Option<WebSocketConfig> {
        if self.max_message_size.is_none() && self.max_frame_size.is_none() {
            return None;
        }

        let config = WebSocketConfig::default()
            .max_message_size(self.max_message_size)
            .max_frame_size(self.max_frame_size);
        Some(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! The WebSocket transport.
//!
//! [`WebSocketTransport`] implements [`ClientTransport`] over
//! tokio-tungstenite. A start call:
//!
//! 1. Builds the connect URL and parses it (failure: already-failed result)
//! 2. Injects the `User-Agent` header into the context
//! 3. Builds a TLS connector for `wss` (failure: logged, default connector)
//! 4. Spawns the socket task and registers a close notification
//! 5. Returns the still-pending start result
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ws_transport::{ClientTransport, ConnectionType, SessionContext, WebSocketTransport};
//!
//! let session = Arc::new(
//!     SessionContext::new("https://example.com/signalr/").with_connection_token(token),
//! );
//! let transport = WebSocketTransport::new();
//!
//! transport
//!     .start(session.clone(), ConnectionType::InitialConnection, Arc::new(|frame: String| {
//!         println!("received: {frame}");
//!     }))
//!     .await?;
//!
//! transport.send(&*session, "{\"H\":\"chat\",\"M\":\"send\",\"A\":[\"hi\"]}", None);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::TransportConfig;
use crate::context::{ConnectionContext, Headers};
use crate::error::{Error, Result};
use crate::future::AsyncResult;

use super::connect_url::ConnectUrl;
use super::handler::TransportHandler;
use super::socket::{self, SocketHandle, SocketParams};
use super::tls::{self, TLS_LOG_TARGET};
use super::{ClientTransport, ConnectionType, DataCallback, TransportState};

// ============================================================================
// Constants
// ============================================================================

/// Transport identifier sent as the `transport` query parameter.
pub const TRANSPORT_NAME: &str = "webSockets";

/// Header carrying the platform user agent.
const USER_AGENT_HEADER: &str = "User-Agent";

// ============================================================================
// Attempt
// ============================================================================

/// The socket of the latest start call.
struct Attempt {
    handle: SocketHandle,
    state: Arc<Mutex<TransportState>>,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket implementation of [`ClientTransport`].
///
/// # Thread Safety
///
/// `WebSocketTransport` is `Send + Sync`. `start` and `send` never block;
/// socket I/O runs on a task spawned on the caller's tokio runtime.
pub struct WebSocketTransport {
    /// Transport configuration.
    config: TransportConfig,
    /// Socket of the latest start call.
    current: Mutex<Option<Attempt>>,
    /// Set when the last secure start fell back to the default connector.
    tls_degraded: AtomicBool,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("tls_degraded", &self.tls_degraded())
            .finish()
    }
}

// ============================================================================
// WebSocketTransport - Constructors
// ============================================================================

impl WebSocketTransport {
    /// Creates a transport with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Creates a transport with a custom configuration.
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
            tls_degraded: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// WebSocketTransport - Accessors
// ============================================================================

impl WebSocketTransport {
    /// Returns the transport configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the state of the latest socket.
    #[must_use]
    pub fn state(&self) -> TransportState {
        self.current
            .lock()
            .as_ref()
            .map_or(TransportState::Idle, |attempt| *attempt.state.lock())
    }

    /// Returns `true` if the latest socket is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|attempt| attempt.handle.is_open())
    }

    /// Returns `true` if the last secure start could not build its TLS
    /// connector and fell back to the default one.
    #[inline]
    #[must_use]
    pub fn tls_degraded(&self) -> bool {
        self.tls_degraded.load(Ordering::SeqCst)
    }

    /// Closes the latest socket.
    ///
    /// Idempotent. Does nothing before the first start call.
    pub fn close(&self) {
        if let Some(attempt) = self.current.lock().as_ref() {
            attempt.handle.close();
        }
    }
}

// ============================================================================
// WebSocketTransport - Internals
// ============================================================================

impl WebSocketTransport {
    /// Builds the TLS connector, falling back to `None` on failure.
    fn tls_connector(&self) -> Option<Connector> {
        match tls::build_connector(&self.config.tls_roots) {
            Ok(connector) => {
                self.tls_degraded.store(false, Ordering::SeqCst);
                Some(connector)
            }
            Err(e) => {
                warn!(
                    target: TLS_LOG_TARGET,
                    error = %e,
                    "TLS upgrade failed, connecting with default connector"
                );
                self.tls_degraded.store(true, Ordering::SeqCst);
                None
            }
        }
    }

    /// Installs a new attempt, closing any live previous socket.
    fn replace_attempt(&self, attempt: Attempt) {
        let previous = self.current.lock().replace(attempt);

        if let Some(previous) = previous
            && !previous.handle.is_closed()
        {
            warn!("Start called with a live socket, closing previous socket");
            previous.handle.close();
        }
    }
}

/// Builds the upgrade request with the context headers.
fn build_request(uri: &Url, headers: &Headers) -> Result<Request> {
    let mut request = uri.as_str().into_client_request()?;

    let request_headers = request.headers_mut();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_header(name, e.to_string()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| Error::invalid_header(name, e.to_string()))?;
        request_headers.insert(header_name, header_value);
    }

    Ok(request)
}

// ============================================================================
// ClientTransport Implementation
// ============================================================================

impl ClientTransport for WebSocketTransport {
    fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    fn supports_keep_alive(&self) -> bool {
        true
    }

    fn start(
        &self,
        context: Arc<dyn ConnectionContext>,
        connection_type: ConnectionType,
        callback: DataCallback,
    ) -> AsyncResult<()> {
        let url = ConnectUrl::build(context.as_ref(), connection_type, self.name());

        let uri = match url.parse() {
            Ok(uri) => uri,
            Err(e) => {
                error!(error = %e, "Invalid connect URL");
                return AsyncResult::failed(e);
            }
        };

        let Ok(runtime) = Handle::try_current() else {
            return AsyncResult::failed(Error::connection(
                "start must be called within a tokio runtime",
            ));
        };

        context.set_header(USER_AGENT_HEADER, &self.config.user_agent);
        let headers = context.headers();
        debug!(uri = %uri, ?headers, %connection_type, "Starting WebSocket transport");

        let request = match build_request(&uri, &headers) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Invalid upgrade request");
                return AsyncResult::failed(e);
            }
        };

        let connector = if url.is_secure() {
            self.tls_connector()
        } else {
            None
        };

        let result = AsyncResult::pending();
        let state = Arc::new(Mutex::new(TransportState::Connecting));
        let (handle, command_rx) = SocketHandle::new();

        let handler = TransportHandler::new(
            result.clone(),
            callback,
            Arc::clone(&context),
            handle.clone(),
            Arc::clone(&state),
        );

        let cancel_handle = handle.clone();
        result.on_cancelled(move || cancel_handle.close());

        self.replace_attempt(Attempt {
            handle: handle.clone(),
            state,
        });

        let params = SocketParams {
            request,
            ws_config: self.config.websocket_config(),
            connector,
        };
        runtime.spawn(socket::run(params, handle.clone(), command_rx, handler));

        context.on_closed(Arc::new(move || handle.close()));

        result
    }

    fn send(
        &self,
        _context: &dyn ConnectionContext,
        data: &str,
        _callback: Option<DataCallback>,
    ) -> AsyncResult<()> {
        let handle = self
            .current
            .lock()
            .as_ref()
            .map(|attempt| attempt.handle.clone());

        let Some(handle) = handle else {
            debug!("Send before start");
            return AsyncResult::failed(Error::NotOpen);
        };

        match handle.send(data) {
            Ok(()) => AsyncResult::resolved(()),
            Err(e) => {
                debug!(error = %e, "Send on a socket that is not open");
                AsyncResult::failed(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

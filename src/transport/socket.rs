//! Socket handle and I/O task.
//!
//! Each start call spawns one tokio task that owns the WebSocket stream.
//! The task reports what happens on the socket through [`SocketEvents`];
//! the rest of the crate talks to it through a [`SocketHandle`].
//!
//! # Task Phases
//!
//! - **Connecting**: races the handshake against a close request. A
//!   handshake error is reported through `on_error` and ends the task.
//! - **Open**: one `select!` loop serves inbound frames and outbound
//!   commands until either side closes, then reports `on_close`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

use super::handler::SocketEvents;

// ============================================================================
// Constants
// ============================================================================

/// Close code reported when the stream ends without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code reported for a close frame without a status.
pub const NO_STATUS_CLOSE_CODE: u16 = 1005;

// ============================================================================
// CloseEvent
// ============================================================================

/// How a socket ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason or error text.
    pub reason: String,
    /// Whether a close frame was exchanged.
    pub was_clean: bool,
    /// Whether this side requested the close.
    pub initiated_locally: bool,
}

impl CloseEvent {
    /// Close requested through the [`SocketHandle`].
    #[must_use]
    pub fn local() -> Self {
        Self {
            code: u16::from(CloseCode::Normal),
            reason: String::new(),
            was_clean: true,
            initiated_locally: true,
        }
    }

    /// Close frame received from the remote end.
    #[must_use]
    pub fn remote(frame: Option<CloseFrame>) -> Self {
        let (code, reason) = frame.map_or_else(
            || (NO_STATUS_CLOSE_CODE, String::new()),
            |frame| (u16::from(frame.code), frame.reason.as_str().to_owned()),
        );

        Self {
            code,
            reason,
            was_clean: true,
            initiated_locally: false,
        }
    }

    /// Stream ended or failed without a close frame.
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: ABNORMAL_CLOSE_CODE,
            reason: reason.into(),
            was_clean: false,
            initiated_locally: false,
        }
    }
}

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the socket task.
#[derive(Debug)]
pub(crate) enum SocketCommand {
    /// Write one text frame.
    Send(String),
    /// Close the socket.
    Close,
}

// ============================================================================
// SocketHandle
// ============================================================================

struct HandleInner {
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Set once the handshake completed. Never cleared.
    opened: AtomicBool,
    /// Set once a close was requested or observed.
    closed: AtomicBool,
}

/// Handle to one socket task.
///
/// Cloning yields another handle to the same socket. Closing is
/// idempotent and may happen from any thread.
#[derive(Clone)]
pub struct SocketHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("opened", &self.was_opened())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SocketHandle {
    /// Creates a handle and the command receiver for its task.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<SocketCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = Self {
            inner: Arc::new(HandleInner {
                command_tx,
                opened: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        };
        (handle, command_rx)
    }

    /// Requests the socket to close.
    ///
    /// Only the first call has an effect.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("Socket close requested");
        let _ = self.inner.command_tx.send(SocketCommand::Close);
    }

    /// Queues one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the handshake has not completed or the
    /// socket is closed.
    pub fn send(&self, data: impl Into<String>) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }

        self.inner
            .command_tx
            .send(SocketCommand::Send(data.into()))
            .map_err(|_| Error::NotOpen)
    }

    /// Returns `true` between handshake completion and close.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.was_opened() && !self.is_closed()
    }

    /// Returns `true` once a close was requested or observed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns `true` if the handshake ever completed.
    #[inline]
    #[must_use]
    pub fn was_opened(&self) -> bool {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_open(&self) {
        self.inner.opened.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Socket Task
// ============================================================================

/// Parameters for one socket task.
pub(crate) struct SocketParams {
    /// Upgrade request with all handshake headers.
    pub request: Request,
    /// Frame size limits.
    pub ws_config: Option<WebSocketConfig>,
    /// TLS connector (`None` = library default).
    pub connector: Option<Connector>,
}

/// Runs one socket from handshake to close.
pub(crate) async fn run<E>(
    params: SocketParams,
    handle: SocketHandle,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    events: E,
) where
    E: SocketEvents,
{
    let SocketParams {
        request,
        ws_config,
        connector,
    } = params;

    let connect =
        tokio_tungstenite::connect_async_tls_with_config(request, ws_config, false, connector);

    let ws_stream = tokio::select! {
        result = connect => match result {
            Ok((ws_stream, response)) => {
                debug!(status = %response.status(), "Handshake response received");
                ws_stream
            }
            Err(e) => {
                handle.mark_closed();
                events.on_error(Error::handshake(e.to_string()));
                return;
            }
        },

        () = wait_for_close(&mut command_rx) => {
            debug!("Socket closed before handshake completed");
            handle.mark_closed();
            events.on_close(CloseEvent::local());
            return;
        }
    };

    if handle.is_closed() {
        debug!("Socket closed while handshake was completing");
        let mut ws_stream = ws_stream;
        let _ = ws_stream.close(None).await;
        events.on_close(CloseEvent::local());
        return;
    }

    handle.mark_open();
    events.on_open();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let close_event = loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.on_message(text.as_str().to_owned());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        break CloseEvent::remote(frame);
                    }

                    Some(Ok(Message::Binary(data))) => {
                        trace!(len = data.len(), "Ignoring binary frame");
                    }

                    Some(Err(e)) => {
                        let reason = e.to_string();
                        events.on_error(e.into());
                        break CloseEvent::abnormal(reason);
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break CloseEvent::abnormal("stream ended without close frame");
                    }

                    // Ping/Pong handled by tungstenite
                    _ => {}
                }
            }

            // Commands from the transport
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(data)) => {
                        trace!(len = data.len(), "Sending frame");
                        if let Err(e) = ws_write.send(Message::Text(data.into())).await {
                            warn!(error = %e, "Failed to send frame");
                            let reason = e.to_string();
                            events.on_error(e.into());
                            break CloseEvent::abnormal(reason);
                        }
                    }

                    Some(SocketCommand::Close) | None => {
                        debug!("Close command received");
                        break CloseEvent::local();
                    }
                }
            }
        }
    };

    handle.mark_closed();
    let _ = ws_write.close().await;
    events.on_close(close_event);

    debug!("Socket task terminated");
}

/// Resolves when a close is requested or every handle is gone.
async fn wait_for_close(command_rx: &mut mpsc::UnboundedReceiver<SocketCommand>) {
    loop {
        match command_rx.recv().await {
            Some(SocketCommand::Close) | None => return,
            Some(SocketCommand::Send(_)) => {
                warn!("Dropping frame queued before handshake completed");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Socket event state machine.
//!
//! [`TransportHandler`] turns the socket task's events into outcomes:
//!
//! | Event | Before open | After open |
//! |-------|-------------|------------|
//! | `on_open` | resolve start result | - |
//! | `on_message` | - | forward to the data callback |
//! | `on_error` | fail start result | log only |
//! | `on_close` | fail start result if still pending | report `ConnectionLost` unless closed locally |
//!
//! One handler is built per start call and owns clones of everything it
//! touches, so the socket task needs no access to the transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::context::ConnectionContext;
use crate::error::Error;
use crate::future::AsyncResult;

use super::socket::{CloseEvent, SocketHandle};
use super::{DataCallback, TransportState};

// ============================================================================
// SocketEvents
// ============================================================================

/// Events emitted by a socket task.
///
/// Called on the socket task, one at a time, in the order they happen.
pub trait SocketEvents: Send + Sync + 'static {
    /// Handshake completed.
    fn on_open(&self);

    /// Text frame received.
    fn on_message(&self, frame: String);

    /// Socket closed.
    fn on_close(&self, event: CloseEvent);

    /// Socket error.
    fn on_error(&self, error: Error);
}

// ============================================================================
// TransportHandler
// ============================================================================

/// Event handler for one start call.
pub struct TransportHandler {
    /// Result returned by the start call.
    result: AsyncResult<()>,
    /// Inbound frame sink.
    callback: DataCallback,
    /// Owning connection.
    context: Arc<dyn ConnectionContext>,
    /// Socket this handler listens to.
    handle: SocketHandle,
    /// State shared with the transport.
    state: Arc<Mutex<TransportState>>,
}

impl fmt::Debug for TransportHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandler")
            .field("result", &self.result)
            .field("handle", &self.handle)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl TransportHandler {
    /// Creates a handler.
    pub(crate) fn new(
        result: AsyncResult<()>,
        callback: DataCallback,
        context: Arc<dyn ConnectionContext>,
        handle: SocketHandle,
        state: Arc<Mutex<TransportState>>,
    ) -> Self {
        Self {
            result,
            callback,
            context,
            handle,
            state,
        }
    }

    fn set_state(&self, next: TransportState) {
        let mut state = self.state.lock();
        trace!(from = ?*state, to = ?next, "Transport state change");
        *state = next;
    }
}

// ============================================================================
// SocketEvents Implementation
// ============================================================================

impl SocketEvents for TransportHandler {
    fn on_open(&self) {
        // The result gates the state, so a cancelled attempt never reads Open.
        if !self.result.set_result(()) {
            debug!("Start result already resolved, discarding socket");
            self.handle.close();
            return;
        }

        self.set_state(TransportState::Open);
        info!("WebSocket connection open");
    }

    fn on_message(&self, frame: String) {
        trace!(len = frame.len(), "onMessage");
        (self.callback)(frame);
    }

    fn on_close(&self, event: CloseEvent) {
        self.handle.close();

        {
            let mut state = self.state.lock();
            if *state != TransportState::Failed {
                *state = TransportState::Closed;
            }
        }

        if !self.handle.was_opened() {
            debug!(code = event.code, "Socket closed before handshake completed");
            self.result.trigger_error(Error::connection(
                "socket closed before handshake completed",
            ));
            return;
        }

        if event.initiated_locally {
            debug!("WebSocket closed locally");
            return;
        }

        error!(
            code = event.code,
            reason = %event.reason,
            was_clean = event.was_clean,
            "onClose"
        );
        self.context
            .on_error(Error::connection_lost(event.code, event.reason), true);
    }

    fn on_error(&self, err: Error) {
        self.set_state(TransportState::Failed);

        if self.result.is_pending() {
            error!(error = %err, "Handshake failed");
            self.result.trigger_error(err);
        } else {
            warn!(error = %err, "Socket error after open");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::context::SessionContext;
    use crate::future::Outcome;

    use super::super::socket::SocketCommand;

    type Reports = Arc<Mutex<Vec<(Error, bool)>>>;

    struct Fixture {
        handler: TransportHandler,
        result: AsyncResult<()>,
        handle: SocketHandle,
        state: Arc<Mutex<TransportState>>,
        frames: Arc<Mutex<Vec<String>>>,
        reports: Reports,
        _command_rx: tokio::sync::mpsc::UnboundedReceiver<SocketCommand>,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(SessionContext::new("http://host/"));
        let reports: Reports = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&reports);
        session.set_error_handler(move |err, was_open| {
            sink.lock().push((err.clone(), was_open));
        });

        let frames = Arc::new(Mutex::new(Vec::new()));
        let frame_sink = Arc::clone(&frames);
        let callback: DataCallback = Arc::new(move |frame: String| frame_sink.lock().push(frame));

        let result = AsyncResult::pending();
        let (handle, command_rx) = SocketHandle::new();
        let state = Arc::new(Mutex::new(TransportState::Connecting));

        let handler = TransportHandler::new(
            result.clone(),
            callback,
            session,
            handle.clone(),
            Arc::clone(&state),
        );

        Fixture {
            handler,
            result,
            handle,
            state,
            frames,
            reports,
            _command_rx: command_rx,
        }
    }

    #[test]
    fn test_open_resolves_result() {
        let f = fixture();
        f.handle.mark_open();
        f.handler.on_open();

        assert!(matches!(f.result.outcome(), Some(Outcome::Succeeded(()))));
        assert_eq!(*f.state.lock(), TransportState::Open);
    }

    #[test]
    fn test_open_after_cancel_is_noop() {
        let f = fixture();
        f.result.cancel();

        f.handle.mark_open();
        f.handler.on_open();

        assert!(f.result.is_cancelled());
        assert!(f.handle.is_closed());
        assert_eq!(*f.state.lock(), TransportState::Connecting);
    }

    #[test]
    fn test_open_after_failure_keeps_failed_result() {
        let f = fixture();
        f.result.trigger_error(Error::handshake("refused"));

        f.handle.mark_open();
        f.handler.on_open();

        assert!(matches!(
            f.result.outcome(),
            Some(Outcome::Failed(Error::Handshake { .. }))
        ));
        assert!(f.handle.is_closed());
        assert_eq!(*f.state.lock(), TransportState::Connecting);
    }

    #[test]
    fn test_messages_forwarded_in_order() {
        let f = fixture();
        f.handle.mark_open();
        f.handler.on_open();

        f.handler.on_message("a".to_string());
        f.handler.on_message("b".to_string());
        f.handler.on_message("c".to_string());

        assert_eq!(*f.frames.lock(), ["a", "b", "c"]);
    }

    #[test]
    fn test_error_before_open_fails_result_only() {
        let f = fixture();
        f.handler.on_error(Error::handshake("refused"));

        assert!(matches!(
            f.result.outcome(),
            Some(Outcome::Failed(Error::Handshake { .. }))
        ));
        assert_eq!(*f.state.lock(), TransportState::Failed);
        assert!(f.reports.lock().is_empty());
    }

    #[test]
    fn test_error_after_open_keeps_result() {
        let f = fixture();
        f.handle.mark_open();
        f.handler.on_open();

        f.handler.on_error(Error::connection("reset"));

        assert!(matches!(f.result.outcome(), Some(Outcome::Succeeded(()))));
        assert!(f.reports.lock().is_empty());
    }

    #[test]
    fn test_remote_close_after_open_reports_connection_lost() {
        let f = fixture();
        f.handle.mark_open();
        f.handler.on_open();

        f.handler.on_close(CloseEvent::abnormal("connection reset"));

        let reports = f.reports.lock();
        assert_eq!(reports.len(), 1);
        let (ref err, was_open) = reports[0];
        assert!(was_open);
        assert!(matches!(
            err,
            Error::ConnectionLost { code: 1006, reason } if reason == "connection reset"
        ));
        assert!(f.handle.is_closed());
        assert_eq!(*f.state.lock(), TransportState::Closed);
    }

    #[test]
    fn test_local_close_after_open_is_silent() {
        let f = fixture();
        f.handle.mark_open();
        f.handler.on_open();

        f.handler.on_close(CloseEvent::local());

        assert!(f.reports.lock().is_empty());
        assert_eq!(*f.state.lock(), TransportState::Closed);
    }

    #[test]
    fn test_close_before_open_fails_pending_result() {
        let f = fixture();
        f.handler.on_close(CloseEvent::local());

        assert!(matches!(
            f.result.outcome(),
            Some(Outcome::Failed(Error::Connection { .. }))
        ));
        assert!(f.reports.lock().is_empty());
    }

    #[test]
    fn test_close_keeps_failed_state() {
        let f = fixture();
        f.handle.mark_open();
        f.handler.on_open();

        f.handler.on_error(Error::connection("reset"));
        f.handler.on_close(CloseEvent::abnormal("reset"));

        assert_eq!(*f.state.lock(), TransportState::Failed);
        assert_eq!(f.reports.lock().len(), 1);
    }

    #[test]
    fn test_callback_runs_per_frame() {
        let f = fixture();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let callback: DataCallback = Arc::new(move |_: String| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let handler = TransportHandler::new(
            f.result.clone(),
            callback,
            Arc::new(SessionContext::new("http://host/")),
            f.handle.clone(),
            Arc::clone(&f.state),
        );

        handler.on_message(String::new());
        handler.on_message(String::new());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

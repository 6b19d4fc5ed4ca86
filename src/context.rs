//! Connection session state shared with the transport.
//!
//! The transport never owns session state. It reads the identifiers the
//! server issued during negotiation, injects one header, and calls back into
//! the owner when an open connection is lost or when it should close.
//!
//! - [`ConnectionContext`] is the seam a connection implementation exposes.
//! - [`SessionContext`] is a thread-safe implementation of it.
//!
//! A context outlives any single transport attempt and is reused across
//! reconnects.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::Error;

// ============================================================================
// Types
// ============================================================================

/// Header mapping sent with the upgrade request (keys unique).
pub type Headers = FxHashMap<String, String>;

/// Notification fired when the owning connection closes.
///
/// May be invoked from any thread, possibly more than once.
pub type CloseNotification = Arc<dyn Fn() + Send + Sync>;

/// Error sink type.
///
/// Receives the error and whether the connection had been open.
pub type ErrorHandler = Arc<dyn Fn(&Error, bool) + Send + Sync>;

// ============================================================================
// ConnectionContext
// ============================================================================

/// Session state and notification sinks of the owning connection.
pub trait ConnectionContext: Send + Sync {
    /// Base URL of the endpoint, ending with `/`.
    fn url(&self) -> String;

    /// Connection token issued by negotiation.
    fn connection_token(&self) -> String;

    /// Last received message id.
    fn message_id(&self) -> Option<String>;

    /// Groups token issued by the server.
    fn groups_token(&self) -> Option<String>;

    /// Arbitrary connection data (usually serialized hub list).
    fn connection_data(&self) -> Option<String>;

    /// Raw query string appended verbatim to the connect URL.
    fn query_string(&self) -> Option<String>;

    /// Snapshot of the headers to send with the upgrade request.
    fn headers(&self) -> Headers;

    /// Inserts or replaces a header.
    fn set_header(&self, name: &str, value: &str);

    /// Reports an error.
    ///
    /// `was_open` is `true` when the error ended a connection that had
    /// completed its handshake.
    fn on_error(&self, error: Error, was_open: bool);

    /// Sets the notification to run when the connection closes.
    ///
    /// Replaces any previously set notification, so a context reused
    /// across reconnects only ever closes the latest socket.
    fn on_closed(&self, notification: CloseNotification);
}

// ============================================================================
// SessionContext
// ============================================================================

#[derive(Debug, Default, Clone)]
struct SessionState {
    url: String,
    connection_token: String,
    message_id: Option<String>,
    groups_token: Option<String>,
    connection_data: Option<String>,
    query_string: Option<String>,
}

/// Thread-safe [`ConnectionContext`] implementation.
///
/// # Example
///
/// ```ignore
/// let session = Arc::new(
///     SessionContext::new("https://example.com/signalr/")
///         .with_connection_token("token")
///         .with_connection_data("[{\"name\":\"chat\"}]"),
/// );
///
/// session.set_error_handler(|err, was_open| {
///     eprintln!("error (open={was_open}): {err}");
/// });
/// ```
pub struct SessionContext {
    state: RwLock<SessionState>,
    headers: RwLock<Headers>,
    error_handler: Mutex<Option<ErrorHandler>>,
    close_notification: Mutex<Option<CloseNotification>>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.read())
            .field("headers", &*self.headers.read())
            .field("close_notification", &self.has_close_notification())
            .finish()
    }
}

// ============================================================================
// SessionContext - Constructors
// ============================================================================

impl SessionContext {
    /// Creates a session for the given base URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                url: url.into(),
                ..Default::default()
            }),
            headers: RwLock::new(Headers::default()),
            error_handler: Mutex::new(None),
            close_notification: Mutex::new(None),
        }
    }

    /// Sets the connection token.
    #[inline]
    #[must_use]
    pub fn with_connection_token(self, token: impl Into<String>) -> Self {
        self.set_connection_token(token);
        self
    }

    /// Sets the message id.
    #[inline]
    #[must_use]
    pub fn with_message_id(self, message_id: impl Into<String>) -> Self {
        self.set_message_id(Some(message_id.into()));
        self
    }

    /// Sets the groups token.
    #[inline]
    #[must_use]
    pub fn with_groups_token(self, token: impl Into<String>) -> Self {
        self.set_groups_token(Some(token.into()));
        self
    }

    /// Sets the connection data.
    #[inline]
    #[must_use]
    pub fn with_connection_data(self, data: impl Into<String>) -> Self {
        self.state.write().connection_data = Some(data.into());
        self
    }

    /// Sets the raw query string.
    #[inline]
    #[must_use]
    pub fn with_query_string(self, query: impl Into<String>) -> Self {
        self.state.write().query_string = Some(query.into());
        self
    }

    /// Adds a header.
    #[inline]
    #[must_use]
    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.write().insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// SessionContext - Mutation
// ============================================================================

impl SessionContext {
    /// Replaces the connection token.
    pub fn set_connection_token(&self, token: impl Into<String>) {
        self.state.write().connection_token = token.into();
    }

    /// Records the last received message id.
    pub fn set_message_id(&self, message_id: Option<String>) {
        self.state.write().message_id = message_id;
    }

    /// Records the groups token.
    pub fn set_groups_token(&self, token: Option<String>) {
        self.state.write().groups_token = token;
    }

    /// Installs the error sink, replacing any previous one.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&Error, bool) + Send + Sync + 'static,
    {
        *self.error_handler.lock() = Some(Arc::new(handler));
    }

    /// Returns `true` if a close notification is set.
    #[inline]
    #[must_use]
    pub fn has_close_notification(&self) -> bool {
        self.close_notification.lock().is_some()
    }

    /// Fires the close notification, if any.
    ///
    /// Safe to call from any thread and more than once.
    pub fn close(&self) {
        // Clone out so the notification can re-enter the session.
        let notification = self.close_notification.lock().clone();

        let Some(notification) = notification else {
            debug!("Close requested without a close notification");
            return;
        };

        debug!("Firing close notification");
        notification();
    }
}

// ============================================================================
// ConnectionContext Implementation
// ============================================================================

impl ConnectionContext for SessionContext {
    fn url(&self) -> String {
        self.state.read().url.clone()
    }

    fn connection_token(&self) -> String {
        self.state.read().connection_token.clone()
    }

    fn message_id(&self) -> Option<String> {
        self.state.read().message_id.clone()
    }

    fn groups_token(&self) -> Option<String> {
        self.state.read().groups_token.clone()
    }

    fn connection_data(&self) -> Option<String> {
        self.state.read().connection_data.clone()
    }

    fn query_string(&self) -> Option<String> {
        self.state.read().query_string.clone()
    }

    fn headers(&self) -> Headers {
        self.headers.read().clone()
    }

    fn set_header(&self, name: &str, value: &str) {
        self.headers
            .write()
            .insert(name.to_string(), value.to_string());
    }

    fn on_error(&self, error: Error, was_open: bool) {
        // Released before the call so the handler can re-enter the session.
        let handler = self.error_handler.lock().clone();

        match handler {
            Some(handler) => handler(&error, was_open),
            None => debug!(error = %error, was_open, "Unhandled connection error"),
        }
    }

    fn on_closed(&self, notification: CloseNotification) {
        *self.close_notification.lock() = Some(notification);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_optional_fields_default_to_none() {
        let session = SessionContext::new("http://host/endpoint/");
        assert_eq!(session.url(), "http://host/endpoint/");
        assert_eq!(session.connection_token(), "");
        assert!(session.message_id().is_none());
        assert!(session.groups_token().is_none());
        assert!(session.connection_data().is_none());
        assert!(session.query_string().is_none());
        assert!(session.headers().is_empty());
    }

    #[test]
    fn test_builder_sets_fields() {
        let session = SessionContext::new("http://host/")
            .with_connection_token("tok")
            .with_message_id("m1")
            .with_groups_token("g1")
            .with_connection_data("[]")
            .with_query_string("a=b")
            .with_header("X-Test", "1");

        assert_eq!(session.connection_token(), "tok");
        assert_eq!(session.message_id().as_deref(), Some("m1"));
        assert_eq!(session.groups_token().as_deref(), Some("g1"));
        assert_eq!(session.connection_data().as_deref(), Some("[]"));
        assert_eq!(session.query_string().as_deref(), Some("a=b"));
        assert_eq!(session.headers().get("X-Test").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_set_header_replaces_value() {
        let session = SessionContext::new("http://host/").with_header("User-Agent", "old");
        session.set_header("User-Agent", "new");

        let headers = session.headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["User-Agent"], "new");
    }

    #[test]
    fn test_on_error_reaches_handler() {
        let session = SessionContext::new("http://host/");
        let seen_open = Arc::new(AtomicBool::new(false));

        let seen = Arc::clone(&seen_open);
        session.set_error_handler(move |err, was_open| {
            assert!(err.is_connection_lost());
            seen.store(was_open, Ordering::SeqCst);
        });

        session.on_error(Error::connection_lost(1006, "eof"), true);
        assert!(seen_open.load(Ordering::SeqCst));
    }

    #[test]
    fn test_on_error_without_handler_is_noop() {
        let session = SessionContext::new("http://host/");
        session.on_error(Error::NotOpen, false);
    }

    #[test]
    fn test_on_error_handler_can_reenter_session() {
        let session = Arc::new(SessionContext::new("http://host/"));
        let replaced = Arc::new(AtomicBool::new(false));

        let inner = Arc::clone(&session);
        let flag = Arc::clone(&replaced);
        session.set_error_handler(move |_, _| {
            let flag = Arc::clone(&flag);
            inner.set_error_handler(move |_, _| flag.store(true, Ordering::SeqCst));
        });

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker = Arc::clone(&session);
        std::thread::spawn(move || {
            worker.on_error(Error::connection_lost(1006, "eof"), true);
            worker.on_error(Error::connection_lost(1006, "eof"), true);
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(2))
            .expect("on_error should not deadlock");
        assert!(replaced.load(Ordering::SeqCst));
    }

    #[test]
    fn test_close_without_notification_is_noop() {
        let session = SessionContext::new("http://host/");
        assert!(!session.has_close_notification());
        session.close();
    }

    #[test]
    fn test_on_closed_replaces_previous_notification() {
        let session = SessionContext::new("http://host/");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        for count in [&first, &second] {
            let count = Arc::clone(count);
            session.on_closed(Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        session.close();
        session.close();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert!(session.has_close_notification());
    }

    #[test]
    fn test_close_notification_can_reenter_session() {
        let session = Arc::new(SessionContext::new("http://host/"));
        let inner = Arc::clone(&session);
        session.on_closed(Arc::new(move || inner.on_closed(Arc::new(|| {}))));

        session.close();
        assert!(session.has_close_notification());
    }
}

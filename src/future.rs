//! Single-assignment, cancellable future.
//!
//! [`AsyncResult`] is what [`ClientTransport::start`](crate::ClientTransport::start)
//! and [`ClientTransport::send`](crate::ClientTransport::send) hand back to
//! the caller. It starts out pending and is resolved exactly once: to a
//! value, to an error, or by cancellation. Later transitions are ignored.
//!
//! # Observing Completion
//!
//! - [`AsyncResult::on_complete`] registers a callback that runs on the
//!   thread that resolves the future.
//! - [`AsyncResult::wait`] (or `.await` through [`IntoFuture`]) suspends
//!   the calling task until resolution.
//!
//! # Example
//!
//! ```ignore
//! let result = transport.start(context, ConnectionType::InitialConnection, callback);
//! result.on_complete(|outcome| println!("handshake: {outcome:?}"));
//! result.await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Completion callback type.
type CompletionCallback<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

/// Cancellation hook type.
type CancelHook = Box<dyn FnOnce() + Send>;

// ============================================================================
// Outcome
// ============================================================================

/// Terminal state of an [`AsyncResult`].
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Resolved with a value.
    Succeeded(T),
    /// Resolved with an error.
    Failed(Error),
    /// Cancelled while pending.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Converts the outcome into a [`Result`].
    ///
    /// Cancellation maps to [`Error::Cancelled`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Succeeded(value) => Ok(value),
            Self::Failed(err) => Err(err),
            Self::Cancelled => Err(Error::Cancelled),
        }
    }

    /// Returns `true` for [`Outcome::Succeeded`].
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct Shared<T> {
    outcome: Option<Outcome<T>>,
    on_complete: Vec<CompletionCallback<T>>,
    on_cancel: Vec<CancelHook>,
}

struct Inner<T> {
    shared: Mutex<Shared<T>>,
    /// Flips to `true` once, after the outcome is stored.
    done_tx: watch::Sender<bool>,
}

// ============================================================================
// AsyncResult
// ============================================================================

/// A single-assignment, cancellable future.
///
/// Cloning yields another handle to the same result.
pub struct AsyncResult<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.shared.lock().outcome {
            None => "Pending",
            Some(Outcome::Succeeded(_)) => "Succeeded",
            Some(Outcome::Failed(_)) => "Failed",
            Some(Outcome::Cancelled) => "Cancelled",
        };
        f.debug_struct("AsyncResult").field("state", &state).finish()
    }
}

// ============================================================================
// AsyncResult - Constructors
// ============================================================================

impl<T> AsyncResult<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a pending result.
    #[must_use]
    pub fn pending() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    outcome: None,
                    on_complete: Vec::new(),
                    on_cancel: Vec::new(),
                }),
                done_tx,
            }),
        }
    }

    /// Creates a result already resolved with `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let result = Self::pending();
        result.set_result(value);
        result
    }

    /// Creates a result already failed with `error`.
    #[must_use]
    pub fn failed(error: Error) -> Self {
        let result = Self::pending();
        result.trigger_error(error);
        result
    }
}

// ============================================================================
// AsyncResult - Transitions
// ============================================================================

impl<T> AsyncResult<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Resolves with `value`.
    ///
    /// Returns `false` if the result was already resolved.
    pub fn set_result(&self, value: T) -> bool {
        self.resolve(Outcome::Succeeded(value))
    }

    /// Resolves with `error`.
    ///
    /// Returns `false` if the result was already resolved.
    pub fn trigger_error(&self, error: Error) -> bool {
        self.resolve(Outcome::Failed(error))
    }

    /// Cancels a pending result and runs the cancellation hooks.
    ///
    /// Returns `false` if the result was already resolved.
    pub fn cancel(&self) -> bool {
        if !self.resolve(Outcome::Cancelled) {
            return false;
        }

        let hooks = std::mem::take(&mut self.inner.shared.lock().on_cancel);
        for hook in hooks {
            hook();
        }
        true
    }

    fn resolve(&self, outcome: Outcome<T>) -> bool {
        let callbacks = {
            let mut shared = self.inner.shared.lock();
            if shared.outcome.is_some() {
                return false;
            }
            shared.outcome = Some(outcome.clone());
            if !matches!(outcome, Outcome::Cancelled) {
                shared.on_cancel.clear();
            }
            std::mem::take(&mut shared.on_complete)
        };

        self.inner.done_tx.send_replace(true);

        for callback in callbacks {
            callback(&outcome);
        }
        true
    }
}

// ============================================================================
// AsyncResult - Observers
// ============================================================================

impl<T> AsyncResult<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns `true` while no outcome has been stored.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.shared.lock().outcome.is_none()
    }

    /// Returns `true` once an outcome has been stored.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        !self.is_pending()
    }

    /// Returns `true` if the result was cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.shared.lock().outcome, Some(Outcome::Cancelled))
    }

    /// Returns a copy of the outcome, if resolved.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.inner.shared.lock().outcome.clone()
    }

    /// Registers a completion callback.
    ///
    /// Runs immediately on the current thread if already resolved,
    /// otherwise on the thread that resolves the result.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let outcome = {
            let mut shared = self.inner.shared.lock();
            let Some(outcome) = shared.outcome.clone() else {
                shared.on_complete.push(Box::new(callback));
                return;
            };
            outcome
        };
        callback(&outcome);
    }

    /// Registers a hook that runs only if the result gets cancelled.
    ///
    /// Runs immediately if the result is already cancelled. Dropped
    /// without running if it resolves any other way.
    pub fn on_cancelled<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut shared = self.inner.shared.lock();
            if shared.outcome.is_none() {
                shared.on_cancel.push(Box::new(hook));
                return;
            }
            if !matches!(shared.outcome, Some(Outcome::Cancelled)) {
                return;
            }
        }
        hook();
    }

    /// Waits for the result to resolve.
    ///
    /// # Errors
    ///
    /// - The stored error if the result failed
    /// - [`Error::Cancelled`] if the result was cancelled
    pub async fn wait(&self) -> Result<T> {
        let mut done_rx = self.inner.done_tx.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = done_rx.wait_for(|done| *done).await;

        self.outcome()
            .map_or(Err(Error::Cancelled), Outcome::into_result)
    }
}

impl<T> IntoFuture for AsyncResult<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Cancellation and deadline propagation for client operations.
//!
//! A [`Context`] travels with each [`Client::run`](crate::Client::run) call.
//! Every blocking point of the call (sending the request, reading the
//! response, draining file attachments) races against the context, so firing
//! the cancel handle or passing the deadline aborts the in-flight exchange.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use horizon_lattice_graphql::Context;
//!
//! let (ctx, cancel) = Context::background()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_cancel();
//!
//! // From another task:
//! cancel.cancel();
//! ```

use std::future::Future;

use futures_util::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{GraphQLClientError, Result};

/// Carries an optional deadline and an optional cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: Option<CancelToken>,
}

impl Context {
    /// A context that never expires and cannot be cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Set a deadline relative to now.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Derive a cancellable context and return the handle that fires it.
    ///
    /// The derived context is also cancelled when any context it was derived
    /// from is cancelled. Firing the returned handle leaves those contexts
    /// live.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let token = CancelToken::child_of(self.token.take());
        self.token = Some(token.clone());
        (self, CancelHandle { token })
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the cancel handle has fired.
    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// The error this context currently resolves to, or `None` while live.
    pub fn err(&self) -> Option<GraphQLClientError> {
        if self.is_cancelled() {
            Some(GraphQLClientError::Cancelled)
        } else if self.deadline.is_some_and(|d| d <= Instant::now()) {
            Some(GraphQLClientError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> GraphQLClientError {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => GraphQLClientError::Cancelled,
            _ = expired => GraphQLClientError::DeadlineExceeded,
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    ///
    /// When the context wins, `fut` is dropped, which aborts whatever I/O it
    /// was performing.
    pub(crate) async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => out,
        }
    }
}

/// Fires the cancellation signal of the [`Context`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancelToken,
}

impl CancelHandle {
    /// Cancel every operation running under the associated context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the associated context is cancelled, by this
    /// handle or by the handle of a context it was derived from.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone)]
struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
    parent: Option<CancelToken>,
}

impl CancelToken {
    fn child_of(parent: Option<CancelToken>) -> Self {
        Self {
            inner: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                parent,
            }),
        }
    }

    /// This token followed by its ancestors.
    fn lineage(&self) -> impl Iterator<Item = &CancelState> {
        std::iter::successors(Some(&*self.inner), |&state| {
            state.parent.as_ref().map(|parent| &*parent.inner)
        })
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.lineage()
            .any(|state| state.cancelled.load(Ordering::Acquire))
    }

    fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::Release) {
            self.inner.notify.notify_waiters();
        }
    }

    async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed.
            let waiters: Vec<_> = self
                .lineage()
                .map(|state| Box::pin(state.notify.notified()))
                .collect();
            if self.is_cancelled() {
                return;
            }
            future::select_all(waiters).await;
        }
    }
}

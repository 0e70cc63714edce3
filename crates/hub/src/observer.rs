// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit observer registration with per-handler failure isolation.
//!
//! Handlers run on the notifying thread after the owner has released its
//! table lock. A handler that returns an error or panics is logged and the
//! remaining handlers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

/// Failure reported by an observer handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

type Handler<E> = Arc<dyn Fn(&E) -> Result<(), ObserverError> + Send + Sync>;
type HandlerList<E> = Mutex<Vec<(u64, Handler<E>)>>;

/// Set of handlers notified with events of type `E`.
pub struct Observers<E> {
    next_id: AtomicU64,
    handlers: Arc<HandlerList<E>>,
}

impl<E: 'static> Observers<E> {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), handlers: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().push((id, Arc::new(handler)));
        let weak: Weak<HandlerList<E>> = Arc::downgrade(&self.handlers);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(handlers) = weak.upgrade() {
                    handlers.lock().retain(|(h, _)| *h != id);
                }
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every handler with `event`. Never fails.
    pub fn notify(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self.handlers.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "observer handler failed"),
                Err(_) => warn!("observer handler panicked"),
            }
        }
    }
}

impl<E: 'static> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Observers::subscribe`].
///
/// Dropping it keeps the handler registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;

#![forbid(unsafe_code)]

//! Lifecycle scope for host handles.
//!
//! A component collects every handle it obtains while mounted into one
//! [`SubscriptionScope`] and clears the scope on unmount.
//!
//! # Invariants
//!
//! 1. Handles are released in reverse registration order, on `clear()` and on
//!    drop.
//! 2. After `clear()` no callback registered through the scope fires again.
//! 3. The scope is reusable after `clear()`.

use std::fmt;

use crate::event::EventKind;
use crate::host::{Host, ListenerHandle, SourceRegistration, SourceWriter};
use crate::state::StateSnapshot;

/// A host handle held by a [`SubscriptionScope`].
#[derive(Debug)]
pub enum Held {
    Listener(ListenerHandle),
    Writer(SourceWriter),
    Registration(SourceRegistration),
}

impl Held {
    fn release(&self) {
        match self {
            Self::Listener(handle) => handle.release(),
            Self::Writer(writer) => writer.release(),
            Self::Registration(registration) => registration.release(),
        }
    }
}

impl From<ListenerHandle> for Held {
    fn from(handle: ListenerHandle) -> Self {
        Self::Listener(handle)
    }
}

impl From<SourceWriter> for Held {
    fn from(writer: SourceWriter) -> Self {
        Self::Writer(writer)
    }
}

impl From<SourceRegistration> for Held {
    fn from(registration: SourceRegistration) -> Self {
        Self::Registration(registration)
    }
}

/// Collects host handles for one mounted component.
#[derive(Default)]
pub struct SubscriptionScope {
    held: Vec<Held>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `handle` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, handle: impl Into<Held>) -> &mut Self {
        self.held.push(handle.into());
        self
    }

    /// Subscribe to `host` within this scope.
    pub fn listen(
        &mut self,
        host: &Host,
        kind: EventKind,
        callback: impl Fn(&StateSnapshot) + 'static,
        scope: Option<&str>,
    ) -> &mut Self {
        let handle = host.listen(kind, callback, scope);
        self.hold(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Release everything now, newest first.
    pub fn clear(&mut self) {
        while let Some(held) = self.held.pop() {
            held.release();
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("held", &self.held.len())
            .finish()
    }
}

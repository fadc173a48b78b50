//! Pluggable validation.
//!
//! [`Host::validate`](crate::Host::validate) hands the installed [`Validator`]
//! a [`ValidationTicket`]. The validator resolves the ticket with the errors it
//! found, now or later (for example after a server round-trip driven by the
//! embedding event loop). Resolving stores the errors and runs the caller's
//! callback with the resulting aggregate state.
//!
//! Any `Fn(&Values, Option<&str>) -> HostErrors` is a synchronous validator.

use std::fmt;

use formbind_core::{HostErrors, Values};
use tracing::{debug, warn};

use crate::host::WeakHost;
use crate::state::HostState;

/// Validation algorithm of a host.
pub trait Validator {
    /// Validate `values`, all of them or only `scope`, and resolve `ticket`.
    fn validate(&self, values: &Values, scope: Option<&str>, ticket: ValidationTicket);
}

impl<F> Validator for F
where
    F: Fn(&Values, Option<&str>) -> HostErrors,
{
    fn validate(&self, values: &Values, scope: Option<&str>, ticket: ValidationTicket) {
        ticket.resolve(&self(values, scope));
    }
}

type Completion = Box<dyn FnOnce(&HostState)>;

/// One outstanding validation request.
///
/// Dropping a ticket without resolving it abandons the request: the caller's
/// callback never runs.
#[must_use = "an unresolved ticket never completes its validation"]
pub struct ValidationTicket {
    host: WeakHost,
    scope: Option<String>,
    callback: Option<Completion>,
}

impl ValidationTicket {
    pub(crate) fn new(host: WeakHost, scope: Option<String>, callback: Completion) -> Self {
        Self {
            host,
            scope,
            callback: Some(callback),
        }
    }

    /// The single source being validated, if the request is scoped.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Store `errors` and run the callback with the resulting state.
    ///
    /// A scoped request only touches the errors of its source. Nothing
    /// happens if the host is gone.
    pub fn resolve(mut self, errors: &HostErrors) {
        let Some(host) = self.host.upgrade() else {
            debug!("validation resolved after host drop");
            self.callback = None;
            return;
        };
        host.apply_validation(self.scope.as_deref(), errors);
        debug!(
            scope = self.scope.as_deref().unwrap_or("*"),
            invalid = errors.values().filter(|e| !e.is_empty()).count(),
            "validation resolved"
        );
        self.finish(&host.snapshot());
    }

    /// Run the callback without touching errors.
    pub(crate) fn complete(mut self) {
        if let Some(host) = self.host.upgrade() {
            self.finish(&host.snapshot());
        } else {
            self.callback = None;
        }
    }

    fn finish(&mut self, state: &HostState) {
        if let Some(callback) = self.callback.take() {
            callback(state);
        }
    }
}

impl Drop for ValidationTicket {
    fn drop(&mut self) {
        if self.callback.is_some() {
            warn!(
                scope = self.scope.as_deref().unwrap_or("*"),
                "validation ticket dropped without resolution"
            );
        }
    }
}

impl fmt::Debug for ValidationTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationTicket")
            .field("scope", &self.scope)
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Source actions as seen by field controllers.
//!
//! [`FieldActions`] is what an [`Updater`](crate::Updater) hands to its
//! subtree. Writes through a registration whose span has ended are the
//! structural stale-write case: they are dropped, never surfaced as errors.

use std::fmt;
use std::rc::Rc;

use formbind_core::Value;
use formbind_runtime::{
    ListenerHandle, SourceActions, SourceError, SourceState, SourceWriter, events,
};

/// Source actions handed to the subtree of an [`Updater`](crate::Updater).
#[derive(Clone)]
pub struct FieldActions {
    source: SourceActions,
}

impl FieldActions {
    #[must_use]
    pub fn new(source: SourceActions) -> Self {
        Self { source }
    }

    /// Name of the source these actions write to.
    #[must_use]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    #[must_use]
    pub fn source(&self) -> &SourceActions {
        &self.source
    }

    /// Current state of the source, while the registration is live.
    #[must_use]
    pub fn current(&self) -> Option<SourceState> {
        self.source.state()
    }

    /// Set the source's initial value without touching it. Returns whether
    /// the write was accepted.
    pub fn init(&self, value: impl Into<Value>) -> bool {
        accepted(self.source.name(), self.source.init(value))
    }

    /// Commit a value. Returns whether the write was accepted.
    pub fn update(&self, value: impl Into<Value>) -> bool {
        accepted(self.source.name(), self.source.update(value))
    }

    pub fn set_busy(&self, busy: bool) -> bool {
        accepted(self.source.name(), self.source.set_busy(busy))
    }

    pub fn set_errors(&self, errors: Option<Vec<String>>) -> bool {
        accepted(self.source.name(), self.source.set_errors(errors))
    }

    /// Receive the source's value on every change.
    pub fn listen(&self, listener: impl Fn(&Value) + 'static) -> Option<ListenerHandle> {
        let handle = self
            .source
            .listen(events::ANY, move |state| listener(&state.value));
        match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                dropped(self.source.name(), &err);
                None
            }
        }
    }

    /// Pair a value subscription with a dedicated writer.
    ///
    /// Releasing the binding also cancels a debounced write the binding left
    /// pending, so nothing reaches the host after the owning field unmounts.
    pub fn bind(&self, listener: impl Fn(&Value) + 'static) -> Option<FieldBinding> {
        let listener = self.listen(listener)?;
        Some(FieldBinding {
            listener,
            writer: Rc::new(self.source.writer()),
        })
    }
}

impl fmt::Debug for FieldActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldActions")
            .field("name", &self.name())
            .field("live", &self.source.is_live())
            .finish()
    }
}

/// A field's subscription and write path for one mount span.
pub struct FieldBinding {
    listener: ListenerHandle,
    writer: Rc<SourceWriter>,
}

impl FieldBinding {
    /// Commit a value through the binding's writer.
    pub fn commit(&self, value: impl Into<Value>) -> bool {
        write_through(&self.writer, value.into())
    }

    /// The writer, for committing without holding on to the binding.
    #[must_use]
    pub fn writer(&self) -> Rc<SourceWriter> {
        Rc::clone(&self.writer)
    }

    pub fn release(&self) {
        self.listener.release();
        self.writer.release();
    }
}

impl Drop for FieldBinding {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("source", &self.writer.actions().name())
            .field("released", &self.writer.is_released())
            .finish()
    }
}

/// Commit through `writer`, dropping stale writes.
pub(crate) fn write_through(writer: &SourceWriter, value: Value) -> bool {
    accepted(writer.actions().name(), writer.write(value))
}

fn accepted(name: &str, result: Result<(), SourceError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            dropped(name, &err);
            false
        }
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn dropped(name: &str, err: &SourceError) {
    #[cfg(feature = "tracing")]
    tracing::debug!(source = name, %err, "stale source action dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbind_runtime::{Debounce, Host};
    use std::cell::RefCell;

    #[test]
    fn listen_pushes_values() {
        let host = Host::new();
        let reg = host.add_source("email", Value::Null, Debounce::Off);
        let actions = FieldActions::new(reg.actions().clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _handle = actions.listen(move |value| sink.borrow_mut().push(value.clone()));

        assert!(actions.update("a@x.com"));
        assert!(actions.set_busy(true));
        assert_eq!(
            *seen.borrow(),
            [Value::text("a@x.com"), Value::text("a@x.com")]
        );
        assert_eq!(actions.current().map(|s| s.busy), Some(true));
    }

    #[test]
    fn stale_actions_are_dropped_quietly() {
        let host = Host::new();
        let reg = host.add_source("email", Value::Null, Debounce::Off);
        let actions = FieldActions::new(reg.actions().clone());
        assert!(actions.init("first"));
        assert_eq!(actions.current().map(|s| s.touched), Some(false));
        drop(reg);
        assert!(!actions.init("late"));
        assert!(!actions.update("late"));
        assert!(!actions.set_errors(Some(vec!["x".into()])));
        assert!(actions.current().is_none());

        drop(host);
        assert!(actions.listen(|_| {}).is_none());
        assert!(actions.bind(|_| {}).is_none());
    }

    #[test]
    fn binding_release_cancels_its_pending_write() {
        let host = Host::new();
        let reg = host.add_source("q", Value::Null, 200_u64);
        let actions = FieldActions::new(reg.actions().clone());
        let binding = actions.bind(|_| {}).unwrap();
        assert!(binding.commit("typed"));
        assert!(host.has_pending("q"));

        drop(binding);
        assert!(!host.has_pending("q"));
        assert_eq!(host.listener_count(), 0);
    }
}

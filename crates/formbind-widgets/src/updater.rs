#![forbid(unsafe_code)]

//! Source registration adapter.
//!
//! An [`Updater`] registers one named source for the length of its mount
//! span and hands the source's [`FieldActions`] to its child.
//!
//! Mount order:
//!
//! 1. Resolve the default: an explicit non-null default wins, otherwise the
//!    form's `values` prop entry for the name.
//! 2. Acquire the source.
//! 3. Mount the child with the actions in scope.
//! 4. Apply the resolved default with `init`, unless it is `Null`.
//!
//! The child therefore never holds actions for a source whose default has
//! not been applied by the time mounting returns, and an updater added to an
//! already-mounted form gets its default exactly once.

use std::fmt;

use formbind_core::Value;
use formbind_runtime::{Debounce, SourceRegistration, StateSnapshot};

use crate::actions::FieldActions;
use crate::node::{MountScope, NestingError, Node, NodeKind, check_nesting, enforce_nesting};

/// Registers the source `name` while mounted.
pub struct Updater {
    name: String,
    default: Value,
    debounce: Debounce,
    child: Box<dyn Node>,
    registration: Option<SourceRegistration>,
}

impl Updater {
    /// # Panics
    ///
    /// In debug builds, when `child` is an adapter or a fragment. Use
    /// [`try_new`](Self::try_new) to get the error instead.
    pub fn new(name: impl Into<String>, child: impl Node + 'static) -> Self {
        enforce_nesting(NodeKind::Updater, child.kind());
        Self::build(name.into(), Box::new(child))
    }

    /// # Errors
    ///
    /// [`NestingError`] when `child` is an adapter or a fragment.
    pub fn try_new(
        name: impl Into<String>,
        child: impl Node + 'static,
    ) -> Result<Self, NestingError> {
        check_nesting(NodeKind::Updater, child.kind())?;
        Ok(Self::build(name.into(), Box::new(child)))
    }

    fn build(name: String, child: Box<dyn Node>) -> Self {
        Self {
            name,
            default: Value::Null,
            debounce: Debounce::Off,
            child,
            registration: None,
        }
    }

    /// Default value, preferred over the form's `values` prop.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Debounce commits: `true` for the host default, a `Duration`, or
    /// milliseconds.
    #[must_use]
    pub fn debounce(mut self, debounce: impl Into<Debounce>) -> Self {
        self.debounce = debounce.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.registration.is_some()
    }

    /// Actions of the current mount span.
    #[must_use]
    pub fn actions(&self) -> Option<FieldActions> {
        self.registration
            .as_ref()
            .map(|registration| FieldActions::new(registration.actions().clone()))
    }
}

impl Node for Updater {
    fn kind(&self) -> NodeKind {
        NodeKind::Updater
    }

    fn mount(&mut self, scope: &MountScope) {
        if self.registration.is_some() {
            return;
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("updater_mount", source = self.name.as_str()).entered();

        let context = scope.context();
        let Some(host) = context.as_ref().and_then(|context| context.host()) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(source = self.name.as_str(), "updater mounted outside a form");
            return;
        };

        let default = match &self.default {
            Value::Null => context
                .as_ref()
                .map_or(Value::Null, |context| context.default_value(&self.name, Value::Null)),
            explicit => explicit.clone(),
        };

        let registration = host.add_source(&self.name, default.clone(), self.debounce);
        let actions = FieldActions::new(registration.actions().clone());
        self.registration = Some(registration);

        let mut child_scope = MountScope::new().with_actions(actions.clone());
        if let Some(context) = context {
            child_scope = child_scope.with_context(context);
        }
        self.child.mount(&child_scope);

        if !default.is_null() {
            // A retained value makes the host skip this write.
            actions.init(default);
        }
    }

    fn unmount(&mut self) {
        let Some(registration) = self.registration.take() else {
            return;
        };
        self.child.unmount();
        registration.release();
    }

    fn refresh(&mut self) {
        self.child.refresh();
    }

    fn receive(&mut self, state: &StateSnapshot) {
        self.child.receive(state);
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("debounce", &self.debounce)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FormContext, FormShared};
    use crate::node::Element;
    use crate::Listener;
    use formbind_core::Values;
    use formbind_runtime::{Host, events};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Child that records the source value it sees at mount time.
    struct SeeAtMount {
        seen: Rc<RefCell<Vec<Option<Value>>>>,
    }

    impl Node for SeeAtMount {
        fn mount(&mut self, scope: &MountScope) {
            let value = scope
                .actions()
                .and_then(FieldActions::current)
                .map(|state| state.value);
            self.seen.borrow_mut().push(value);
        }

        fn unmount(&mut self) {}
    }

    fn form_scope(host: &Host, form: &Rc<FormShared>) -> MountScope {
        MountScope::new().with_context(FormContext::new(host.downgrade(), Rc::downgrade(form)))
    }

    #[test]
    fn explicit_default_applied_after_child_mount() {
        let host = Host::new();
        let form = Rc::new(FormShared::new("f".into(), None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut updater = Updater::new(
            "email",
            SeeAtMount {
                seen: Rc::clone(&seen),
            },
        )
        .default_value("a@x.com");

        updater.mount(&form_scope(&host, &form));
        assert_eq!(*seen.borrow(), [Some(Value::Null)]);
        assert_eq!(host.source_state("email").unwrap().value, Value::text("a@x.com"));
        assert!(!host.source_state("email").unwrap().touched);
    }

    #[test]
    fn falls_back_to_values_prop() {
        let host = Host::new();
        let mut values = Values::new();
        values.insert("name".into(), Value::text("Ann"));
        let form = Rc::new(FormShared::new("f".into(), Some(Rc::new(values))));
        let mut updater = Updater::new("name", Element::new());
        updater.mount(&form_scope(&host, &form));
        assert_eq!(host.source_state("name").unwrap().value, Value::text("Ann"));
    }

    #[test]
    fn no_default_means_no_init_write() {
        let host = Host::new();
        let form = Rc::new(FormShared::new("f".into(), None));
        let writes = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&writes);
        let _sub = host.listen(events::VALUE, move |_| *counter.borrow_mut() += 1, Some("x"));

        let mut updater = Updater::new("x", Element::new());
        updater.mount(&form_scope(&host, &form));
        assert_eq!(*writes.borrow(), 1, "only the registration notice");
        assert_eq!(host.source_state("x").unwrap().value, Value::Null);
    }

    #[test]
    fn mount_twice_is_noop_and_remount_is_fresh() {
        let host = Host::new();
        let form = Rc::new(FormShared::new("f".into(), None));
        let scope = form_scope(&host, &form);
        let mut updater = Updater::new("n", Element::new()).default_value("d");

        updater.mount(&scope);
        updater.actions().unwrap().update("typed");
        updater.mount(&scope);
        assert_eq!(host.source_refs("n"), 1);
        assert_eq!(host.source_state("n").unwrap().value, Value::text("typed"));

        updater.unmount();
        assert!(!host.has_source("n"));
        updater.unmount();

        updater.mount(&scope);
        assert_eq!(host.source_state("n").unwrap().value, Value::text("d"));
    }

    #[test]
    fn outside_a_form_stays_unmounted() {
        let mut updater = Updater::new("n", Element::new());
        updater.mount(&MountScope::new());
        assert!(!updater.is_mounted());
        updater.unmount();
    }

    #[test]
    fn try_new_rejects_adapter_children() {
        let err = Updater::try_new("a", Updater::new("b", Element::new())).unwrap_err();
        assert_eq!(err.parent, NodeKind::Updater);
        assert_eq!(err.child, NodeKind::Updater);
        assert!(Updater::try_new("a", Listener::new(Element::new())).is_err());
        assert!(Updater::try_new("a", Element::new()).is_ok());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "cannot be the direct child of Updater")]
    fn new_panics_on_fragment_child_in_debug() {
        let _ = Updater::new("a", crate::node::Fragment::new());
    }
}

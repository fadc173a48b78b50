#![forbid(unsafe_code)]

//! Form root.
//!
//! A [`Form`] owns one [`Host`], provides the [`FormContext`] to its subtree,
//! forwards its props to the host, and turns native submit/reset events into
//! validation and `on_send` / `on_reset` callbacks.
//!
//! # Props
//!
//! `values` and `errors` are compared by `Rc` identity, `busy` by value.
//! Each changed prop causes exactly one host call, in the order errors, busy,
//! values. In pure mode (the default) a prop change does not re-render the
//! subtree; all visual updates flow through host subscriptions.
//!
//! # Example
//!
//! ```
//! use formbind_core::{NativeEvent, Value};
//! use formbind_widgets::{Element, Form, Input, Updater};
//!
//! let email = Input::text();
//! let mut form = Form::builder("signup")
//!     .child(Updater::new("email", Element::new().child(email.clone())).default_value("a@x.com"))
//!     .build();
//! form.mount();
//!
//! email.handle_event(&NativeEvent::change("b@x.com"));
//! assert_eq!(form.host().snapshot().values["email"], Value::text("b@x.com"));
//! ```

use std::fmt;
use std::rc::Rc;

use formbind_core::{Clock, EventType, HostErrors, NativeEvent, Value, Values};
use formbind_runtime::{
    EventKind, Host, HostConfig, HostState, ListenerHandle, StateSnapshot, SubscriptionScope,
    Validator, WeakHost, events,
};

use crate::context::{FormContext, FormShared};
use crate::node::{Element, MountScope, Node};

type SendHandler = Box<dyn Fn(&str, &HostState, &ClearHandle)>;
type ResetHandler = Box<dyn Fn()>;
type NativeHandler = Box<dyn Fn(&NativeEvent)>;
type UpdatesHandler = Rc<dyn Fn(&HostState)>;

/// Props of a [`Form`].
#[derive(Debug, Clone)]
pub struct FormProps {
    pub values: Option<Rc<Values>>,
    pub errors: Option<Rc<HostErrors>>,
    pub busy: bool,
    /// Only re-render through host subscriptions.
    pub pure: bool,
}

impl Default for FormProps {
    fn default() -> Self {
        Self {
            values: None,
            errors: None,
            busy: false,
            pure: true,
        }
    }
}

impl FormProps {
    #[must_use]
    pub fn values(mut self, values: Values) -> Self {
        self.values = Some(Rc::new(values));
        self
    }

    #[must_use]
    pub fn errors(mut self, errors: HostErrors) -> Self {
        self.errors = Some(Rc::new(errors));
        self
    }

    #[must_use]
    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    #[must_use]
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }
}

/// Clears the form's host; handed to `on_send`.
#[derive(Debug, Clone)]
pub struct ClearHandle {
    host: WeakHost,
}

impl ClearHandle {
    pub fn clear(&self) {
        if let Some(host) = self.host.upgrade() {
            host.clear();
        }
    }
}

#[derive(Default)]
struct Handlers {
    on_send: Option<SendHandler>,
    on_reset: Option<ResetHandler>,
    on_native_submit: Option<NativeHandler>,
    on_native_reset: Option<NativeHandler>,
    on_updates: Option<UpdatesHandler>,
}

/// Builder for [`Form`].
pub struct FormBuilder {
    name: String,
    props: FormProps,
    config: HostConfig,
    clock: Clock,
    validator: Option<Rc<dyn Validator>>,
    handlers: Handlers,
    root: Element,
}

impl FormBuilder {
    #[must_use]
    pub fn props(mut self, props: FormProps) -> Self {
        self.props = props;
        self
    }

    #[must_use]
    pub fn values(mut self, values: Values) -> Self {
        self.props.values = Some(Rc::new(values));
        self
    }

    #[must_use]
    pub fn pure(mut self, pure: bool) -> Self {
        self.props.pure = pure;
        self
    }

    #[must_use]
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Called with `(name, state, clear)` once validation of a submit
    /// resolves.
    #[must_use]
    pub fn on_send(mut self, handler: impl Fn(&str, &HostState, &ClearHandle) + 'static) -> Self {
        self.handlers.on_send = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_reset(mut self, handler: impl Fn() + 'static) -> Self {
        self.handlers.on_reset = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_native_submit(mut self, handler: impl Fn(&NativeEvent) + 'static) -> Self {
        self.handlers.on_native_submit = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_native_reset(mut self, handler: impl Fn(&NativeEvent) + 'static) -> Self {
        self.handlers.on_native_reset = Some(Box::new(handler));
        self
    }

    /// Called on every host change while the form is mounted.
    #[must_use]
    pub fn on_updates(mut self, handler: impl Fn(&HostState) + 'static) -> Self {
        self.handlers.on_updates = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.root.push(child);
        self
    }

    #[must_use]
    pub fn build(self) -> Form {
        let host = Host::with_clock(self.config, self.clock);
        if let Some(validator) = self.validator {
            host.set_shared_validator(validator);
        }
        let shared = Rc::new(FormShared::new(self.name, self.props.values.clone()));
        Form {
            host,
            shared,
            props: self.props,
            root: self.root,
            handlers: Rc::new(self.handlers),
            subscriptions: SubscriptionScope::new(),
            mounted: false,
            renders: 0,
        }
    }
}

/// Form root.
pub struct Form {
    host: Host,
    shared: Rc<FormShared>,
    props: FormProps,
    root: Element,
    handlers: Rc<Handlers>,
    subscriptions: SubscriptionScope,
    mounted: bool,
    renders: usize,
}

impl Form {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FormBuilder {
        FormBuilder {
            name: name.into(),
            props: FormProps::default(),
            config: HostConfig::default(),
            clock: Clock::Real,
            validator: None,
            handlers: Handlers::default(),
            root: Element::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Context handed to descendants.
    #[must_use]
    pub fn context(&self) -> FormContext {
        FormContext::new(self.host.downgrade(), Rc::downgrade(&self.shared))
    }

    #[must_use]
    pub fn props(&self) -> &FormProps {
        &self.props
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// How many times the subtree was rendered by the form itself.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// The root container. Children pushed or removed while mounted are
    /// mounted or unmounted immediately.
    pub fn children_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Push a child, mounting it with the form's context when the form is
    /// mounted.
    pub fn push_child(&mut self, child: impl Node + 'static) -> usize {
        let _guard = self.context().provide();
        self.root.push(child)
    }

    /// Remove a child by index, unmounting it when the form is mounted.
    pub fn remove_child(&mut self, index: usize) -> Option<Box<dyn Node>> {
        self.root.remove(index)
    }

    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("form_mount", form = self.shared.name.as_str()).entered();

        self.mounted = true;
        // The prop goes first so each updater's resolved default is the last
        // write to its source.
        if self.props.values.is_some() {
            self.host.init(self.props.values.as_deref());
        }
        let context = self.context();
        {
            let _guard = context.provide();
            self.root.mount(&MountScope::new().with_context(context));
        }
        if let Some(on_updates) = self.handlers.on_updates.clone() {
            self.subscriptions.listen(
                &self.host,
                events::ANY,
                move |snapshot| {
                    if let StateSnapshot::Host(state) = snapshot {
                        on_updates(state);
                    }
                },
                None,
            );
        }
        self.renders += 1;
    }

    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.root.unmount();
        self.subscriptions.clear();
    }

    /// Replace the props. Returns whether the subtree was re-rendered.
    pub fn set_props(&mut self, next: FormProps) -> bool {
        let prev = std::mem::replace(&mut self.props, next);
        *self.shared.values.borrow_mut() = self.props.values.clone();

        let mut changed = false;
        if !same_rc(&prev.errors, &self.props.errors) {
            changed = true;
            self.host.set_errors(self.props.errors.as_deref());
        }
        if prev.busy != self.props.busy {
            changed = true;
            self.host.set_busy(self.props.busy, None);
        }
        if !same_rc(&prev.values, &self.props.values) {
            changed = true;
            self.host.init(self.props.values.as_deref());
        }

        if changed && !self.props.pure {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Re-render the subtree.
    pub fn refresh(&mut self) {
        if self.mounted {
            self.root.refresh();
            self.renders += 1;
        }
    }

    /// Handle a native form event. Returns whether it was a submit or reset.
    pub fn handle_event(&self, event: &NativeEvent) -> bool {
        match event.event_type() {
            EventType::Submit => {
                if let Some(handler) = &self.handlers.on_native_submit {
                    handler(event);
                }
                suppress(event);
                self.send();
                true
            }
            EventType::Reset => {
                if let Some(handler) = &self.handlers.on_native_reset {
                    handler(event);
                }
                suppress(event);
                self.host.init(self.props.values.as_deref());
                if let Some(handler) = &self.handlers.on_reset {
                    handler();
                }
                true
            }
            _ => false,
        }
    }

    fn send(&self) {
        let handlers = Rc::clone(&self.handlers);
        let name = self.shared.name.clone();
        let clear = ClearHandle {
            host: self.host.downgrade(),
        };
        self.host.validate(
            move |state| {
                #[cfg(feature = "tracing")]
                tracing::debug!(form = name.as_str(), valid = state.is_valid(), "form send");
                if let Some(on_send) = &handlers.on_send {
                    on_send(&name, state, &clear);
                }
            },
            None,
        );
    }

    // ── Imperative surface ──────────────────────────────────────────────

    pub fn clear(&self) {
        self.host.clear();
    }

    pub fn set_values(&self, values: Option<&Values>) {
        self.host.init(values);
    }

    pub fn set_errors(&self, errors: Option<&HostErrors>) {
        self.host.set_errors(errors);
    }

    pub fn set_busy(&self, busy: bool, names: Option<&[&str]>) {
        self.host.set_busy(busy, names);
    }

    pub fn validate(&self, callback: impl FnOnce(&HostState) + 'static, name: Option<&str>) {
        self.host.validate(callback, name);
    }

    pub fn listen(
        &self,
        kind: EventKind,
        listener: impl Fn(&StateSnapshot) + 'static,
        name: Option<&str>,
    ) -> ListenerHandle {
        self.host.listen(kind, listener, name)
    }

    /// Entry of the `values` prop for `name`, or `fallback`.
    #[must_use]
    pub fn default_value(&self, name: &str, fallback: Value) -> Value {
        self.props
            .values
            .as_ref()
            .and_then(|values| values.get(name).cloned())
            .unwrap_or(fallback)
    }
}

impl Drop for Form {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.shared.name)
            .field("mounted", &self.mounted)
            .field("host", &self.host)
            .finish()
    }
}

fn same_rc<T>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn suppress(event: &NativeEvent) {
    if !event.is_default_prevented() {
        event.prevent_default();
    }
    if !event.is_propagation_stopped() {
        event.stop_propagation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::Updater;
    use std::cell::{Cell, RefCell};

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::text(*v)))
            .collect()
    }

    #[test]
    fn mount_pushes_values_prop() {
        let mut form = Form::builder("f")
            .values(values(&[("a", "1")]))
            .child(Updater::new("a", Element::new()))
            .child(Updater::new("b", Element::new()))
            .build();
        form.mount();
        let state = form.host().snapshot();
        assert_eq!(state.values["a"], Value::text("1"));
        assert_eq!(state.values["b"], Value::Null);
        assert_eq!(form.default_value("a", Value::Null), Value::text("1"));
        assert_eq!(form.default_value("zz", Value::text("f")), Value::text("f"));
    }

    #[test]
    fn explicit_default_wins_over_values_prop_until_reset() {
        let mut form = Form::builder("f")
            .values(values(&[("a", "from-prop"), ("b", "prop-only")]))
            .child(Updater::new("a", Element::new()).default_value("explicit"))
            .child(Updater::new("b", Element::new()))
            .build();
        form.mount();
        let state = form.host().snapshot();
        assert_eq!(state.values["a"], Value::text("explicit"));
        assert_eq!(state.values["b"], Value::text("prop-only"));
        assert!(!state.touched);

        form.handle_event(&NativeEvent::reset());
        let state = form.host().snapshot();
        assert_eq!(state.values["a"], Value::text("from-prop"));
        assert_eq!(state.values["b"], Value::text("prop-only"));
    }

    #[test]
    fn on_updates_lives_with_mount_span() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut form = Form::builder("f")
            .on_updates(move |_| counter.set(counter.get() + 1))
            .build();
        form.mount();
        form.set_busy(true, None);
        assert_eq!(calls.get(), 1);
        form.unmount();
        form.set_busy(false, None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn identical_props_make_no_host_calls() {
        let mut form = Form::builder("f").values(values(&[("a", "1")])).build();
        form.mount();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let _sub = form.listen(events::ANY, move |_| counter.set(counter.get() + 1), None);
        let _reg = form.host().add_source("a", Value::Null, false);
        calls.set(0);

        let same = form.props().clone();
        assert!(!form.set_props(same));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn changed_values_prop_reinitializes() {
        let mut form = Form::builder("f")
            .child(Updater::new("a", Element::new()))
            .build();
        form.mount();
        let next = form.props().clone().values(values(&[("a", "2")]));
        assert!(!form.set_props(next));
        assert_eq!(form.host().snapshot().values["a"], Value::text("2"));
        assert_eq!(form.context().default_value("a", Value::Null), Value::text("2"));
    }

    #[test]
    fn impure_form_rerenders_on_prop_change() {
        let mut form = Form::builder("f").pure(false).build();
        form.mount();
        assert_eq!(form.render_count(), 1);
        let next = form.props().clone().busy(true);
        assert!(form.set_props(next));
        assert_eq!(form.render_count(), 2);
        assert!(form.host().snapshot().busy);
    }

    #[test]
    fn submit_flags_are_not_doubled() {
        let form = Form::builder("f").build();
        let event = NativeEvent::submit();
        event.prevent_default();
        assert!(form.handle_event(&event));
        assert!(event.is_default_prevented());
        assert!(event.is_propagation_stopped());
        assert!(!form.handle_event(&NativeEvent::change("x")));
    }

    #[test]
    fn submit_sends_after_validation() {
        let sent = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&sent);
        let order = Rc::new(RefCell::new(Vec::new()));
        let native = Rc::clone(&order);
        let mut form = Form::builder("login")
            .child(Updater::new("user", Element::new()).default_value("ann"))
            .on_native_submit(move |_| native.borrow_mut().push("native"))
            .on_send(move |name, state, clear| {
                *sink.borrow_mut() = Some((name.to_owned(), state.clone()));
                clear.clear();
            })
            .build();
        form.mount();
        form.handle_event(&NativeEvent::submit());

        let (name, state) = sent.borrow().clone().unwrap();
        assert_eq!(name, "login");
        assert_eq!(state.values["user"], Value::text("ann"));
        assert_eq!(*order.borrow(), ["native"]);
        assert_eq!(form.host().snapshot().values["user"], Value::Null);
    }

    #[test]
    fn reset_reapplies_values_prop() {
        let resets = Rc::new(Cell::new(0));
        let counter = Rc::clone(&resets);
        let mut form = Form::builder("f")
            .values(values(&[("a", "orig")]))
            .child(Updater::new("a", Element::new()))
            .on_reset(move || counter.set(counter.get() + 1))
            .build();
        form.mount();
        form.set_values(Some(&values(&[("a", "changed")])));
        let event = NativeEvent::reset();
        form.handle_event(&event);
        assert_eq!(form.host().snapshot().values["a"], Value::text("orig"));
        assert_eq!(resets.get(), 1);
        assert!(event.is_default_prevented());
    }

    #[test]
    fn dynamic_children_mount_with_context() {
        let mut form = Form::builder("f").values(values(&[("late", "v")])).build();
        form.mount();
        let idx = form.push_child(Updater::new("late", Element::new()));
        assert_eq!(form.host().snapshot().values["late"], Value::text("v"));
        assert!(form.remove_child(idx).is_some());
        assert!(!form.host().has_source("late"));
    }

    #[test]
    fn drop_unmounts_children() {
        let mut form = Form::builder("f")
            .child(Updater::new("a", Element::new()))
            .build();
        form.mount();
        let weak = form.host().downgrade();
        drop(form);
        assert!(weak.upgrade().is_none());
    }
}

#![forbid(unsafe_code)]

//! Context channel from a [`Form`](crate::Form) to its descendants.
//!
//! A [`FormContext`] carries non-owning handles to the form's host and to
//! the form's `values` prop. It travels down the tree inside
//! [`MountScope`](crate::MountScope). While a form mounts its children it also
//! provides the context on a thread-local stack, so code that has no scope at
//! hand can still find the innermost form with [`FormContext::current`].

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use formbind_core::{Value, Values};
use formbind_runtime::{Host, WeakHost};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<FormContext>> = const { RefCell::new(Vec::new()) };
}

/// Form data shared with the context: the name and the current `values` prop.
#[derive(Debug)]
pub(crate) struct FormShared {
    pub(crate) name: String,
    pub(crate) values: RefCell<Option<Rc<Values>>>,
}

impl FormShared {
    pub(crate) fn new(name: String, values: Option<Rc<Values>>) -> Self {
        Self {
            name,
            values: RefCell::new(values),
        }
    }
}

/// Handle descendants use to reach their form.
#[derive(Clone, Default)]
pub struct FormContext {
    host: WeakHost,
    form: Weak<FormShared>,
}

impl FormContext {
    pub(crate) fn new(host: WeakHost, form: Weak<FormShared>) -> Self {
        Self { host, form }
    }

    /// The form's host, while the form exists.
    #[must_use]
    pub fn host(&self) -> Option<Host> {
        self.host.upgrade()
    }

    #[must_use]
    pub fn weak_host(&self) -> &WeakHost {
        &self.host
    }

    /// Whether the form behind this context still exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.host.is_alive() && self.form.strong_count() > 0
    }

    #[must_use]
    pub fn form_name(&self) -> Option<String> {
        self.form.upgrade().map(|form| form.name.clone())
    }

    /// Look `name` up in the form's `values` prop; `fallback` when the prop
    /// is absent, the name is missing, or the form is gone.
    #[must_use]
    pub fn default_value(&self, name: &str, fallback: Value) -> Value {
        self.form
            .upgrade()
            .and_then(|form| {
                form.values
                    .borrow()
                    .as_ref()
                    .and_then(|values| values.get(name).cloned())
            })
            .unwrap_or(fallback)
    }

    /// Make this the innermost context of the current thread until the guard
    /// drops.
    #[must_use = "the context is withdrawn when the guard drops"]
    pub fn provide(&self) -> ContextGuard {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(self.clone());
            stack.len()
        });
        ContextGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// The innermost provided context, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether both contexts point at the same form.
    #[must_use]
    pub fn same_form(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.form, &other.form)
    }
}

impl fmt::Debug for FormContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormContext")
            .field("form", &self.form_name())
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Withdraws a provided [`FormContext`] on drop.
#[must_use = "the context is withdrawn when the guard drops"]
pub struct ContextGuard {
    depth: usize,
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "context guards dropped out of order");
            stack.pop();
        });
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(values: Option<Values>) -> Rc<FormShared> {
        Rc::new(FormShared::new("signup".into(), values.map(Rc::new)))
    }

    #[test]
    fn default_value_reads_values_prop() {
        let host = Host::new();
        let mut values = Values::new();
        values.insert("email".into(), Value::text("a@x.com"));
        let form = shared(Some(values));
        let ctx = FormContext::new(host.downgrade(), Rc::downgrade(&form));

        assert_eq!(ctx.default_value("email", Value::Null), Value::text("a@x.com"));
        assert_eq!(ctx.default_value("name", Value::text("anon")), Value::text("anon"));
        assert_eq!(ctx.form_name().as_deref(), Some("signup"));
    }

    #[test]
    fn default_value_without_prop_or_form_is_fallback() {
        let host = Host::new();
        let form = shared(None);
        let ctx = FormContext::new(host.downgrade(), Rc::downgrade(&form));
        assert_eq!(ctx.default_value("x", Value::text("f")), Value::text("f"));

        drop(form);
        assert!(!ctx.is_attached());
        assert_eq!(FormContext::default().default_value("x", Value::Null), Value::Null);
    }

    #[test]
    fn provide_nests_and_unwinds() {
        let host = Host::new();
        let outer_form = shared(None);
        let inner_form = shared(None);
        let outer = FormContext::new(host.downgrade(), Rc::downgrade(&outer_form));
        let inner = FormContext::new(host.downgrade(), Rc::downgrade(&inner_form));

        assert!(FormContext::current().is_none());
        {
            let _a = outer.provide();
            assert!(FormContext::current().is_some_and(|c| c.same_form(&outer)));
            {
                let _b = inner.provide();
                assert!(FormContext::current().is_some_and(|c| c.same_form(&inner)));
            }
            assert!(FormContext::current().is_some_and(|c| c.same_form(&outer)));
        }
        assert!(FormContext::current().is_none());
    }
}

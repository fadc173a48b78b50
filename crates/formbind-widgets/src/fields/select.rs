#![forbid(unsafe_code)]

//! Select field controller. The empty option commits `Null`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use formbind_core::{EventType, NativeEvent, Value};

use super::UpdateOn;
use crate::actions::{FieldBinding, write_through};
use crate::node::{MountScope, Node};

type UpdatesCallback = Rc<dyn Fn(&Value)>;

struct SelectShared {
    draft: RefCell<Value>,
    update_on: Cell<UpdateOn>,
    on_updates: RefCell<Option<UpdatesCallback>>,
    binding: RefCell<Option<FieldBinding>>,
}

impl SelectShared {
    fn notify(&self, value: &Value) {
        let callback = self.on_updates.borrow().clone();
        if let Some(callback) = callback {
            callback(value);
        }
    }
}

/// Select field controller.
#[derive(Clone)]
pub struct Select {
    shared: Rc<SelectShared>,
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

impl Select {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(SelectShared {
                draft: RefCell::new(Value::Null),
                update_on: Cell::new(UpdateOn::Change),
                on_updates: RefCell::new(None),
                binding: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn update_on(self, update_on: UpdateOn) -> Self {
        self.shared.update_on.set(update_on);
        self
    }

    /// Called after every commit and every value pushed by the source.
    #[must_use]
    pub fn on_updates(self, callback: impl Fn(&Value) + 'static) -> Self {
        *self.shared.on_updates.borrow_mut() = Some(Rc::new(callback));
        self
    }

    #[must_use]
    pub fn draft(&self) -> Value {
        self.shared.draft.borrow().clone()
    }

    /// The option to show as selected; empty for none.
    #[must_use]
    pub fn selected(&self) -> String {
        self.shared.draft.borrow().to_string()
    }

    /// Feed a native event. Returns whether a commit was made.
    pub fn handle_event(&self, event: &NativeEvent) -> bool {
        let event_type = event.event_type();
        if !matches!(event_type, EventType::Change | EventType::Blur) {
            return false;
        }
        let chosen = &event.target().value;
        let value = if chosen.is_empty() {
            Value::Null
        } else {
            Value::text(chosen.clone())
        };
        *self.shared.draft.borrow_mut() = value.clone();
        if !self.shared.update_on.get().matches(event_type) {
            return false;
        }
        let writer = self.shared.binding.borrow().as_ref().map(FieldBinding::writer);
        let committed = writer.is_some_and(|writer| write_through(&writer, value.clone()));
        self.shared.notify(&value);
        committed
    }
}

impl Node for Select {
    fn mount(&mut self, scope: &MountScope) {
        if self.shared.binding.borrow().is_some() {
            return;
        }
        let Some(actions) = scope.actions() else {
            #[cfg(feature = "tracing")]
            tracing::warn!("select mounted outside an updater");
            return;
        };
        let weak: Weak<SelectShared> = Rc::downgrade(&self.shared);
        let binding = actions.bind(move |value| {
            if let Some(shared) = weak.upgrade() {
                *shared.draft.borrow_mut() = value.clone();
                shared.notify(value);
            }
        });
        if let Some(state) = actions.current() {
            *self.shared.draft.borrow_mut() = state.value;
        }
        *self.shared.binding.borrow_mut() = binding;
    }

    fn unmount(&mut self) {
        let binding = self.shared.binding.borrow_mut().take();
        drop(binding);
    }
}

impl fmt::Debug for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("draft", &self.shared.draft.borrow())
            .field("update_on", &self.shared.update_on.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::FieldActions;
    use formbind_runtime::{Debounce, Host};

    #[test]
    fn empty_option_commits_null_and_callbacks_fire() {
        let host = Host::new();
        let reg = host.add_source("country", Value::Null, Debounce::Off);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let select = Select::new().on_updates(move |v| sink.borrow_mut().push(v.clone()));
        let scope = MountScope::new().with_actions(FieldActions::new(reg.actions().clone()));
        select.clone().mount(&scope);

        assert!(select.handle_event(&NativeEvent::change("no")));
        assert_eq!(select.selected(), "no");
        assert!(select.handle_event(&NativeEvent::change("")));
        assert_eq!(host.source_state("country").unwrap().value, Value::Null);

        // push, commit, then push + commit for the second change
        assert_eq!(
            *seen.borrow(),
            [Value::text("no"), Value::text("no"), Value::Null, Value::Null]
        );
    }

    #[test]
    fn blur_mode_defers_commit_and_callback() {
        let host = Host::new();
        let reg = host.add_source("c", Value::Null, Debounce::Off);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let select = Select::new()
            .update_on(UpdateOn::Blur)
            .on_updates(move |_| counter.set(counter.get() + 1));
        let scope = MountScope::new().with_actions(FieldActions::new(reg.actions().clone()));
        select.clone().mount(&scope);

        assert!(!select.handle_event(&NativeEvent::change("se")));
        assert_eq!(calls.get(), 0);
        assert_eq!(select.draft(), Value::text("se"));
        assert!(select.handle_event(&NativeEvent::blur("se")));
        assert_eq!(host.source_state("c").unwrap().value, Value::text("se"));
    }
}

#![forbid(unsafe_code)]

//! Input field controller: text, checkbox, radio, and file inputs.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use formbind_core::{EventTarget, EventType, Key, NativeEvent, Value};

use super::{UpdateOn, toggle_membership};
use crate::actions::{FieldBinding, write_through};
use crate::node::{MountScope, Node};

/// Flavor of an [`Input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputKind {
    #[default]
    Text,
    Checkbox,
    Radio,
    File,
}

impl InputKind {
    fn is_checkable(self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }
}

/// What the native control should display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputView {
    /// Controlled `value`; `None` for file inputs, which cannot be controlled.
    pub value: Option<String>,
    /// Checked state of checkboxes and radios.
    pub checked: Option<bool>,
    /// Enter is swallowed until the blur commit.
    pub prevents_enter: bool,
}

struct InputShared {
    kind: InputKind,
    own_value: RefCell<Option<String>>,
    update_on: Cell<UpdateOn>,
    as_array: Cell<bool>,
    draft: RefCell<Value>,
    binding: RefCell<Option<FieldBinding>>,
}

/// Input field controller.
#[derive(Clone)]
pub struct Input {
    shared: Rc<InputShared>,
}

impl Input {
    #[must_use]
    pub fn new(kind: InputKind) -> Self {
        Self {
            shared: Rc::new(InputShared {
                kind,
                own_value: RefCell::new(None),
                update_on: Cell::new(UpdateOn::Change),
                as_array: Cell::new(false),
                draft: RefCell::new(Value::Null),
                binding: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn text() -> Self {
        Self::new(InputKind::Text)
    }

    /// Checkbox whose checked value is `value`.
    #[must_use]
    pub fn checkbox(value: impl Into<String>) -> Self {
        Self::new(InputKind::Checkbox).value(value)
    }

    #[must_use]
    pub fn radio(value: impl Into<String>) -> Self {
        Self::new(InputKind::Radio).value(value)
    }

    #[must_use]
    pub fn file() -> Self {
        Self::new(InputKind::File)
    }

    /// The control's own value: what a checked checkbox or radio commits.
    #[must_use]
    pub fn value(self, value: impl Into<String>) -> Self {
        *self.shared.own_value.borrow_mut() = Some(value.into());
        self
    }

    #[must_use]
    pub fn update_on(self, update_on: UpdateOn) -> Self {
        self.shared.update_on.set(update_on);
        self
    }

    /// Treat the source as a checkbox group: the value is the list of
    /// checked members.
    #[must_use]
    pub fn as_array(self, as_array: bool) -> Self {
        self.shared.as_array.set(as_array);
        self
    }

    #[must_use]
    pub fn kind(&self) -> InputKind {
        self.shared.kind
    }

    #[must_use]
    pub fn draft(&self) -> Value {
        self.shared.draft.borrow().clone()
    }

    /// Whether the control is bound to a source.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.shared.binding.borrow().is_some()
    }

    fn array_mode(&self) -> bool {
        self.shared.kind == InputKind::Checkbox && self.shared.as_array.get()
    }

    /// Feed a native event to the control. Returns whether a commit was
    /// made.
    pub fn handle_event(&self, event: &NativeEvent) -> bool {
        let update_on = self.shared.update_on.get();
        match event.event_type() {
            EventType::KeyDown(Key::Enter) if update_on == UpdateOn::Blur => {
                if !event.is_default_prevented() {
                    event.prevent_default();
                }
                false
            }
            event_type @ (EventType::Change | EventType::Blur) => {
                let value = self.event_value(event.target());
                *self.shared.draft.borrow_mut() = value.clone();
                if update_on.matches(event_type) {
                    self.commit(value)
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn event_value(&self, target: &EventTarget) -> Value {
        let kind = self.shared.kind;
        if kind == InputKind::File {
            return Value::files(target.files.clone().unwrap_or_default());
        }
        if self.array_mode() {
            let member = self
                .shared
                .own_value
                .borrow()
                .clone()
                .unwrap_or_else(|| target.value.clone());
            return toggle_membership(&self.shared.draft.borrow(), &member, target.checked);
        }
        if kind.is_checkable() && !target.checked {
            return Value::Null;
        }
        Value::text(target.value.clone())
    }

    fn commit(&self, value: Value) -> bool {
        // The binding may be released by a subscriber during the commit.
        let writer = self.shared.binding.borrow().as_ref().map(FieldBinding::writer);
        match writer {
            Some(writer) => write_through(&writer, value),
            None => false,
        }
    }

    /// What the native control should show for the current draft.
    #[must_use]
    pub fn view(&self) -> InputView {
        let draft = self.shared.draft.borrow();
        let own = self.shared.own_value.borrow();
        let prevents_enter = self.shared.update_on.get() == UpdateOn::Blur;
        match self.shared.kind {
            InputKind::File => InputView {
                value: None,
                checked: None,
                prevents_enter,
            },
            kind if kind.is_checkable() => {
                let checked = match own.as_deref() {
                    Some(own) if self.array_mode() => draft.contains(own),
                    Some(own) => draft.as_text() == Some(own),
                    None => false,
                };
                InputView {
                    value: own.clone(),
                    checked: Some(checked),
                    prevents_enter,
                }
            }
            _ => InputView {
                value: Some(draft.to_string()),
                checked: None,
                prevents_enter,
            },
        }
    }
}

impl Node for Input {
    fn mount(&mut self, scope: &MountScope) {
        if self.is_bound() {
            return;
        }
        let Some(actions) = scope.actions() else {
            #[cfg(feature = "tracing")]
            tracing::warn!("input mounted outside an updater");
            return;
        };
        let weak: Weak<InputShared> = Rc::downgrade(&self.shared);
        let binding = actions.bind(move |value| {
            if let Some(shared) = weak.upgrade() {
                *shared.draft.borrow_mut() = value.clone();
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

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("kind", &self.shared.kind)
            .field("value", &self.shared.own_value.borrow())
            .field("update_on", &self.shared.update_on.get())
            .field("as_array", &self.shared.as_array.get())
            .field("draft", &self.shared.draft.borrow())
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Native UI event boundary.
//!
//! A [`NativeEvent`] is what the UI toolkit hands to a field controller or a
//! form root: an event type, a snapshot of the target control, and two
//! mutable flags. The flags live in a `Cell` so every handler along the
//! dispatch path can inspect and set them through a shared reference.
//!
//! # Invariants
//!
//! 1. Flags only ever get set; nothing clears `DEFAULT_PREVENTED` or
//!    `PROPAGATION_STOPPED` once set.
//! 2. The target is immutable after construction.

use std::cell::Cell;

use bitflags::bitflags;

use crate::value::FileEntry;

bitflags! {
    /// Mutable state flags of a native event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u8 {
        /// `prevent_default()` has been called.
        const DEFAULT_PREVENTED = 1 << 0;
        /// `stop_propagation()` has been called.
        const PROPAGATION_STOPPED = 1 << 1;
    }
}

/// Keys a field controller cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
    Tab,
    Char(char),
}

/// Event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The control's content or checked state changed.
    Change,
    /// The control lost focus.
    Blur,
    /// A key was pressed inside the control.
    KeyDown(Key),
    /// The enclosing form was submitted.
    Submit,
    /// The enclosing form was reset.
    Reset,
}

/// Snapshot of the control that emitted the event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventTarget {
    /// Current text content (or the control's own value for checkboxes/radios).
    pub value: String,
    /// Checked state for checkboxes and radios.
    pub checked: bool,
    /// Selected files for file inputs.
    pub files: Option<Vec<FileEntry>>,
}

impl EventTarget {
    /// A target carrying only a text value.
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// A native UI event.
#[derive(Debug, Clone)]
pub struct NativeEvent {
    event_type: EventType,
    target: EventTarget,
    flags: Cell<EventFlags>,
}

impl NativeEvent {
    /// Create an event with a target snapshot.
    #[must_use]
    pub fn new(event_type: EventType, target: EventTarget) -> Self {
        Self {
            event_type,
            target,
            flags: Cell::new(EventFlags::empty()),
        }
    }

    /// A change event carrying `value`.
    #[must_use]
    pub fn change(value: impl Into<String>) -> Self {
        Self::new(EventType::Change, EventTarget::with_value(value))
    }

    /// A blur event carrying `value`.
    #[must_use]
    pub fn blur(value: impl Into<String>) -> Self {
        Self::new(EventType::Blur, EventTarget::with_value(value))
    }

    /// A change event from a checkbox or radio whose own value is `value`.
    #[must_use]
    pub fn toggle(value: impl Into<String>, checked: bool) -> Self {
        Self::new(
            EventType::Change,
            EventTarget {
                value: value.into(),
                checked,
                files: None,
            },
        )
    }

    /// A change event from a file input.
    #[must_use]
    pub fn files(files: Vec<FileEntry>) -> Self {
        Self::new(
            EventType::Change,
            EventTarget {
                files: Some(files),
                ..EventTarget::default()
            },
        )
    }

    /// A key-down event.
    #[must_use]
    pub fn key_down(key: Key) -> Self {
        Self::new(EventType::KeyDown(key), EventTarget::default())
    }

    /// A form submit event.
    #[must_use]
    pub fn submit() -> Self {
        Self::new(EventType::Submit, EventTarget::default())
    }

    /// A form reset event.
    #[must_use]
    pub fn reset() -> Self {
        Self::new(EventType::Reset, EventTarget::default())
    }

    /// Same event with a different type (e.g. the blur following a change).
    #[must_use]
    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    #[inline]
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> EventFlags {
        self.flags.get()
    }

    pub fn prevent_default(&self) {
        self.set(EventFlags::DEFAULT_PREVENTED);
    }

    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.flags.get().contains(EventFlags::DEFAULT_PREVENTED)
    }

    pub fn stop_propagation(&self) {
        self.set(EventFlags::PROPAGATION_STOPPED);
    }

    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.flags.get().contains(EventFlags::PROPAGATION_STOPPED)
    }

    fn set(&self, flag: EventFlags) {
        self.flags.set(self.flags.get() | flag);
    }
}

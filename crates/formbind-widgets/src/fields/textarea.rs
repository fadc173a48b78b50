#![forbid(unsafe_code)]

//! Multi-line text field with automatic height.
//!
//! With auto height on, the control's height follows its content: after
//! every draft change (user input or a pushed value) the height is reset to
//! zero and then set to the number of rows the text occupies when wrapped at
//! the current layout width. Widths are measured per grapheme cluster in
//! terminal cells.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use formbind_core::{EventType, NativeEvent, Value};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::UpdateOn;
use crate::actions::{FieldBinding, write_through};
use crate::node::{MountScope, Node};

struct TextareaShared {
    draft: RefCell<String>,
    update_on: Cell<UpdateOn>,
    auto_height: Cell<bool>,
    width: Cell<usize>,
    height: Cell<usize>,
    fits: Cell<usize>,
    binding: RefCell<Option<FieldBinding>>,
}

impl TextareaShared {
    fn fit_height(&self) {
        if !self.auto_height.get() {
            return;
        }
        let width = self.width.get();
        if width == 0 {
            return;
        }
        self.height.set(0);
        self.height.set(wrapped_rows(&self.draft.borrow(), width));
        self.fits.set(self.fits.get() + 1);
    }

    fn set_draft(&self, text: String) {
        *self.draft.borrow_mut() = text;
        self.fit_height();
    }
}

/// Rows `text` occupies when wrapped at `width` cells. At least one row.
#[must_use]
pub fn wrapped_rows(text: &str, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    text.split('\n')
        .map(|line| {
            let mut rows = 1;
            let mut used = 0;
            for grapheme in line.graphemes(true) {
                let w = grapheme.width();
                if used + w > width && used > 0 {
                    rows += 1;
                    used = 0;
                }
                used += w;
            }
            rows
        })
        .sum()
}

/// Textarea field controller.
#[derive(Clone)]
pub struct Textarea {
    shared: Rc<TextareaShared>,
}

impl Default for Textarea {
    fn default() -> Self {
        Self::new()
    }
}

impl Textarea {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(TextareaShared {
                draft: RefCell::new(String::new()),
                update_on: Cell::new(UpdateOn::Change),
                auto_height: Cell::new(true),
                width: Cell::new(0),
                height: Cell::new(0),
                fits: Cell::new(0),
                binding: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn update_on(self, update_on: UpdateOn) -> Self {
        self.shared.update_on.set(update_on);
        self
    }

    #[must_use]
    pub fn auto_height(self, auto_height: bool) -> Self {
        self.shared.auto_height.set(auto_height);
        self
    }

    /// Layout width in cells.
    #[must_use]
    pub fn width(self, width: usize) -> Self {
        self.set_width(width);
        self
    }

    /// Change the layout width and refit.
    pub fn set_width(&self, width: usize) {
        self.shared.width.set(width);
        self.shared.fit_height();
    }

    #[must_use]
    pub fn draft(&self) -> String {
        self.shared.draft.borrow().clone()
    }

    /// Current height in rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.shared.height.get()
    }

    /// How many times the height was recomputed.
    #[must_use]
    pub fn fit_count(&self) -> usize {
        self.shared.fits.get()
    }

    /// Feed a native event. Returns whether a commit was made.
    pub fn handle_event(&self, event: &NativeEvent) -> bool {
        let event_type = event.event_type();
        if !matches!(event_type, EventType::Change | EventType::Blur) {
            return false;
        }
        let text = event.target().value.clone();
        self.shared.set_draft(text.clone());
        if !self.shared.update_on.get().matches(event_type) {
            return false;
        }
        let writer = self.shared.binding.borrow().as_ref().map(FieldBinding::writer);
        writer.is_some_and(|writer| write_through(&writer, Value::text(text)))
    }
}

impl Node for Textarea {
    fn mount(&mut self, scope: &MountScope) {
        if self.shared.binding.borrow().is_some() {
            return;
        }
        if let Some(actions) = scope.actions() {
            let weak: Weak<TextareaShared> = Rc::downgrade(&self.shared);
            let binding = actions.bind(move |value| {
                if let Some(shared) = weak.upgrade() {
                    shared.set_draft(value.to_string());
                }
            });
            if let Some(state) = actions.current() {
                *self.shared.draft.borrow_mut() = state.value.to_string();
            }
            *self.shared.binding.borrow_mut() = binding;
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("textarea mounted outside an updater");
        }
        self.shared.fit_height();
    }

    fn unmount(&mut self) {
        let binding = self.shared.binding.borrow_mut().take();
        drop(binding);
    }

    fn refresh(&mut self) {
        self.shared.fit_height();
    }
}

impl fmt::Debug for Textarea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Textarea")
            .field("draft", &self.shared.draft.borrow())
            .field("width", &self.shared.width.get())
            .field("height", &self.shared.height.get())
            .finish()
    }
}

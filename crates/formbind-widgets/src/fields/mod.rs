//! Field controllers.
//!
//! A field keeps a local draft for rendering and commits it to its source
//! through the [`FieldActions`](crate::FieldActions) of the enclosing
//! [`Updater`](crate::Updater). Values pushed by the source replace the draft
//! unconditionally.
//!
//! Fields are cheap handles: cloning one yields another handle to the same
//! control. Put one clone in the tree and keep another to dispatch native
//! events and read the view.

pub mod input;
pub mod select;
pub mod textarea;

pub use input::{Input, InputKind, InputView};
pub use select::Select;
pub use textarea::Textarea;

use formbind_core::{EventType, Value};

/// Which native event commits the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateOn {
    #[default]
    Change,
    Blur,
}

impl UpdateOn {
    /// Whether `event` is the committing event.
    #[must_use]
    pub fn matches(self, event: EventType) -> bool {
        matches!(
            (self, event),
            (Self::Change, EventType::Change) | (Self::Blur, EventType::Blur)
        )
    }
}

/// Checkbox-group membership toggle.
///
/// Checking adds `member` when absent; unchecking removes every occurrence.
/// The result is always a newly built container, or `Null` when empty.
/// A non-list `current` counts as the empty set.
#[must_use]
pub fn toggle_membership(current: &Value, member: &str, checked: bool) -> Value {
    let mut items: Vec<String> = current.as_list().map(<[String]>::to_vec).unwrap_or_default();
    if checked {
        if !items.iter().any(|item| item == member) {
            items.push(member.to_owned());
        }
    } else {
        items.retain(|item| item != member);
    }
    if items.is_empty() {
        Value::Null
    } else {
        Value::list(items)
    }
}

//! Opaque field values as seen by the host and by field controllers.
//!
//! # Invariants
//!
//! 1. `List` and `Files` hold shared immutable containers. Any change to the
//!    members produces a *new* container, so `Rc::ptr_eq` on two list values
//!    tells a consumer whether anything was rebuilt.
//! 2. `Null` is the only "cleared" value. Field controllers never produce an
//!    empty `List` or an empty `Files`; they produce `Null` instead.
//!
//! # Example
//!
//! ```
//! use formbind_core::Value;
//!
//! let colors = Value::list(["red", "blue"]);
//! assert!(colors.contains("red"));
//! assert_eq!(colors.to_string(), "red,blue");
//! assert!(Value::Null.is_null());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Name → value mapping, ordered by name.
pub type Values = BTreeMap<String, Value>;

/// Name → ordered error messages.
pub type HostErrors = BTreeMap<String, Vec<String>>;

/// A selected file, as reported by a file input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileEntry {
    /// File name without directory components.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type, when the platform reports one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub mime: Option<String>,
}

impl FileEntry {
    /// Create a file entry with no MIME type.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime: None,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// An opaque field value.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Absent or deliberately cleared.
    #[default]
    Null,
    /// Text-like content (text inputs, textareas, selects, single checkboxes).
    Text(String),
    /// Membership set of a checkbox group, in check order.
    List(Rc<[String]>),
    /// Files picked in a file input.
    Files(Rc<[FileEntry]>),
}

impl Value {
    /// Build a text value.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Build a list value in a freshly allocated container.
    #[must_use]
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a file-list value, or `Null` when `files` is empty.
    #[must_use]
    pub fn files(files: Vec<FileEntry>) -> Self {
        if files.is_empty() {
            Self::Null
        } else {
            Self::Files(files.into())
        }
    }

    /// Whether the value is `Null`.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// List members, if this is a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Files, if this is a file-list value.
    #[must_use]
    pub fn as_files(&self) -> Option<&[FileEntry]> {
        match self {
            Self::Files(files) => Some(files),
            _ => None,
        }
    }

    /// Whether a list value contains `member`. Non-list values never do.
    #[must_use]
    pub fn contains(&self, member: &str) -> bool {
        self.as_list()
            .is_some_and(|items| items.iter().any(|item| item == member))
    }

    /// `None` for `Null`, `Some(self)` otherwise.
    #[must_use]
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(",")),
            Self::Files(files) => {
                for (i, file) in files.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(&file.name)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into())
    }
}

impl From<Vec<FileEntry>> for Value {
    fn from(files: Vec<FileEntry>) -> Self {
        Self::files(files)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Parse a JSON object into [`Values`].
///
/// # Errors
///
/// Returns the `serde_json` error when `json` is not an object whose members
/// are `null`, strings, string arrays, or file-entry arrays.
#[cfg(feature = "serde")]
pub fn values_from_json(json: serde_json::Value) -> Result<Values, serde_json::Error> {
    serde_json::from_value(json)
}

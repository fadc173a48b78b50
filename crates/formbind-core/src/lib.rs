#![forbid(unsafe_code)]

//! Core: field values, the native UI event boundary, and the time source.
//!
//! This crate has no notion of a host or of components; it only defines the
//! data that flows between them.

pub mod clock;
pub mod event;
pub mod value;

pub use clock::{Clock, LabClock};
pub use event::{EventFlags, EventTarget, EventType, Key, NativeEvent};
pub use value::{FileEntry, HostErrors, Value, Values};

#![forbid(unsafe_code)]

//! Form binding components for formbind.
//!
//! - [`Form`]: owns a host and provides the [`FormContext`] to its subtree.
//! - [`Updater`]: registers a named source for its mount span and hands
//!   [`FieldActions`] to its child.
//! - [`Listener`]: read-only rendering from the state of one source or of the
//!   whole form.
//! - Field controllers: [`Input`], [`Textarea`], [`Select`].
//! - Tree plumbing: [`Node`], [`Element`], [`Fragment`], [`When`], [`Render`].
//!
//! # Feature Flags
//!
//! - `tracing`: mount spans and warnings through the `tracing` crate.

pub mod actions;
pub mod context;
pub mod fields;
pub mod form;
pub mod listener;
pub mod node;
pub mod updater;

pub use actions::{FieldActions, FieldBinding};
pub use context::{ContextGuard, FormContext};
pub use fields::{Input, InputKind, InputView, Select, Textarea, UpdateOn, toggle_membership};
pub use form::{ClearHandle, Form, FormBuilder, FormProps};
pub use listener::Listener;
pub use node::{
    Element, Fragment, MountScope, NestingError, Node, NodeKind, Render, When, check_nesting,
};
pub use updater::Updater;

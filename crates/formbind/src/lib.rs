#![forbid(unsafe_code)]

//! formbind public facade.
//!
//! Bind UI field controllers to a form-state host: a [`Form`] owns the host,
//! [`Updater`]s register named sources for their subtree, [`Listener`]s
//! render from host state, and [`Input`], [`Textarea`] and [`Select`] turn
//! native events into commits.
//!
//! # Quick Start
//!
//! ```
//! use formbind::prelude::*;
//!
//! let agree = Input::checkbox("yes");
//! let mut form = Form::builder("terms")
//!     .child(Updater::new("agree", Element::new().child(agree.clone())))
//!     .on_send(|_, state, _| assert_eq!(state.values["agree"], Value::text("yes")))
//!     .build();
//! form.mount();
//!
//! agree.handle_event(&NativeEvent::toggle("yes", true));
//! form.handle_event(&NativeEvent::submit());
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: widget mount spans and warnings.
//! - `serde`: (de)serialize values, errors and file entries.
//! - `policy-config`: load `HostConfig` from TOML.

pub use formbind_core as core;
pub use formbind_runtime as runtime;
pub use formbind_widgets as widgets;

pub use formbind_core::{
    Clock, FileEntry, HostErrors, Key, LabClock, NativeEvent, Value, Values,
};
pub use formbind_runtime::{
    Debounce, EventKind, Host, HostConfig, HostState, ListenerHandle, SourceError, SourceState,
    StateSnapshot, ValidationTicket, Validator, events,
};
pub use formbind_widgets::{
    Element, FieldActions, Form, FormBuilder, FormContext, FormProps, Fragment, Input, InputKind,
    Listener, MountScope, NestingError, Node, Render, Select, Textarea, UpdateOn, Updater, When,
};

/// Everything needed to build and drive a form.
pub mod prelude {
    pub use crate::{
        Debounce, Element, Form, FormProps, HostErrors, HostState, Input, Listener, NativeEvent,
        Node, Select, StateSnapshot, Textarea, UpdateOn, Updater, Value, Values, When, events,
    };
}

#![forbid(unsafe_code)]

//! Form-state host engine for formbind.
//!
//! - [`Host`]: the authoritative store of source values, busy flags, errors,
//!   and touched state, with synchronous change dispatch.
//! - [`SourceRegistration`] / [`SourceActions`] / [`SourceWriter`]: handles
//!   over one named source.
//! - [`ListenerHandle`] and [`SubscriptionScope`]: subscription lifetimes.
//! - [`DebounceQueue`]: last-write-wins delayed commits, driven by
//!   [`Host::run_due_timers`].
//! - [`Validator`] / [`ValidationTicket`]: pluggable, possibly deferred
//!   validation.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Timers advance only
//! when the embedding event loop calls [`Host::run_due_timers`].

pub mod config;
pub mod debounce;
pub mod event;
pub mod host;
pub mod scope;
pub mod state;
pub mod validate;

pub use config::{ConfigError, DEFAULT_DEBOUNCE, HostConfig};
pub use debounce::{Debounce, DebounceQueue, PendingWrite, WriterId};
pub use event::{Changes, EventKind, events};
pub use host::{
    Host, ListenerHandle, SourceActions, SourceError, SourceRegistration, SourceWriter, WeakHost,
};
pub use scope::{Held, SubscriptionScope};
pub use state::{HostState, SourceState, StateSnapshot};
pub use validate::{ValidationTicket, Validator};

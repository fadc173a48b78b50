#![forbid(unsafe_code)]

//! The form-state host.
//!
//! A [`Host`] owns the authoritative map of source name → `{value, busy,
//! errors, touched}` for one form and dispatches change notifications to
//! subscribers. Components never reference each other; every mutation goes
//! through host-provided handles.
//!
//! # Handles
//!
//! - [`SourceRegistration`]: the release handle of one source acquisition.
//!   Dropping it (or calling `release()`) gives the acquisition back.
//! - [`SourceActions`]: cloneable capability to read and write one source
//!   registration. Inert once that registration span ends.
//! - [`SourceWriter`]: a debounced write path owned by one field. Releasing it
//!   cancels the write it left pending.
//! - [`ListenerHandle`]: the release handle of one subscription.
//!
//! # Invariants
//!
//! 1. At most one slot per name. Acquiring a live name shares the slot and
//!    bumps its reference count; the slot is destroyed when the last
//!    acquisition is released.
//! 2. Every slot has a generation unique within the host. Handles carry the
//!    generation they were issued for, so a handle from an earlier
//!    registration span can never write into a later one.
//! 3. Dispatch is synchronous and no borrow is held while a callback runs.
//!    A subscription released during dispatch is skipped for the rest of it.
//! 4. Each callback receives a snapshot computed at the moment it is called,
//!    never one cached from earlier in the same dispatch.
//! 5. At most one pending debounced write per source; destroying the source,
//!    `init`, `clear`, or releasing the scheduling writer cancels it.
//!
//! # Example
//!
//! ```
//! use formbind_core::Value;
//! use formbind_runtime::{Debounce, Host, events};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let host = Host::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _sub = host.listen(
//!     events::ANY,
//!     move |snapshot| sink.borrow_mut().push(snapshot.value_of("email").cloned()),
//!     None,
//! );
//!
//! let email = host.add_source("email", Value::Null, Debounce::Off);
//! email.actions().update("a@x.com").unwrap();
//! assert_eq!(seen.borrow().last(), Some(&Some(Value::text("a@x.com"))));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use formbind_core::{Clock, HostErrors, Value, Values};
use tracing::{debug, trace, warn};
use web_time::{Duration, Instant};

use crate::config::HostConfig;
use crate::debounce::{Debounce, DebounceQueue, WriterId};
use crate::event::{Changes, EventKind};
use crate::state::{HostState, SourceState, StateSnapshot};
use crate::validate::{ValidationTicket, Validator};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error returned by source handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The host that issued the handle no longer exists.
    HostDropped,
    /// The registration span the handle belongs to has ended.
    Released { name: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostDropped => write!(f, "form host has been dropped"),
            Self::Released { name } => write!(f, "source '{name}' is no longer registered"),
        }
    }
}

impl std::error::Error for SourceError {}

// ─── Internal state ──────────────────────────────────────────────────────────

struct SourceSlot {
    value: Value,
    default: Value,
    busy: bool,
    errors: Option<Vec<String>>,
    touched: bool,
    debounce: Option<Duration>,
    generation: u64,
    refs: usize,
    /// Value came from `retained`; the next source `init` is skipped.
    restored: bool,
}

impl SourceSlot {
    fn state(&self) -> SourceState {
        SourceState {
            value: self.value.clone(),
            busy: self.busy,
            errors: self.errors.clone(),
            touched: self.touched,
        }
    }
}

#[derive(Default)]
struct HostCore {
    sources: BTreeMap<String, SourceSlot>,
    retained: AHashMap<String, Value>,
    pending: DebounceQueue,
    busy: bool,
    next_generation: u64,
}

impl HostCore {
    fn live_slot_mut(&mut self, name: &str, generation: u64) -> Result<&mut SourceSlot, SourceError> {
        match self.sources.get_mut(name) {
            Some(slot) if slot.generation == generation => Ok(slot),
            _ => Err(SourceError::Released {
                name: name.to_owned(),
            }),
        }
    }
}

type Callback = Rc<dyn Fn(&StateSnapshot)>;

struct ListenerEntry {
    id: u64,
    kind: EventKind,
    scope: Option<String>,
    callback: Callback,
}

#[derive(Default)]
struct ListenerTable {
    entries: Vec<ListenerEntry>,
    next_id: u64,
}

impl ListenerTable {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }
}

pub(crate) struct HostInner {
    core: RefCell<HostCore>,
    listeners: RefCell<ListenerTable>,
    validator: RefCell<Option<Rc<dyn Validator>>>,
    next_writer: Cell<WriterId>,
    clock: Clock,
    config: HostConfig,
}

// ─── Host ────────────────────────────────────────────────────────────────────

/// Shared form-state host. Cloning yields another handle to the same host.
#[derive(Clone)]
pub struct Host {
    inner: Rc<HostInner>,
}

/// Non-owning handle to a [`Host`].
#[derive(Clone, Default)]
pub struct WeakHost {
    inner: Weak<HostInner>,
}

impl WeakHost {
    #[must_use]
    pub fn upgrade(&self) -> Option<Host> {
        self.inner.upgrade().map(|inner| Host { inner })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHost")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.borrow();
        f.debug_struct("Host")
            .field("sources", &core.sources.keys().collect::<Vec<_>>())
            .field("pending", &core.pending.len())
            .field("listeners", &self.inner.listeners.borrow().entries.len())
            .field("busy", &core.busy)
            .finish()
    }
}

impl Host {
    /// Host with default configuration on the real clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(HostConfig::default(), Clock::Real)
    }

    #[must_use]
    pub fn with_config(config: HostConfig) -> Self {
        Self::with_clock(config, Clock::Real)
    }

    /// Host reading debounce deadlines from `clock`.
    #[must_use]
    pub fn with_clock(config: HostConfig, clock: Clock) -> Self {
        Self {
            inner: Rc::new(HostInner {
                core: RefCell::new(HostCore::default()),
                listeners: RefCell::new(ListenerTable::default()),
                validator: RefCell::new(None),
                next_writer: Cell::new(1),
                clock,
                config,
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakHost {
        WeakHost {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Install the validation algorithm used by [`validate`](Self::validate).
    pub fn set_validator(&self, validator: impl Validator + 'static) {
        self.set_shared_validator(Rc::new(validator));
    }

    /// Install a validator that is shared with other owners.
    pub fn set_shared_validator(&self, validator: Rc<dyn Validator>) {
        *self.inner.validator.borrow_mut() = Some(validator);
    }

    pub fn clear_validator(&self) {
        *self.inner.validator.borrow_mut() = None;
    }

    // ── Bulk operations ─────────────────────────────────────────────────

    /// Replace every live source's value from `values`.
    ///
    /// Sources missing from `values` (or all sources, when `values` is
    /// `None`) fall back to their registration default. Names without a live
    /// source are ignored; `init` never creates sources. Pending debounced
    /// writes of the affected sources are cancelled.
    pub fn init(&self, values: Option<&Values>) {
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            let HostCore {
                sources, pending, ..
            } = &mut *core;
            let mut changed = Vec::new();
            for (name, slot) in sources.iter_mut() {
                pending.cancel(name);
                let next = values
                    .and_then(|values| values.get(name))
                    .cloned()
                    .unwrap_or_else(|| slot.default.clone());
                if slot.value != next || slot.touched {
                    slot.value = next;
                    slot.touched = false;
                    changed.push(name.clone());
                }
            }
            changed
        };
        debug!(changed = changed.len(), "host init");
        self.emit(Changes::VALUE, &changed, false);
    }

    /// Reset every source to the empty state: `Null`, no errors, not busy,
    /// untouched. Also clears the host-wide busy flag.
    pub fn clear(&self) {
        let names = {
            let mut core = self.inner.core.borrow_mut();
            core.busy = false;
            let HostCore {
                sources, pending, ..
            } = &mut *core;
            for (name, slot) in sources.iter_mut() {
                pending.cancel(name);
                slot.value = Value::Null;
                slot.errors = None;
                slot.busy = false;
                slot.touched = false;
            }
            sources.keys().cloned().collect::<Vec<_>>()
        };
        debug!(sources = names.len(), "host clear");
        self.emit(Changes::VALUE | Changes::BUSY | Changes::ERRORS, &names, true);
    }

    /// Replace every live source's errors from `errors` (`None` clears all).
    /// Empty lists are stored as "no errors".
    pub fn set_errors(&self, errors: Option<&HostErrors>) {
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            if let Some(errors) = errors {
                for name in errors.keys().filter(|name| !core.sources.contains_key(*name)) {
                    debug!(source = name.as_str(), "errors for unknown source ignored");
                }
            }
            let mut changed = Vec::new();
            for (name, slot) in core.sources.iter_mut() {
                let next = normalize_errors(errors.and_then(|errors| errors.get(name)).cloned());
                if slot.errors != next {
                    slot.errors = next;
                    changed.push(name.clone());
                }
            }
            changed
        };
        self.emit(Changes::ERRORS, &changed, false);
    }

    /// Set the busy flag of the named sources, or of the host and every live
    /// source when `names` is `None`.
    pub fn set_busy(&self, busy: bool, names: Option<&[&str]>) {
        let (changed, host_changed) = {
            let mut core = self.inner.core.borrow_mut();
            let mut changed = Vec::new();
            let mut host_changed = false;
            match names {
                None => {
                    host_changed = core.busy != busy;
                    core.busy = busy;
                    for (name, slot) in core.sources.iter_mut() {
                        if slot.busy != busy {
                            slot.busy = busy;
                            changed.push(name.clone());
                        }
                    }
                }
                Some(names) => {
                    for name in names {
                        match core.sources.get_mut(*name) {
                            Some(slot) if slot.busy != busy => {
                                slot.busy = busy;
                                changed.push((*name).to_owned());
                            }
                            Some(_) => {}
                            None => debug!(source = *name, "busy for unknown source ignored"),
                        }
                    }
                }
            }
            (changed, host_changed)
        };
        self.emit(Changes::BUSY, &changed, host_changed);
    }

    /// Run validation and hand the resulting aggregate state to `callback`.
    ///
    /// Pending debounced writes in scope are flushed first. The installed
    /// [`Validator`] may resolve its ticket immediately or later; `callback`
    /// runs once the ticket resolves. Without a validator, errors stay as
    /// they are and `callback` runs immediately.
    pub fn validate(&self, callback: impl FnOnce(&HostState) + 'static, scope: Option<&str>) {
        self.flush_pending(scope);
        let ticket = ValidationTicket::new(
            self.downgrade(),
            scope.map(str::to_owned),
            Box::new(callback),
        );
        let validator = self.inner.validator.borrow().clone();
        match validator {
            Some(validator) => {
                let values = self.snapshot().values;
                debug!(scope = scope.unwrap_or("*"), "validation requested");
                validator.validate(&values, scope, ticket);
            }
            None => ticket.complete(),
        }
    }

    // ── Sources ─────────────────────────────────────────────────────────

    /// Acquire the source `name`.
    ///
    /// A new slot starts in the host's empty state (`Null`), or with the
    /// retained value when [`HostConfig::retain_removed_values`] kept one.
    /// `default` is what `init` falls back to; applying it is the caller's
    /// job (see [`SourceActions::init`]). Acquiring a live name shares its
    /// slot; `default` and `debounce` of later acquisitions are ignored.
    pub fn add_source(
        &self,
        name: &str,
        default: impl Into<Value>,
        debounce: impl Into<Debounce>,
    ) -> SourceRegistration {
        let (generation, created) = {
            let mut core = self.inner.core.borrow_mut();
            if let Some(slot) = core.sources.get_mut(name) {
                slot.refs += 1;
                debug!(source = name, refs = slot.refs, "source shared");
                (slot.generation, false)
            } else {
                let generation = core.next_generation;
                core.next_generation += 1;
                let retained = if self.inner.config.retain_removed_values {
                    core.retained.remove(name)
                } else {
                    None
                };
                let restored = retained.is_some();
                core.sources.insert(
                    name.to_owned(),
                    SourceSlot {
                        value: retained.unwrap_or_default(),
                        default: default.into(),
                        busy: false,
                        errors: None,
                        touched: false,
                        debounce: debounce.into().resolve(self.inner.config.default_debounce),
                        generation,
                        refs: 1,
                        restored,
                    },
                );
                debug!(source = name, generation, restored, "source registered");
                (generation, true)
            }
        };
        if created {
            self.emit(Changes::VALUE, &[name.to_owned()], false);
        }
        SourceRegistration {
            actions: SourceActions {
                host: self.downgrade(),
                name: Rc::from(name),
                generation,
            },
            released: Cell::new(false),
        }
    }

    /// Give back one acquisition of `name`, whatever registration span it
    /// belongs to. Returns whether the slot was destroyed.
    pub fn remove_source(&self, name: &str) -> bool {
        let generation = self
            .inner
            .core
            .borrow()
            .sources
            .get(name)
            .map(|slot| slot.generation);
        generation.is_some_and(|generation| self.release(name, generation))
    }

    #[must_use]
    pub fn has_source(&self, name: &str) -> bool {
        self.inner.core.borrow().sources.contains_key(name)
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.inner.core.borrow().sources.len()
    }

    /// Number of live acquisitions of `name` (0 when absent).
    #[must_use]
    pub fn source_refs(&self, name: &str) -> usize {
        self.inner
            .core
            .borrow()
            .sources
            .get(name)
            .map_or(0, |slot| slot.refs)
    }

    #[must_use]
    pub fn source_state(&self, name: &str) -> Option<SourceState> {
        self.inner.core.borrow().sources.get(name).map(SourceSlot::state)
    }

    /// Aggregate state of every live source.
    #[must_use]
    pub fn snapshot(&self) -> HostState {
        let core = self.inner.core.borrow();
        let mut state = HostState {
            busy: core.busy,
            ..HostState::default()
        };
        for (name, slot) in &core.sources {
            state.values.insert(name.clone(), slot.value.clone());
            if let Some(errors) = slot.errors.as_ref() {
                state.errors.insert(name.clone(), errors.clone());
            }
            state.busy |= slot.busy;
            state.touched |= slot.touched;
        }
        state
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Subscribe to `kind` changes, of every source (`scope == None`, the
    /// callback receives [`StateSnapshot::Host`]) or of one source (the
    /// callback receives [`StateSnapshot::Source`]).
    pub fn listen(
        &self,
        kind: EventKind,
        callback: impl Fn(&StateSnapshot) + 'static,
        scope: Option<&str>,
    ) -> ListenerHandle {
        let mut listeners = self.inner.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push(ListenerEntry {
            id,
            kind,
            scope: scope.map(str::to_owned),
            callback: Rc::new(callback),
        });
        trace!(listener = id, scope = scope.unwrap_or("*"), "listener added");
        ListenerHandle {
            host: Rc::downgrade(&self.inner),
            id,
            released: Cell::new(false),
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().entries.len()
    }

    // ── Timers ──────────────────────────────────────────────────────────

    /// Apply every debounced write whose deadline has passed. Returns the
    /// number of writes applied.
    pub fn run_due_timers(&self) -> usize {
        let now = self.inner.clock.now();
        let due = self.inner.core.borrow_mut().pending.take_due(now);
        self.apply_pending(due)
    }

    /// Apply pending writes now, regardless of deadline; all of them or just
    /// the one for `scope`.
    pub fn flush_pending(&self, scope: Option<&str>) -> usize {
        let pending = self.inner.core.borrow_mut().pending.take_all(scope);
        self.apply_pending(pending)
    }

    /// When the next debounced write falls due.
    #[must_use]
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.inner.core.borrow().pending.next_deadline()
    }

    #[must_use]
    pub fn has_pending(&self, name: &str) -> bool {
        self.inner.core.borrow().pending.is_pending(name)
    }

    fn apply_pending(&self, writes: Vec<(String, crate::debounce::PendingWrite)>) -> usize {
        let mut applied = 0;
        for (name, write) in writes {
            match self.write_value(&name, write.generation, write.value, true) {
                Ok(()) => applied += 1,
                Err(err) => debug!(source = name.as_str(), %err, "debounced write dropped"),
            }
        }
        applied
    }

    // ── Handle plumbing ─────────────────────────────────────────────────

    fn write_value(
        &self,
        name: &str,
        generation: u64,
        value: Value,
        touched: bool,
    ) -> Result<(), SourceError> {
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            let slot = core.live_slot_mut(name, generation)?;
            if slot.value == value && slot.touched == touched {
                false
            } else {
                slot.value = value;
                slot.touched = touched;
                true
            }
        };
        if changed {
            trace!(source = name, touched, "value written");
            self.emit(Changes::VALUE, &[name.to_owned()], false);
        }
        Ok(())
    }

    fn init_source(&self, name: &str, generation: u64, value: Value) -> Result<(), SourceError> {
        {
            let mut core = self.inner.core.borrow_mut();
            let slot = core.live_slot_mut(name, generation)?;
            if slot.restored {
                slot.restored = false;
                trace!(source = name, "init skipped, retained value kept");
                return Ok(());
            }
            core.pending.cancel(name);
        }
        self.write_value(name, generation, value, false)
    }

    fn commit(
        &self,
        name: &str,
        generation: u64,
        value: Value,
        writer: Option<WriterId>,
    ) -> Result<(), SourceError> {
        let delay = {
            let mut core = self.inner.core.borrow_mut();
            let delay = core.live_slot_mut(name, generation)?.debounce;
            if let Some(delay) = delay {
                let due = self.inner.clock.now() + delay;
                core.pending.schedule(name, generation, value.clone(), due, writer);
                trace!(source = name, delay_ms = delay.as_millis() as u64, "write debounced");
            }
            delay
        };
        match delay {
            Some(_) => Ok(()),
            None => self.write_value(name, generation, value, true),
        }
    }

    fn set_source_busy(&self, name: &str, generation: u64, busy: bool) -> Result<(), SourceError> {
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            let slot = core.live_slot_mut(name, generation)?;
            std::mem::replace(&mut slot.busy, busy) != busy
        };
        if changed {
            self.emit(Changes::BUSY, &[name.to_owned()], false);
        }
        Ok(())
    }

    fn set_source_errors(
        &self,
        name: &str,
        generation: u64,
        errors: Option<Vec<String>>,
    ) -> Result<(), SourceError> {
        let errors = normalize_errors(errors);
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            let slot = core.live_slot_mut(name, generation)?;
            if slot.errors == errors {
                false
            } else {
                slot.errors = errors;
                true
            }
        };
        if changed {
            self.emit(Changes::ERRORS, &[name.to_owned()], false);
        }
        Ok(())
    }

    /// Release one acquisition of the `generation` span of `name`. Returns
    /// whether the slot was destroyed.
    fn release(&self, name: &str, generation: u64) -> bool {
        {
            let mut core = self.inner.core.borrow_mut();
            let Ok(slot) = core.live_slot_mut(name, generation) else {
                return false;
            };
            slot.refs = slot.refs.saturating_sub(1);
            if slot.refs > 0 {
                debug!(source = name, refs = slot.refs, "source reference released");
                return false;
            }
            let Some(slot) = core.sources.remove(name) else {
                return false;
            };
            if core.pending.cancel(name).is_some() {
                debug!(source = name, "pending write cancelled on removal");
            }
            if self.inner.config.retain_removed_values {
                core.retained.insert(name.to_owned(), slot.value);
            }
        }
        debug!(source = name, generation, "source removed");
        self.emit(Changes::VALUE, &[], true);
        true
    }

    fn cancel_pending_from(&self, name: &str, writer: WriterId) {
        if self
            .inner
            .core
            .borrow_mut()
            .pending
            .cancel_from(name, writer)
            .is_some()
        {
            debug!(source = name, writer, "pending write cancelled on writer release");
        }
    }

    fn next_writer_id(&self) -> WriterId {
        let id = self.inner.next_writer.get();
        self.inner.next_writer.set(id + 1);
        id
    }

    /// Store validation results: for the scoped source only, or for every
    /// live source.
    pub(crate) fn apply_validation(&self, scope: Option<&str>, errors: &HostErrors) {
        match scope {
            None => self.set_errors(Some(errors)),
            Some(name) => {
                let generation = self
                    .inner
                    .core
                    .borrow()
                    .sources
                    .get(name)
                    .map(|slot| slot.generation);
                match generation {
                    Some(generation) => {
                        // Cannot fail: the generation was just read.
                        let _ = self.set_source_errors(name, generation, errors.get(name).cloned());
                    }
                    None => debug!(source = name, "validation result for unknown source ignored"),
                }
            }
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Notify subscribers. Scoped subscribers of `names` receive their
    /// source; unscoped subscribers receive the aggregate when `names` is
    /// non-empty or `aggregate` is set.
    fn emit(&self, changes: Changes, names: &[String], aggregate: bool) {
        if changes.is_empty() || (names.is_empty() && !aggregate) {
            return;
        }
        let targets: Vec<(u64, Option<String>, Callback)> = {
            let listeners = self.inner.listeners.borrow();
            listeners
                .entries
                .iter()
                .filter(|entry| entry.kind.matches(changes))
                .filter(|entry| match &entry.scope {
                    Some(scope) => names.iter().any(|name| name == scope),
                    None => true,
                })
                .map(|entry| (entry.id, entry.scope.clone(), Rc::clone(&entry.callback)))
                .collect()
        };
        for (id, scope, callback) in targets {
            if !self.inner.listeners.borrow().contains(id) {
                continue;
            }
            let snapshot = match scope {
                Some(name) => match self.source_state(&name) {
                    Some(state) => StateSnapshot::Source { name, state },
                    None => continue,
                },
                None => StateSnapshot::Host(self.snapshot()),
            };
            callback(&snapshot);
        }
    }
}

fn normalize_errors(errors: Option<Vec<String>>) -> Option<Vec<String>> {
    errors.filter(|errors| !errors.is_empty())
}

// ─── SourceRegistration ──────────────────────────────────────────────────────

/// Release handle of one source acquisition.
///
/// Dropping the registration releases it. `release()` is idempotent.
#[must_use = "dropping the registration releases the source"]
pub struct SourceRegistration {
    actions: SourceActions,
    released: Cell<bool>,
}

impl SourceRegistration {
    #[must_use]
    pub fn actions(&self) -> &SourceActions {
        &self.actions
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.actions.name()
    }

    /// Give the acquisition back. Only the first call has an effect.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        if let Some(host) = self.actions.host.upgrade() {
            host.release(&self.actions.name, self.actions.generation);
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

impl Drop for SourceRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SourceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistration")
            .field("name", &self.actions.name())
            .field("generation", &self.actions.generation)
            .field("released", &self.released.get())
            .finish()
    }
}

// ─── SourceActions ───────────────────────────────────────────────────────────

/// Capability to read and write one registration span of a source.
#[derive(Clone)]
pub struct SourceActions {
    host: WeakHost,
    name: Rc<str>,
    generation: u64,
}

impl SourceActions {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the registration span this handle belongs to is still live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.host.upgrade().is_some_and(|host| {
            host.inner
                .core
                .borrow()
                .sources
                .get(&*self.name)
                .is_some_and(|slot| slot.generation == self.generation)
        })
    }

    /// Current state of the source, while live.
    #[must_use]
    pub fn state(&self) -> Option<SourceState> {
        let host = self.host.upgrade()?;
        let core = host.inner.core.borrow();
        core.sources
            .get(&*self.name)
            .filter(|slot| slot.generation == self.generation)
            .map(SourceSlot::state)
    }

    /// Write an initial value: not a user edit, never debounced, cancels a
    /// pending debounced write.
    ///
    /// # Errors
    ///
    /// [`SourceError`] when the host is gone or the span has ended.
    pub fn init(&self, value: impl Into<Value>) -> Result<(), SourceError> {
        self.host()?.init_source(&self.name, self.generation, value.into())
    }

    /// Commit a user edit, debounced when the source was registered with a
    /// debounce delay.
    ///
    /// # Errors
    ///
    /// [`SourceError`] when the host is gone or the span has ended.
    pub fn update(&self, value: impl Into<Value>) -> Result<(), SourceError> {
        self.host()?
            .commit(&self.name, self.generation, value.into(), None)
    }

    /// # Errors
    ///
    /// [`SourceError`] when the host is gone or the span has ended.
    pub fn set_busy(&self, busy: bool) -> Result<(), SourceError> {
        self.host()?.set_source_busy(&self.name, self.generation, busy)
    }

    /// # Errors
    ///
    /// [`SourceError`] when the host is gone or the span has ended.
    pub fn set_errors(&self, errors: Option<Vec<String>>) -> Result<(), SourceError> {
        self.host()?
            .set_source_errors(&self.name, self.generation, errors)
    }

    /// Subscribe to `kind` changes of this source.
    ///
    /// # Errors
    ///
    /// [`SourceError::HostDropped`] when the host is gone.
    pub fn listen(
        &self,
        kind: EventKind,
        callback: impl Fn(&SourceState) + 'static,
    ) -> Result<ListenerHandle, SourceError> {
        let host = self.host()?;
        Ok(host.listen(
            kind,
            move |snapshot| {
                if let Some(state) = snapshot.source() {
                    callback(state);
                }
            },
            Some(&self.name),
        ))
    }

    /// A write path whose pending debounced write is cancelled when the
    /// writer is released.
    #[must_use]
    pub fn writer(&self) -> SourceWriter {
        let id = self.host.upgrade().map_or(0, |host| host.next_writer_id());
        SourceWriter {
            actions: self.clone(),
            id,
            released: Cell::new(false),
        }
    }

    fn host(&self) -> Result<Host, SourceError> {
        self.host.upgrade().ok_or(SourceError::HostDropped)
    }
}

impl fmt::Debug for SourceActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceActions")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish()
    }
}

// ─── SourceWriter ────────────────────────────────────────────────────────────

/// Write path owned by one field controller.
///
/// Releasing the writer cancels the debounced write it scheduled, if that
/// write is still the pending one for the source. Dropping releases.
#[must_use = "dropping the writer cancels its pending write"]
pub struct SourceWriter {
    actions: SourceActions,
    id: WriterId,
    released: Cell<bool>,
}

impl SourceWriter {
    /// Commit a user edit through this writer.
    ///
    /// # Errors
    ///
    /// [`SourceError::Released`] after the writer was released, or when the
    /// span has ended; [`SourceError::HostDropped`] when the host is gone.
    pub fn write(&self, value: impl Into<Value>) -> Result<(), SourceError> {
        if self.released.get() {
            return Err(SourceError::Released {
                name: self.actions.name().to_owned(),
            });
        }
        self.actions.host()?.commit(
            &self.actions.name,
            self.actions.generation,
            value.into(),
            Some(self.id),
        )
    }

    #[must_use]
    pub fn actions(&self) -> &SourceActions {
        &self.actions
    }

    /// Only the first call has an effect.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        if let Some(host) = self.actions.host.upgrade() {
            host.cancel_pending_from(&self.actions.name, self.id);
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

impl Drop for SourceWriter {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SourceWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceWriter")
            .field("source", &self.actions.name())
            .field("id", &self.id)
            .field("released", &self.released.get())
            .finish()
    }
}

// ─── ListenerHandle ──────────────────────────────────────────────────────────

/// Release handle of one subscription.
///
/// `release()` may be called any number of times; only the first call has an
/// effect. Dropping the handle releases it.
#[must_use = "dropping the handle unsubscribes the listener"]
pub struct ListenerHandle {
    host: Weak<HostInner>,
    id: u64,
    released: Cell<bool>,
}

impl ListenerHandle {
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        if let Some(inner) = self.host.upgrade() {
            if inner.listeners.borrow_mut().remove(self.id) {
                trace!(listener = self.id, "listener removed");
            } else {
                warn!(listener = self.id, "listener already gone at release");
            }
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("released", &self.released.get())
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Test harness and reference fixtures for formbind.
//!
//! The scenario and property suites under `tests/` drive whole forms through
//! these helpers:
//!
//! - [`Recorder`]: a shared spy that collects whatever a callback receives.
//! - [`type_text`], [`blur`], [`press_enter`]: user input on an [`Input`].
//! - [`DeferredValidator`]: a validator that parks its tickets until the test
//!   resolves them.
//! - [`lab_form`] and [`advance`]: forms on a [`LabClock`], with debounce
//!   timers driven by hand.
//! - [`state_json`]: a JSON view of an aggregate state for golden comparisons.
//! - [`capture_logs`]: records `tracing` events emitted while a closure runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use formbind_core::{Clock, HostErrors, LabClock, NativeEvent, Value, Values};
use formbind_runtime::{Host, HostConfig, HostState, StateSnapshot, ValidationTicket, Validator};
use formbind_widgets::{Form, FormBuilder, Input, Render};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use web_time::Duration;

// ============================================================================
// Recorder
// ============================================================================

/// Shared, append-only record of callback arguments.
///
/// Clones share the same record, so one clone can move into a callback while
/// the test keeps another to inspect it.
pub struct Recorder<T> {
    items: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Clone + 'static> Recorder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.borrow_mut().push(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.items.borrow().last().cloned()
    }

    /// Drain the record.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.borrow_mut())
    }

    /// A callback that records a clone of its argument.
    pub fn sink(&self) -> impl Fn(&T) + use<T> {
        let items = Rc::clone(&self.items);
        move |item: &T| items.borrow_mut().push(item.clone())
    }
}

impl Recorder<StateSnapshot> {
    /// A leaf node that records every state its listener renders.
    #[must_use]
    pub fn render(&self) -> Render {
        let sink = self.sink();
        Render::new(move |state| sink(state))
    }
}

impl<T: fmt::Debug> fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}

// ============================================================================
// User input
// ============================================================================

/// Type `text` into `input` one character at a time, the way a browser
/// reports keystrokes: one change event per prefix. Returns how many of
/// those events committed.
pub fn type_text(input: &Input, text: &str) -> usize {
    let mut typed = String::new();
    let mut commits = 0;
    for ch in text.chars() {
        typed.push(ch);
        if input.handle_event(&NativeEvent::change(typed.clone())) {
            commits += 1;
        }
    }
    commits
}

/// Leave `input`, reporting its current draft. Returns whether it committed.
pub fn blur(input: &Input) -> bool {
    let text = input.draft().to_string();
    input.handle_event(&NativeEvent::blur(text))
}

/// Press Enter in `input`; the returned event shows whether default handling
/// was prevented.
pub fn press_enter(input: &Input) -> NativeEvent {
    let event = NativeEvent::key_down(formbind_core::Key::Enter);
    input.handle_event(&event);
    event
}

// ============================================================================
// Validation
// ============================================================================

/// Validator that never answers on its own.
///
/// Each request parks its ticket; the test resolves them in order with
/// [`DeferredValidator::resolve_next`], standing in for a server round-trip.
#[derive(Clone, Default)]
pub struct DeferredValidator {
    tickets: Rc<RefCell<Vec<ValidationTicket>>>,
    requests: Rc<RefCell<Vec<(Values, Option<String>)>>>,
}

impl DeferredValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests still waiting for an answer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tickets.borrow().len()
    }

    /// Values and scope of every request received, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<(Values, Option<String>)> {
        self.requests.borrow().clone()
    }

    /// Answer the oldest parked request. Returns `false` when none is
    /// waiting.
    pub fn resolve_next(&self, errors: &HostErrors) -> bool {
        let ticket = {
            let mut tickets = self.tickets.borrow_mut();
            if tickets.is_empty() {
                return false;
            }
            tickets.remove(0)
        };
        ticket.resolve(errors);
        true
    }
}

impl Validator for DeferredValidator {
    fn validate(&self, values: &Values, scope: Option<&str>, ticket: ValidationTicket) {
        self.requests
            .borrow_mut()
            .push((values.clone(), scope.map(str::to_owned)));
        self.tickets.borrow_mut().push(ticket);
    }
}

impl fmt::Debug for DeferredValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValidator")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Build a one-source error map.
#[must_use]
pub fn errors_for(name: &str, messages: &[&str]) -> HostErrors {
    let mut errors = HostErrors::new();
    errors.insert(
        name.to_owned(),
        messages.iter().map(|m| (*m).to_owned()).collect(),
    );
    errors
}

/// Build a text-valued [`Values`] map.
#[must_use]
pub fn text_values(pairs: &[(&str, &str)]) -> Values {
    pairs
        .iter()
        .map(|(name, text)| ((*name).to_owned(), Value::text(*text)))
        .collect()
}

// ============================================================================
// Lab clock
// ============================================================================

/// Debounce delay used by [`lab_form`].
pub const LAB_DEBOUNCE: Duration = Duration::from_millis(100);

/// A form builder whose host reads time from a fresh [`LabClock`], with a
/// [`LAB_DEBOUNCE`] default delay.
#[must_use]
pub fn lab_form(name: &str) -> (FormBuilder, LabClock) {
    lab_form_with(name, HostConfig::new())
}

/// Like [`lab_form`], starting from `config`.
#[must_use]
pub fn lab_form_with(name: &str, config: HostConfig) -> (FormBuilder, LabClock) {
    let lab = LabClock::new();
    let builder = Form::builder(name)
        .config(config.default_debounce(LAB_DEBOUNCE))
        .clock(Clock::Lab(lab.clone()));
    (builder, lab)
}

/// Advance `lab` by `ms` and fire the host's due debounce timers. Returns
/// how many writes were applied.
pub fn advance(host: &Host, lab: &LabClock, ms: u64) -> usize {
    lab.advance(Duration::from_millis(ms));
    host.run_due_timers()
}

// ============================================================================
// JSON view
// ============================================================================

/// JSON rendering of an aggregate state:
/// `{"values": {..}, "errors": {..}, "busy": bool, "touched": bool}`.
///
/// # Errors
///
/// Propagates `serde_json` serialization failures.
pub fn state_json(state: &HostState) -> Result<serde_json::Value, serde_json::Error> {
    let mut object = serde_json::Map::new();
    object.insert("values".into(), serde_json::to_value(&state.values)?);
    object.insert("errors".into(), serde_json::to_value(&state.errors)?);
    object.insert("busy".into(), state.busy.into());
    object.insert("touched".into(), state.touched.into());
    Ok(serde_json::Value::Object(object))
}

// ============================================================================
// Log capture
// ============================================================================

/// One `tracing` event seen by [`capture_logs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    /// Other recorded fields as `(name, debug rendering)`.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Debug rendering of field `name`, if recorded.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name().to_owned(), format!("{value:?}")));
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        if let Ok(mut events) = self.events.lock() {
            events.push(CapturedEvent {
                level: *event.metadata().level(),
                message: visitor.message,
                fields: visitor.fields,
            });
        }
    }
}

/// Run `f` with a capturing subscriber installed on this thread. Returns the
/// closure's result and every event emitted meanwhile.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedEvent>) {
    let layer = CaptureLayer::default();
    let events = Arc::clone(&layer.events);
    let subscriber = tracing_subscriber::registry().with(layer);
    let result = tracing::subscriber::with_default(subscriber, f);
    let captured = events
        .lock()
        .map(|mut events| std::mem::take(&mut *events))
        .unwrap_or_default();
    (result, captured)
}

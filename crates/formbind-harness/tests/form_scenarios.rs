#![forbid(unsafe_code)]

//! Integration tests: whole forms driven through native events.

use formbind_core::{NativeEvent, Value, Values};
use formbind_harness::{
    DeferredValidator, Recorder, advance, blur, capture_logs, errors_for, lab_form, press_enter,
    state_json, text_values, type_text,
};
use formbind_runtime::{HostConfig, HostState, StateSnapshot, ValidationTicket, Validator, events};
use formbind_widgets::{
    Element, Form, FormProps, Input, Listener, NodeKind, Select, Textarea, UpdateOn, Updater, When,
};
use tracing::Level;

fn field(name: &str, input: &Input) -> Updater {
    Updater::new(name, Element::new().child(input.clone()))
}

// ============================================================================
// Field commits
// ============================================================================

#[test]
fn blur_mode_email_commits_once() {
    let email = Input::text().update_on(UpdateOn::Blur);
    let mut form = Form::builder("signup")
        .child(field("email", &email).default_value("a@x.com"))
        .build();
    form.mount();
    assert_eq!(email.view().value.as_deref(), Some("a@x.com"));

    let seen = Recorder::<StateSnapshot>::new();
    let _sub = form.listen(events::VALUE, seen.sink(), Some("email"));

    assert_eq!(type_text(&email, "b@x.com"), 0);
    assert!(press_enter(&email).is_default_prevented());
    assert!(seen.is_empty());
    assert_eq!(form.host().snapshot().values["email"], Value::text("a@x.com"));

    assert!(blur(&email));
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen.last().and_then(|s| s.source().map(|s| s.value.clone())),
        Some(Value::text("b@x.com"))
    );
    assert!(form.host().snapshot().touched);
}

#[test]
fn checkbox_group_tracks_membership_in_check_order() {
    let red = Input::checkbox("red").as_array(true);
    let blue = Input::checkbox("blue").as_array(true);
    let mut form = Form::builder("paint")
        .child(field("colors", &red))
        .child(field("colors", &blue))
        .build();
    form.mount();
    assert_eq!(form.host().source_refs("colors"), 2);
    let colors = || form.host().source_state("colors").map(|s| s.value);

    red.handle_event(&NativeEvent::toggle("red", true));
    assert_eq!(colors(), Some(Value::list(["red"])));
    assert_eq!(blue.draft(), Value::list(["red"]));

    blue.handle_event(&NativeEvent::toggle("blue", true));
    assert_eq!(colors(), Some(Value::list(["red", "blue"])));
    assert_eq!(red.view().checked, Some(true));

    red.handle_event(&NativeEvent::toggle("red", false));
    assert_eq!(colors(), Some(Value::list(["blue"])));
    assert_eq!(red.view().checked, Some(false));

    blue.handle_event(&NativeEvent::toggle("blue", false));
    assert_eq!(colors(), Some(Value::Null));
}

#[test]
fn select_and_textarea_share_one_form() {
    let country = Select::new();
    let bio = Textarea::new().width(8);
    let mut form = Form::builder("profile")
        .child(Updater::new("country", Element::new().child(country.clone())))
        .child(Updater::new("bio", Element::new().child(bio.clone())))
        .build();
    form.mount();

    country.handle_event(&NativeEvent::change("no"));
    bio.handle_event(&NativeEvent::change("fjords and more fjords"));
    assert_eq!(bio.height(), 3);

    let json = state_json(&form.host().snapshot()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "values": {"bio": "fjords and more fjords", "country": "no"},
            "errors": {},
            "busy": false,
            "touched": true,
        })
    );

    country.handle_event(&NativeEvent::change(""));
    assert_eq!(form.host().snapshot().values["country"], Value::Null);
}

// ============================================================================
// Debounce
// ============================================================================

#[test]
fn debounced_typing_commits_last_value_once() {
    let query = Input::text();
    let (builder, lab) = lab_form("search");
    let mut form = builder.child(field("q", &query).debounce(true)).build();
    form.mount();
    let seen = Recorder::<StateSnapshot>::new();
    let _sub = form.listen(events::VALUE, seen.sink(), Some("q"));

    type_text(&query, "rust");
    assert!(form.host().has_pending("q"));
    assert_eq!(advance(form.host(), &lab, 50), 0);
    assert!(seen.is_empty());

    assert_eq!(advance(form.host(), &lab, 50), 1);
    assert_eq!(seen.len(), 1);
    assert_eq!(form.host().snapshot().values["q"], Value::text("rust"));
    assert_eq!(query.draft(), Value::text("rust"));
}

#[test]
fn unmounting_a_field_drops_its_pending_write() {
    let query = Input::text();
    let (builder, lab) = lab_form("search");
    let mut form = builder
        .child(field("q", &query).debounce(true))
        .child(Updater::new("q", Element::new()))
        .build();
    form.mount();

    type_text(&query, "x");
    assert!(form.host().has_pending("q"));
    assert!(form.remove_child(0).is_some());

    assert!(form.host().has_source("q"));
    assert!(!form.host().has_pending("q"));
    assert_eq!(advance(form.host(), &lab, 500), 0);
    assert_eq!(form.host().snapshot().values["q"], Value::Null);
}

#[test]
fn submit_flushes_pending_writes_before_validating() {
    let query = Input::text();
    let sent = Recorder::<HostState>::new();
    let sink = sent.sink();
    let (builder, _lab) = lab_form("search");
    let mut form = builder
        .child(field("q", &query).debounce(true))
        .on_send(move |_, state, _| sink(state))
        .build();
    form.mount();

    type_text(&query, "late");
    form.handle_event(&NativeEvent::submit());
    assert_eq!(sent.len(), 1);
    assert_eq!(sent.items()[0].values["q"], Value::text("late"));
    assert!(!form.host().has_pending("q"));
}

// ============================================================================
// Submit / reset
// ============================================================================

#[test]
fn deferred_validation_sends_when_resolved() {
    let email = Input::text();
    let validator = DeferredValidator::new();
    let sent = Recorder::<(String, HostState)>::new();
    let sink = sent.sink();
    let mut form = Form::builder("signup")
        .child(field("email", &email))
        .validator(validator.clone())
        .on_send(move |name, state, _| sink(&(name.to_owned(), state.clone())))
        .build();
    form.mount();

    type_text(&email, "taken@x.com");
    let submit = NativeEvent::submit();
    assert!(form.handle_event(&submit));
    assert!(submit.is_default_prevented());
    assert!(sent.is_empty());
    assert_eq!(validator.pending(), 1);
    assert_eq!(validator.requests()[0].0["email"], Value::text("taken@x.com"));

    assert!(validator.resolve_next(&errors_for("email", &["already registered"])));
    let (name, state) = sent.last().unwrap();
    assert_eq!(name, "signup");
    assert!(!state.is_valid());
    assert_eq!(state.errors["email"], ["already registered"]);
    assert!(form.host().source_state("email").unwrap().has_errors());
}

#[test]
fn on_send_can_clear_the_form() {
    let name = Input::text();
    let mut form = Form::builder("note")
        .child(field("name", &name))
        .on_send(|_, _, clear| clear.clear())
        .build();
    form.mount();
    type_text(&name, "Ann");
    form.handle_event(&NativeEvent::submit());
    assert_eq!(form.host().snapshot().values["name"], Value::Null);
    assert_eq!(name.view().value.as_deref(), Some(""));
}

#[test]
fn reset_restores_values_prop() {
    let city = Input::text();
    let mut form = Form::builder("trip")
        .values(text_values(&[("city", "Oslo")]))
        .child(field("city", &city))
        .build();
    form.mount();
    type_text(&city, "Rome");
    assert_eq!(form.host().snapshot().values["city"], Value::text("Rome"));

    form.handle_event(&NativeEvent::reset());
    assert_eq!(form.host().snapshot().values["city"], Value::text("Oslo"));
    assert_eq!(city.draft(), Value::text("Oslo"));
    assert!(!form.host().snapshot().touched);
}

#[test]
fn explicit_default_beats_values_prop_and_reset_restores_the_prop() {
    let city = Input::text();
    let country = Input::text();
    let mut form = Form::builder("trip")
        .values(text_values(&[("city", "Oslo"), ("country", "Norway")]))
        .child(field("city", &city).default_value("Bergen"))
        .child(field("country", &country))
        .build();
    form.mount();
    assert_eq!(form.host().snapshot().values["city"], Value::text("Bergen"));
    assert_eq!(city.view().value.as_deref(), Some("Bergen"));
    assert_eq!(country.view().value.as_deref(), Some("Norway"));

    type_text(&city, "Rome");
    form.handle_event(&NativeEvent::reset());
    assert_eq!(form.host().snapshot().values["city"], Value::text("Oslo"));
    assert_eq!(city.draft(), Value::text("Oslo"));
    assert_eq!(country.draft(), Value::text("Norway"));
}

// ============================================================================
// Listeners
// ============================================================================

#[test]
fn late_listener_renders_current_aggregate() {
    let mut form = Form::builder("f")
        .child(Updater::new("a", Element::new()).default_value("1"))
        .build();
    form.mount();
    form.set_busy(true, None);

    let seen = Recorder::<StateSnapshot>::new();
    form.push_child(Listener::new(Element::new().child(seen.render())));
    assert_eq!(seen.len(), 1);
    let state = seen.last().unwrap();
    assert!(state.busy());
    assert_eq!(state.value_of("a"), Some(&Value::text("1")));
}

#[test]
fn scoped_listener_sees_only_its_source() {
    let a = Input::text();
    let b = Input::text();
    let seen = Recorder::<StateSnapshot>::new();
    let mut form = Form::builder("f")
        .child(field("a", &a))
        .child(field("b", &b))
        .child(Listener::new(Element::new().child(seen.render())).of("a"))
        .build();
    form.mount();
    assert_eq!(seen.len(), 1);

    type_text(&b, "zz");
    assert_eq!(seen.len(), 1);
    type_text(&a, "y");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen.last().unwrap().value_of("a"), Some(&Value::text("y")));
}

#[test]
fn conditional_field_follows_the_watched_value() {
    let kind = Select::new();
    let company = Input::text();
    let company_field = field("company", &company);
    let is_business =
        |state: &StateSnapshot| state.value_of("kind") == Some(&Value::text("business"));
    let mut form = Form::builder("account")
        .child(Updater::new("kind", Element::new().child(kind.clone())))
        .child(Listener::new(When::new(is_business, company_field)))
        .build();
    form.mount();
    assert!(!form.host().has_source("company"));

    kind.handle_event(&NativeEvent::change("business"));
    assert!(form.host().has_source("company"));
    assert!(company.is_bound());
    type_text(&company, "ACME");
    assert_eq!(form.host().snapshot().values["company"], Value::text("ACME"));

    kind.handle_event(&NativeEvent::change("personal"));
    assert!(!form.host().has_source("company"));
    assert!(!company.is_bound());
    assert!(!form.host().snapshot().values.contains_key("company"));
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn shared_slot_lives_until_last_updater_leaves() {
    let mut form = Form::builder("f")
        .child(Updater::new("tags", Element::new()))
        .child(Updater::new("tags", Element::new()))
        .build();
    form.mount();
    assert_eq!(form.host().source_refs("tags"), 2);
    assert_eq!(form.host().source_count(), 1);

    form.remove_child(0);
    assert!(form.host().has_source("tags"));
    assert_eq!(form.host().source_refs("tags"), 1);
    form.remove_child(0);
    assert!(!form.host().has_source("tags"));
}

#[test]
fn remounted_field_keeps_retained_value_over_its_default() {
    let nick = Input::text();
    let mut form = Form::builder("f")
        .config(HostConfig::new().retain_removed_values(true))
        .build();
    form.mount();

    form.push_child(field("nick", &nick).default_value("anon"));
    assert_eq!(form.host().snapshot().values["nick"], Value::text("anon"));
    type_text(&nick, "bob");
    form.remove_child(0);

    let again = Input::text();
    form.push_child(field("nick", &again).default_value("anon"));
    assert_eq!(form.host().snapshot().values["nick"], Value::text("bob"));
    assert_eq!(again.draft(), Value::text("bob"));

    // A bulk init still falls back to the registration default.
    form.host().init(None);
    assert_eq!(form.host().snapshot().values["nick"], Value::text("anon"));
}

#[test]
fn adapters_reject_adapter_children() {
    let err = Updater::try_new("a", Updater::new("b", Element::new())).unwrap_err();
    assert_eq!(err.parent, NodeKind::Updater);
    assert_eq!(err.child, NodeKind::Updater);
    assert_eq!(
        err.to_string(),
        "Updater cannot be the direct child of Updater; wrap it in an Element"
    );
    assert!(Listener::try_new(Element::new()).is_ok());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "cannot be the direct child of Listener")]
fn listener_over_updater_panics_in_debug() {
    let _ = Listener::new(Updater::new("a", Element::new()));
}

// ============================================================================
// Props
// ============================================================================

#[test]
fn props_are_diffed_by_identity() {
    let mut form = Form::builder("f")
        .child(Updater::new("a", Element::new()))
        .build();
    form.mount();
    let errors = Recorder::<StateSnapshot>::new();
    let _sub = form.listen(events::ERRORS, errors.sink(), None);

    let with_errors = FormProps::default().errors(errors_for("a", &["bad"]));
    form.set_props(with_errors.clone());
    assert_eq!(errors.len(), 1);

    // Same Rc, nothing to do.
    form.set_props(with_errors);
    assert_eq!(errors.len(), 1);

    form.set_props(FormProps::default().errors(errors_for("a", &["worse"])));
    assert_eq!(errors.len(), 2);
    assert_eq!(form.render_count(), 1);
}

#[test]
fn values_prop_change_reaches_fields() {
    let a = Input::text();
    let mut form = Form::builder("f").child(field("a", &a)).build();
    form.mount();
    let mut values = Values::new();
    values.insert("a".into(), Value::text("pushed"));
    let next = form.props().clone().values(values);
    form.set_props(next);
    assert_eq!(a.draft(), Value::text("pushed"));
    assert_eq!(form.default_value("a", Value::Null), Value::text("pushed"));
}

// ============================================================================
// Logging
// ============================================================================

struct Forgetful;

impl Validator for Forgetful {
    fn validate(&self, _values: &Values, _scope: Option<&str>, ticket: ValidationTicket) {
        drop(ticket);
    }
}

#[test]
fn abandoned_validation_is_reported() {
    let sent = Recorder::<HostState>::new();
    let sink = sent.sink();
    let mut form = Form::builder("f")
        .validator(Forgetful)
        .on_send(move |_, state, _| sink(state))
        .build();
    form.mount();

    let (_, logs) = capture_logs(|| form.handle_event(&NativeEvent::submit()));
    assert!(sent.is_empty());
    assert!(logs.iter().any(|event| event.level == Level::WARN
        && event.message == "validation ticket dropped without resolution"));
}

#[test]
fn updater_outside_a_form_warns_and_stays_inert() {
    use formbind_widgets::{MountScope, Node};

    let mut orphan = Updater::new("lost", Element::new());
    let ((), logs) = capture_logs(|| orphan.mount(&MountScope::new()));
    assert!(!orphan.is_mounted());
    assert!(logs.iter().any(|event| event.level == Level::WARN
        && event.message == "updater mounted outside a form"
        && event.field("source") == Some("lost")));
}

#[test]
fn source_lifecycle_is_logged() {
    let mut form = Form::builder("f").build();
    form.mount();
    let (_, logs) = capture_logs(|| {
        form.push_child(Updater::new("a", Element::new()));
        form.remove_child(0)
    });
    let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.contains(&"source registered"));
    assert!(messages.contains(&"source removed"));
}

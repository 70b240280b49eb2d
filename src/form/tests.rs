use super::*;
use futures::StreamExt;
use futures::executor::block_on;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::overlay::{ElementId, MemoryDocument, OverlayCall, RecordingOverlays};

type Controller = ValidationController<MemoryForm, MemoryDocument, RecordingOverlays>;

struct Harness {
    form: MemoryForm,
    document: MemoryDocument,
    overlays: RecordingOverlays,
    controller: Controller,
}

impl Harness {
    fn new(fields: &[(&str, FieldValue)], options: ValidationOptions) -> Self {
        let form = fields
            .iter()
            .fold(MemoryForm::new(), |form, (name, value)| {
                form.with_control(*name, value.clone())
            });
        let document = MemoryDocument::new();
        let overlays = RecordingOverlays::new();
        let controller = ValidationController::new(
            Arc::new(form.clone()),
            Arc::new(document.clone()),
            overlays.clone(),
            options,
        );
        let names = fields.iter().map(|(name, _)| *name).collect::<Vec<_>>();
        document.mount_form(controller.form_id(), &names);
        Self {
            form,
            document,
            overlays,
            controller,
        }
    }

    fn element(&self, name: &str) -> ElementId {
        self.document
            .element_named(self.controller.form_id(), name)
            .expect("mounted input")
    }

    fn configure(&self, requirements: Requirements) -> ConfigureReport {
        self.controller.configure(requirements).expect("configure")
    }

    /// Lifts the gate and runs one pass, as the driver does after each guard window.
    fn pass(&self) -> ValidationResults {
        self.controller.rearm().expect("rearm");
        match self.controller.handle_change().expect("pass") {
            PassOutcome::Evaluated(results) => results,
            PassOutcome::Ignored => panic!("pass was ignored"),
        }
    }
}

fn visible(results: &[ValidationResult]) -> Vec<&ValidationResult> {
    results.iter().filter(|result| result.is_visible()).collect()
}

#[test]
fn range_rule_round_trip_produces_field_qualified_message() {
    let harness = Harness::new(&[("a", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field("a", [rules::between(1, 10)]));

    harness.form.input("a", 5);
    assert!(harness.pass().is_empty());

    harness.form.input("a", 20);
    let results = harness.pass();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].field, FieldKey::new("a"));
    assert_eq!(results[0].message, "A must be between 1 and 10");
    assert!(results[0].is_visible());
}

#[test]
fn pristine_failures_stay_hidden_until_the_field_is_dirty() {
    let harness = Harness::new(&[("email", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field(
        "email",
        [
            rules::required().show_when_pristine(false),
            rules::email().with_id(RuleId::custom("email-format")),
        ],
    ));

    let results = harness.pass();
    assert_eq!(results.len(), 1);
    assert!(visible(&results).is_empty());

    harness.form.mark_dirty("email");
    harness.form.input("email", "bad");
    let results = harness.pass();
    let shown = visible(&results);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].rule.id(), &RuleId::custom("email-format"));
    assert_eq!(shown[0].rule.id().as_str(), "email-format");
    assert_eq!(shown[0].message, "Email is invalid");
}

#[test]
fn custom_template_replaces_every_value_placeholder() {
    let harness = Harness::new(&[("code", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field(
        "code",
        [rules::max_length(2).message("<value> is too long, shorten <value>")],
    ));

    harness.form.input("code", "abc");
    let results = harness.pass();
    assert_eq!(results[0].message, "abc is too long, shorten abc");
}

#[test]
fn changes_inside_the_guard_window_are_ignored() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field("name", [rules::required()]));

    assert!(harness.controller.is_armed().expect("gate"));
    assert!(matches!(
        harness.controller.handle_change().expect("first pass"),
        PassOutcome::Evaluated(_)
    ));
    assert!(!harness.controller.is_armed().expect("gate"));

    harness.form.input("name", "x");
    assert!(matches!(
        harness.controller.handle_change().expect("inside window"),
        PassOutcome::Ignored
    ));
    assert_eq!(harness.controller.pass_count().expect("passes"), 1);

    harness.controller.rearm().expect("rearm");
    assert!(harness.controller.handle_change().expect("rearmed").results().is_some());
    assert_eq!(harness.controller.pass_count().expect("passes"), 2);
}

#[test]
fn always_reevaluated_rule_forces_a_whole_form_recompute() {
    let harness = Harness::new(
        &[("password", FieldValue::Empty), ("confirm", FieldValue::Empty)],
        ValidationOptions::default(),
    );
    harness.configure(
        Requirements::new()
            .field("password", [rules::required()])
            .field("confirm", [rules::same_as("password")]),
    );
    let before = harness.form.recompute_all_count();

    harness.form.input("password", "secret");
    let results = harness.pass();

    assert_eq!(harness.form.recompute_all_count(), before + 1);
    let confirm = results
        .iter()
        .find(|result| result.field.as_str() == "confirm")
        .expect("confirm failure");
    assert_eq!(confirm.rule.id(), &RuleId::custom("same-as"));
    assert!(!confirm.is_visible());
}

#[test]
fn passes_without_cross_field_rules_leave_the_form_alone() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field("name", [rules::required()]));
    let before = harness.form.recompute_all_count();

    harness.pass();
    assert_eq!(harness.form.recompute_all_count(), before);
}

#[test]
fn fields_without_registered_rules_are_excluded() {
    let harness = Harness::new(
        &[("name", FieldValue::Empty), ("nickname", FieldValue::Empty)],
        ValidationOptions::default(),
    );
    harness.configure(Requirements::new().field("name", [rules::required()]));
    harness.form.set_validator(
        "nickname",
        Some(CompositeValidator::new(vec![rules::required()])),
    );
    harness.form.recompute("nickname");
    assert!(!harness.form.errors("nickname").is_empty());

    let results = harness.pass();
    assert!(results.iter().all(|result| result.field.as_str() == "name"));
    let nickname = harness.element("nickname");
    assert_eq!(harness.overlays.view(nickname), None);
    assert!(harness.document.classes(nickname).is_empty());
}

#[test]
fn overlay_starts_disabled_for_pristine_empty_fields() {
    let harness = Harness::new(
        &[
            ("name", FieldValue::Empty),
            ("code", FieldValue::from("x")),
            ("terms", FieldValue::Empty),
        ],
        ValidationOptions::default(),
    );
    harness.configure(
        Requirements::new()
            .field("name", [rules::required()])
            .field("code", [rules::min_length(3)])
            .field("terms", [rules::required_true().show_when_pristine(true)]),
    );

    let name = harness.element("name");
    assert_eq!(
        harness.overlays.calls_for(name),
        vec![OverlayCall::Created(name), OverlayCall::Disabled(name)]
    );
    let code = harness.element("code");
    assert_eq!(harness.overlays.calls_for(code), vec![OverlayCall::Created(code)]);
    assert!(harness.form.is_dirty("code"));
    assert!(harness.form.is_dirty("terms"));
    assert!(!harness.form.is_dirty("name"));
}

#[test]
fn unchecked_flag_is_not_seeded_dirty() {
    let harness = Harness::new(
        &[("terms", FieldValue::Flag(false))],
        ValidationOptions::default(),
    );
    harness.configure(Requirements::new().field("terms", [rules::required_true()]));

    let terms = harness.element("terms");
    assert!(!harness.form.is_dirty("terms"));
    assert_eq!(
        harness.overlays.calls_for(terms),
        vec![OverlayCall::Created(terms), OverlayCall::Disabled(terms)]
    );

    let results = harness.pass();
    assert_eq!(results.len(), 1);
    assert!(visible(&results).is_empty());
    assert!(!harness.document.classes(terms).contains("validation-error"));

    harness.form.input("terms", false);
    assert_eq!(visible(&harness.pass()).len(), 1);
}

#[test]
fn repeated_syncs_with_unchanged_failures_are_idempotent() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(
        Requirements::new().field("name", [rules::required().show_when_pristine(true)]),
    );
    let name = harness.element("name");

    harness.pass();
    let calls = harness.overlays.calls().len();
    assert_eq!(harness.document.class_writes(), 1);
    assert!(harness.document.classes(name).contains("validation-error"));
    assert_eq!(
        harness.overlays.view(name).and_then(|view| view.content),
        Some("Name is required".to_string())
    );

    harness.pass();
    harness.pass();
    assert_eq!(harness.overlays.calls().len(), calls);
    assert_eq!(harness.document.class_writes(), 1);

    harness.form.input("name", "ok");
    harness.pass();
    assert_eq!(harness.document.class_writes(), 2);
    assert!(harness.document.classes(name).is_empty());
    assert_eq!(harness.overlays.view(name).map(|view| view.enabled), Some(false));
}

#[test]
fn engaged_pointer_shows_the_overlay_once_per_new_content() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field("name", [rules::required()]));
    let name = harness.element("name");
    harness.document.hover(Some(name));

    harness.form.input("name", "");
    harness.pass();
    assert_eq!(harness.overlays.view(name).map(|view| view.shown), Some(0));

    harness.document.focus(Some(name));
    harness.form.input("name", "x");
    harness.pass();
    harness.form.input("name", "");
    harness.pass();
    harness.pass();

    let view = harness.overlays.view(name).expect("overlay");
    assert!(view.enabled);
    assert_eq!(view.shown, 1);
}

#[test]
fn several_messages_render_as_plain_lines_without_html() {
    let options = ValidationOptions::from_json_str(r#"{"overlay": {"allowHtmlContent": false}}"#)
        .expect("options");
    let harness = Harness::new(&[("name", FieldValue::Empty)], options);
    harness.configure(Requirements::new().field(
        "name",
        [
            rules::min_length(5),
            rules::pattern("[0-9]+").expect("valid pattern"),
        ],
    ));

    harness.form.input("name", "ab");
    harness.pass();
    assert_eq!(
        harness
            .overlays
            .view(harness.element("name"))
            .and_then(|view| view.content),
        Some(
            "- Name isn't in the right format. The format must be: ^(?:[0-9]+)$\n\
             - Name has a minimum length of 5"
                .to_string()
        )
    );
}

#[test]
fn missing_root_still_broadcasts_results() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    harness.document.unmount_form(harness.controller.form_id());
    let mut results = harness.controller.subscribe();
    harness.configure(Requirements::new().field("name", [rules::required()]));

    harness.form.input("name", "");
    let evaluated = harness.pass();
    assert_eq!(evaluated.len(), 1);
    assert_eq!(block_on(results.next()).map(|results| results.len()), Some(1));
    assert_eq!(
        harness.controller.latest_results().map(|results| results.len()),
        Some(1)
    );
    assert!(harness.overlays.calls().is_empty());
}

#[test]
fn disabled_overlays_leave_the_document_untouched() {
    let options = ValidationOptions {
        use_overlays: false,
        ..ValidationOptions::default()
    };
    let harness = Harness::new(&[("name", FieldValue::Empty)], options);
    harness.configure(Requirements::new().field("name", [rules::required()]));

    harness.form.input("name", "");
    assert_eq!(visible(&harness.pass()).len(), 1);
    assert!(harness.overlays.calls().is_empty());
    assert_eq!(harness.document.class_writes(), 0);
}

#[test]
fn reconfigure_detaches_fields_that_lost_their_rules() {
    let harness = Harness::new(
        &[("name", FieldValue::Empty), ("code", FieldValue::from("x"))],
        ValidationOptions::default(),
    );
    harness.configure(
        Requirements::new()
            .field("name", [rules::required()])
            .field("code", [rules::min_length(3)]),
    );
    let code = harness.element("code");
    harness.pass();
    assert!(harness.document.classes(code).contains("validation-error"));

    let report = harness.configure(Requirements::new().field("name", [rules::required()]));
    assert_eq!(report.registered, vec![FieldKey::new("name")]);
    assert!(harness.form.validator("code").is_none());
    assert!(harness.form.errors("code").is_empty());
    assert!(harness.document.classes(code).is_empty());
    assert_eq!(harness.overlays.calls_for(code).last(), Some(&OverlayCall::Disabled(code)));
    assert_eq!(
        harness
            .overlays
            .calls_for(code)
            .iter()
            .filter(|call| matches!(call, OverlayCall::Created(_)))
            .count(),
        1
    );
}

#[test]
fn empty_configuration_arms_without_activating() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    assert!(matches!(
        harness.controller.handle_change().expect("before configure"),
        PassOutcome::Ignored
    ));

    let report = harness.configure(Requirements::new());
    assert!(report.registered.is_empty());
    assert_eq!(harness.controller.mode(), Ok(ControllerMode::Idle));
    assert!(harness.controller.is_armed().expect("gate"));
    assert!(harness.pass().is_empty());
}

#[test]
fn json_requirements_report_skipped_entries() {
    let harness = Harness::new(&[("age", FieldValue::Empty)], ValidationOptions::default());
    let requirements = Requirements::from_json_str(
        r#"{
            "age": [{"id": "between", "min": 1, "max": 10}, {"id": "unknown"}],
            "ghost": [{"id": "required"}]
        }"#,
    )
    .expect("requirements");
    let report = harness.configure(requirements);

    assert_eq!(report.registered, vec![FieldKey::new("age")]);
    assert_eq!(
        report.skipped,
        vec![
            SkippedEntry {
                field: FieldKey::new("age"),
                reason: SkipReason::UnresolvedRule { index: 1 },
            },
            SkippedEntry {
                field: FieldKey::new("ghost"),
                reason: SkipReason::UnknownField,
            },
        ]
    );
    assert_eq!(harness.controller.mode(), Ok(ControllerMode::Active));
}

#[test]
fn teardown_stops_all_processing() {
    let harness = Harness::new(&[("name", FieldValue::Empty)], ValidationOptions::default());
    harness.configure(Requirements::new().field("name", [rules::required()]));
    harness.controller.teardown().expect("teardown");

    assert_eq!(harness.controller.mode(), Ok(ControllerMode::TornDown));
    harness.controller.rearm().expect("rearm");
    assert!(!harness.controller.is_armed().expect("gate"));
    assert!(matches!(
        harness.controller.handle_change().expect("after teardown"),
        PassOutcome::Ignored
    ));
    assert_eq!(
        harness.controller.configure(Requirements::new()).map(|_| ()),
        Err(FormError::TornDown)
    );
    assert!(matches!(
        block_on(harness.controller.run(harness.form.changes())),
        Err(FormError::TornDown)
    ));
}

#[test]
fn driver_debounces_bursts_into_single_passes() {
    let options = ValidationOptions {
        debounce_ms: 30,
        ..ValidationOptions::default()
    };
    let harness = Harness::new(&[("name", FieldValue::Empty)], options);
    let changes = harness.form.changes();
    harness.configure(Requirements::new().field("name", [rules::required()]));

    let driver = {
        let controller = harness.controller.clone();
        thread::spawn(move || block_on(controller.run(changes)))
    };
    thread::sleep(Duration::from_millis(150));
    assert_eq!(harness.controller.pass_count().expect("passes"), 1);

    for value in ["a", "ab", "abc"] {
        harness.form.input("name", value);
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(150));
    assert_eq!(harness.controller.pass_count().expect("passes"), 2);
    assert!(
        harness
            .controller
            .latest_results()
            .is_some_and(|results| results.is_empty())
    );

    harness.controller.teardown().expect("teardown");
    driver
        .join()
        .expect("driver thread joins")
        .expect("driver stops cleanly");
}

#[test]
fn driver_absorbs_recomputes_caused_by_its_own_pass() {
    let options = ValidationOptions {
        debounce_ms: 20,
        ..ValidationOptions::default()
    };
    let harness = Harness::new(
        &[("password", FieldValue::Empty), ("confirm", FieldValue::Empty)],
        options,
    );
    let changes = harness.form.changes();
    harness.configure(
        Requirements::new()
            .field("password", [rules::required()])
            .field("confirm", [rules::same_as("password")]),
    );

    let driver = {
        let controller = harness.controller.clone();
        thread::spawn(move || block_on(controller.run(changes)))
    };
    thread::sleep(Duration::from_millis(150));
    assert_eq!(harness.controller.pass_count().expect("passes"), 1);
    assert!(harness.controller.is_armed().expect("gate"));

    harness.controller.teardown().expect("teardown");
    driver
        .join()
        .expect("driver thread joins")
        .expect("driver stops cleanly");
}

/// Form whose validator attachment is slow, so `configure` spans several driver ticks.
struct SlowForm {
    inner: MemoryForm,
    attach_delay: Duration,
}

impl FormModel for SlowForm {
    fn control_names(&self) -> Vec<FieldKey> {
        self.inner.control_names()
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        self.inner.value(field)
    }

    fn is_dirty(&self, field: &str) -> bool {
        self.inner.is_dirty(field)
    }

    fn mark_dirty(&self, field: &str) {
        self.inner.mark_dirty(field);
    }

    fn set_validator(&self, field: &str, validator: Option<CompositeValidator>) {
        thread::sleep(self.attach_delay);
        self.inner.set_validator(field, validator);
    }

    fn errors(&self, field: &str) -> ErrorMap {
        self.inner.errors(field)
    }

    fn recompute(&self, field: &str) {
        self.inner.recompute(field);
    }

    fn recompute_all(&self) {
        self.inner.recompute_all();
    }
}

#[test]
fn pending_rearm_does_not_reopen_the_gate_during_configure() {
    let inner = MemoryForm::new()
        .with_control("a", FieldValue::Empty)
        .with_control("b", FieldValue::Empty)
        .with_control("c", FieldValue::Empty);
    let changes = inner.changes();
    let controller = ValidationController::new(
        Arc::new(SlowForm {
            inner: inner.clone(),
            attach_delay: Duration::from_millis(80),
        }),
        Arc::new(MemoryDocument::new()),
        RecordingOverlays::new(),
        ValidationOptions {
            debounce_ms: 20,
            use_overlays: false,
            ..ValidationOptions::default()
        },
    );
    controller
        .configure(Requirements::new().field("a", [rules::required()]))
        .expect("configure");

    let driver = {
        let controller = controller.clone();
        thread::spawn(move || block_on(controller.run(changes)))
    };
    thread::sleep(Duration::from_millis(150));
    assert_eq!(controller.pass_count().expect("passes"), 1);

    // The pass for this input schedules a re-arm that fires while configure runs.
    inner.input("a", "x");
    thread::sleep(Duration::from_millis(30));
    let before = controller.pass_count().expect("passes");
    controller
        .configure(
            Requirements::new()
                .field("b", [rules::required()])
                .field("c", [rules::required()]),
        )
        .expect("reconfigure");
    assert_eq!(controller.pass_count().expect("passes"), before);

    thread::sleep(Duration::from_millis(150));
    assert_eq!(controller.pass_count().expect("passes"), before + 1);
    let results = controller.latest_results().expect("results");
    assert!(results.iter().all(|result| result.field != FieldKey::new("a")));
    assert_eq!(results.len(), 2);

    controller.teardown().expect("teardown");
    driver
        .join()
        .expect("driver thread joins")
        .expect("driver stops cleanly");
}

#[derive(FormFields)]
struct SignupForm {
    email: String,
    age: u32,
    newsletter: bool,
}

#[test]
fn derived_fields_seed_a_memory_form() {
    let form = MemoryForm::from_fields(&SignupForm {
        email: "user@example.com".to_string(),
        age: 30,
        newsletter: true,
    });

    assert_eq!(
        form.control_names(),
        vec![
            FieldKey::new("age"),
            FieldKey::new("email"),
            FieldKey::new("newsletter")
        ]
    );
    assert_eq!(form.value("age"), Some(FieldValue::from(30u32)));
    assert_eq!(form.value("newsletter"), Some(FieldValue::Flag(true)));
    assert!(!form.is_dirty("email"));
}

#[test]
fn options_parse_from_json_with_passthrough() {
    let options = ValidationOptions::from_json_str(
        r#"{
            "validationDebounceTime": 25,
            "useOverlays": false,
            "invalidClass": "is-invalid",
            "overlay": {"allowHtmlContent": false, "placement": "top"}
        }"#,
    )
    .expect("options");

    assert_eq!(options.debounce(), Duration::from_millis(25));
    assert!(!options.use_overlays);
    assert_eq!(options.invalid_class, "is-invalid");
    assert!(!options.overlay.allow_html_content);
    assert_eq!(
        options.overlay.passthrough.get("placement"),
        Some(&serde_json::json!("top"))
    );
    assert_eq!(ValidationOptions::from_json_str("{}"), Ok(ValidationOptions::default()));
    assert!(matches!(
        ValidationOptions::from_json_str("42"),
        Err(FormError::InvalidConfig(_))
    ));
}

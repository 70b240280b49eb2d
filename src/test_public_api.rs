use std::sync::Arc;

use crate::prelude::*;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn controller_over_headless_collaborators_is_send_and_sync() {
    assert_send_sync::<ValidationController<MemoryForm, MemoryDocument, RecordingOverlays>>();
    assert_send_sync::<ValidationController<dyn FormModel, MemoryDocument, RecordingOverlays>>();
    assert_send_sync::<ValidationResults>();
}

#[test]
fn prelude_smoke_configures_a_dynamic_form() {
    let form: Arc<dyn FormModel> = Arc::new(MemoryForm::new().with_control("name", ""));
    let controller = ValidationController::new(
        form,
        Arc::new(MemoryDocument::new()),
        RecordingOverlays::new(),
        ValidationOptions::default(),
    );
    let report = controller
        .configure(Requirements::new().field("name", [rules::required()]))
        .expect("configure");

    assert_eq!(report.registered, vec![FieldKey::new("name")]);
    assert_eq!(controller.mode(), Ok(ControllerMode::Active));
}

pub use crate::form::rules;
pub use crate::form::{
    ConfigureReport, ControllerMode, FieldKey, FieldValue, FormError, FormEvent, FormFields,
    FormModel, FormResult, MemoryForm, PassOutcome, Requirements, RuleDescriptor, RuleId,
    RuleSpec, ValidationController, ValidationOptions, ValidationResult, ValidationResults,
};
pub use crate::overlay::{
    Document, ElementId, MemoryDocument, Overlay, OverlayFactory, OverlayOptions,
    RecordingOverlays,
};

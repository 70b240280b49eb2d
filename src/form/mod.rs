mod broadcast;
mod controller;
mod gate;
mod message;
mod model;
mod registry;
mod rule;
pub mod rules;
mod validation;
mod value;

#[cfg(test)]
mod tests;

pub use broadcast::{ResultBroadcast, ValidationResults};
pub use calmform_derive::FormFields;
pub use controller::{
    ConfigureReport, ControllerMode, FieldKey, FormError, FormId, FormResult, PassOutcome,
    ValidationController, ValidationOptions,
};
pub use gate::Gate;
pub use message::{capitalize_field, default_message, humanize_list, resolve_message};
pub use model::{FormEvent, FormFields, FormModel, FormValues, MemoryForm};
pub use registry::{RequirementRegistry, Requirements, RuleSpec, SkipReason, SkippedEntry};
pub use rule::{
    CompositeValidator, ErrorMap, Failure, RuleContext, RuleDescriptor, RuleFn, RuleId,
};
pub use validation::{ValidationEngine, ValidationResult, evaluate};
pub use value::FieldValue;

use std::sync::Arc;

use log::debug;

use super::broadcast::{ResultBroadcast, ValidationResults};
use super::controller::FieldKey;
use super::message::resolve_message;
use super::model::FormModel;
use super::registry::RequirementRegistry;
use super::rule::{Failure, RuleDescriptor};

/// One failed rule on one field, with its rendered message.
#[derive(Clone, Debug)]
pub struct ValidationResult {
    pub field: FieldKey,
    pub rule: RuleDescriptor,
    pub failure: Failure,
    pub message: String,
    pub is_hidden: bool,
}

impl ValidationResult {
    pub fn is_visible(&self) -> bool {
        !self.is_hidden
    }
}

/// Collects the failures of every registered field from the form's current error
/// maps.
///
/// Fields without registered rules are never inspected, and error keys that do not
/// belong to a registered rule (host validators) are ignored. A failure is hidden
/// while its field is pristine unless the rule asks to be shown anyway.
pub fn evaluate<F>(registry: &RequirementRegistry, form: &F) -> Vec<ValidationResult>
where
    F: FormModel + ?Sized,
{
    let mut results = Vec::new();
    for (field, _) in registry.iter() {
        if !form.has_control(field.as_str()) {
            continue;
        }
        let errors = form.errors(field.as_str());
        if errors.is_empty() {
            continue;
        }
        let dirty = form.is_dirty(field.as_str());
        let value = form.value(field.as_str()).unwrap_or_default();
        for (id, failure) in errors {
            let Some(rule) = registry.rule(field.as_str(), &id) else {
                continue;
            };
            let message = resolve_message(field.as_str(), rule, &failure, &value);
            results.push(ValidationResult {
                field: field.clone(),
                rule: rule.clone(),
                failure,
                message,
                is_hidden: !dirty && !rule.is_shown_when_pristine(),
            });
        }
    }
    results
}

/// Runs `evaluate` and publishes each pass to its subscribers.
#[derive(Clone, Default)]
pub struct ValidationEngine {
    broadcast: ResultBroadcast,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run<F>(&self, registry: &RequirementRegistry, form: &F) -> ValidationResults
    where
        F: FormModel + ?Sized,
    {
        let results: ValidationResults = Arc::from(evaluate(registry, form));
        debug!(
            "validation pass over {} field(s) produced {} failure(s)",
            registry.len(),
            results.len()
        );
        self.broadcast.publish(results.clone());
        results
    }

    pub fn broadcast(&self) -> &ResultBroadcast {
        &self.broadcast
    }
}

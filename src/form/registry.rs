use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use log::warn;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::controller::{FieldKey, FormError, FormResult};
use super::rule::{RuleDescriptor, RuleId};
use super::rules;

/// One entry of a field's requirement list, before normalization.
#[derive(Clone, Debug)]
pub enum RuleSpec {
    Descriptor(RuleDescriptor),
    Loose(Value),
}

impl From<RuleDescriptor> for RuleSpec {
    fn from(value: RuleDescriptor) -> Self {
        Self::Descriptor(value)
    }
}

impl From<Value> for RuleSpec {
    fn from(value: Value) -> Self {
        Self::Loose(value)
    }
}

/// Caller-supplied configuration: field name to rule specs.
#[derive(Clone, Debug, Default)]
pub struct Requirements {
    fields: BTreeMap<FieldKey, Vec<RuleSpec>>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<I, S>(mut self, field: impl Into<FieldKey>, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RuleSpec>,
    {
        self.fields
            .entry(field.into())
            .or_default()
            .extend(specs.into_iter().map(Into::into));
        self
    }

    /// Parses `{"field": [{"id": "required"}, ...], ...}`.
    pub fn from_json_str(source: &str) -> FormResult<Self> {
        let value = serde_json::from_str::<Value>(source)
            .map_err(|error| FormError::InvalidConfig(error.to_string()))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> FormResult<Self> {
        let Value::Object(fields) = value else {
            return Err(FormError::InvalidConfig(
                "requirements must be an object keyed by field name".to_string(),
            ));
        };
        let mut requirements = Self::new();
        for (field, specs) in fields {
            let specs = match specs {
                Value::Array(specs) => specs,
                single => vec![single],
            };
            requirements = requirements.field(field.as_str(), specs);
        }
        Ok(requirements)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Why a configuration entry was left out of the registry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    UnknownField,
    UnresolvedRule { index: usize },
    DuplicateIdentity { index: usize, id: RuleId },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedEntry {
    pub field: FieldKey,
    pub reason: SkipReason,
}

/// Normalized rule lists keyed by field. Shared immutably; reconfiguration swaps in a
/// new registry instead of editing this one.
#[derive(Clone, Debug, Default)]
pub struct RequirementRegistry {
    fields: Arc<BTreeMap<FieldKey, Vec<RuleDescriptor>>>,
}

impl RequirementRegistry {
    /// Normalizes every spec into a descriptor. Entries that cannot be used are
    /// skipped and reported; fields left without rules are not registered.
    pub fn build(
        requirements: Requirements,
        has_control: impl Fn(&str) -> bool,
    ) -> (Self, Vec<SkippedEntry>) {
        let mut fields = BTreeMap::new();
        let mut skipped = Vec::new();

        for (field, specs) in requirements.fields {
            if !has_control(field.as_str()) {
                warn!("skipping requirements for `{field}`: the form has no such control");
                skipped.push(SkippedEntry {
                    field,
                    reason: SkipReason::UnknownField,
                });
                continue;
            }

            let mut rules: Vec<RuleDescriptor> = Vec::with_capacity(specs.len());
            for (index, spec) in specs.into_iter().enumerate() {
                let Some(rule) = normalize(spec) else {
                    warn!("skipping rule #{index} of `{field}`: it does not resolve to a rule");
                    skipped.push(SkippedEntry {
                        field: field.clone(),
                        reason: SkipReason::UnresolvedRule { index },
                    });
                    continue;
                };
                if rules.iter().any(|existing| existing.id() == rule.id()) {
                    warn!(
                        "skipping rule #{index} of `{field}`: identity `{}` is already registered",
                        rule.id()
                    );
                    skipped.push(SkippedEntry {
                        field: field.clone(),
                        reason: SkipReason::DuplicateIdentity {
                            index,
                            id: rule.id().clone(),
                        },
                    });
                    continue;
                }
                rules.push(rule);
            }

            if !rules.is_empty() {
                fields.insert(field, rules);
            }
        }

        (
            Self {
                fields: Arc::new(fields),
            },
            skipped,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &[RuleDescriptor])> {
        self.fields
            .iter()
            .map(|(field, rules)| (field, rules.as_slice()))
    }

    pub fn rules(&self, field: &str) -> Option<&[RuleDescriptor]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn rule(&self, field: &str, id: &RuleId) -> Option<&RuleDescriptor> {
        self.rules(field)?.iter().find(|rule| rule.id() == id)
    }

    /// Whether any rule on `field` should be visible before the user touches it.
    pub fn shows_when_pristine(&self, field: &str) -> bool {
        self.rules(field)
            .is_some_and(|rules| rules.iter().any(RuleDescriptor::is_shown_when_pristine))
    }

    /// Fields that must be revalidated on every pass.
    pub fn always_reevaluated(&self) -> Vec<FieldKey> {
        self.iter()
            .filter(|(_, rules)| rules.iter().any(RuleDescriptor::is_always_reevaluated))
            .map(|(field, _)| field.clone())
            .collect()
    }
}

fn normalize(spec: RuleSpec) -> Option<RuleDescriptor> {
    match spec {
        RuleSpec::Descriptor(rule) => Some(rule),
        RuleSpec::Loose(value) => serde_json::from_value::<LooseRule>(value)
            .ok()?
            .into_descriptor(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LooseRule {
    #[serde(alias = "identifier", alias = "rule")]
    id: String,
    message: Option<String>,
    #[serde(default, alias = "showErrorsOnInit", alias = "applyValidationOnInit")]
    show_when_pristine: bool,
    #[serde(default, alias = "alwaysEvaluate")]
    always_reevaluate: bool,
    min: Option<serde_json::Number>,
    max: Option<serde_json::Number>,
    length: Option<usize>,
    pattern: Option<String>,
    values: Option<Vec<Value>>,
    characters: Option<String>,
}

impl LooseRule {
    fn into_descriptor(self) -> Option<RuleDescriptor> {
        let rule = match RuleId::parse(&self.id) {
            RuleId::Required => rules::required(),
            RuleId::RequiredTrue => rules::required_true(),
            RuleId::Pattern => rules::pattern(self.pattern.as_deref()?).ok()?,
            RuleId::Email => rules::email(),
            RuleId::Min => rules::min(decimal(self.min.as_ref()?)?),
            RuleId::Max => rules::max(decimal(self.max.as_ref()?)?),
            RuleId::Between => rules::between(
                decimal(self.min.as_ref()?)?,
                decimal(self.max.as_ref()?)?,
            ),
            RuleId::MinLength => rules::min_length(self.length?),
            RuleId::MaxLength => rules::max_length(self.length?),
            RuleId::RequiredValues => rules::required_values(scalars(self.values.as_deref()?)?),
            RuleId::InvalidValues => rules::invalid_values(scalars(self.values.as_deref()?)?),
            RuleId::InvalidCharacters => rules::invalid_characters(self.characters.as_deref()?),
            RuleId::SqlObjectName => rules::sql_object_name(),
            RuleId::IsInteger => rules::is_integer(),
            RuleId::IsNumeric => rules::is_numeric(),
            RuleId::IsAlphaNumeric => rules::is_alpha_numeric(),
            RuleId::Custom(_) => return None,
        };
        let rule = match self.message {
            Some(message) => rule.message(message),
            None => rule,
        };
        Some(
            rule.show_when_pristine(self.show_when_pristine)
                .always_reevaluate(self.always_reevaluate),
        )
    }
}

fn decimal(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn scalars(values: &[Value]) -> Option<Vec<String>> {
    values
        .iter()
        .map(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        })
        .collect()
}

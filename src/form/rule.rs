use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use rust_decimal::Decimal;

use super::controller::FieldKey;
use super::model::FormValues;
use super::value::FieldValue;

/// Identity of a rule kind.
///
/// Built-in kinds select a default message; `Custom` identities fall back to the
/// generic "is invalid" message unless the rule carries a template.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RuleId {
    Required,
    RequiredTrue,
    Pattern,
    Email,
    Min,
    Max,
    Between,
    MinLength,
    MaxLength,
    RequiredValues,
    InvalidValues,
    InvalidCharacters,
    SqlObjectName,
    IsInteger,
    IsNumeric,
    IsAlphaNumeric,
    Custom(Arc<str>),
}

impl RuleId {
    pub fn custom(name: impl Into<Arc<str>>) -> Self {
        Self::Custom(name.into())
    }

    /// Resolves a rule kind name, ignoring case, `-` and `_`.
    ///
    /// Names that match no built-in kind become `Custom` with the name kept verbatim.
    pub fn parse(name: &str) -> Self {
        let folded = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect::<String>();
        match folded.as_str() {
            "required" => Self::Required,
            "requiredtrue" => Self::RequiredTrue,
            "pattern" => Self::Pattern,
            "email" => Self::Email,
            "min" => Self::Min,
            "max" => Self::Max,
            "between" => Self::Between,
            "minlength" => Self::MinLength,
            "maxlength" => Self::MaxLength,
            "requiredvalues" => Self::RequiredValues,
            "invalidvalues" => Self::InvalidValues,
            "invalidcharacters" => Self::InvalidCharacters,
            "sqlobjectname" => Self::SqlObjectName,
            "isinteger" => Self::IsInteger,
            "isnumeric" => Self::IsNumeric,
            "isalphanumeric" => Self::IsAlphaNumeric,
            _ => Self::Custom(name.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::RequiredTrue => "required-true",
            Self::Pattern => "pattern",
            Self::Email => "email",
            Self::Min => "min",
            Self::Max => "max",
            Self::Between => "between",
            Self::MinLength => "min-length",
            Self::MaxLength => "max-length",
            Self::RequiredValues => "required-values",
            Self::InvalidValues => "invalid-values",
            Self::InvalidCharacters => "invalid-characters",
            Self::SqlObjectName => "sql-object-name",
            Self::IsInteger => "is-integer",
            Self::IsNumeric => "is-numeric",
            Self::IsAlphaNumeric => "is-alpha-numeric",
            Self::Custom(name) => name,
        }
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload describing why a rule failed.
#[derive(Clone, Debug, PartialEq)]
pub enum Failure {
    Missing,
    Pattern {
        required_pattern: String,
        actual: String,
    },
    Range {
        min: Option<Decimal>,
        max: Option<Decimal>,
        actual: Decimal,
    },
    Length {
        required_length: usize,
        actual_length: usize,
    },
    Membership {
        values: Vec<String>,
        actual: String,
    },
    Malformed {
        actual: String,
    },
    Custom(serde_json::Value),
}

/// Per-control error map, ordered by identity so iteration is deterministic.
pub type ErrorMap = BTreeMap<RuleId, Failure>;

/// What a rule sees when it runs: the field under validation and the whole form.
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    field: &'a str,
    value: &'a FieldValue,
    form: &'a FormValues,
}

impl<'a> RuleContext<'a> {
    pub fn new(field: &'a str, value: &'a FieldValue, form: &'a FormValues) -> Self {
        Self { field, value, form }
    }

    pub fn field(&self) -> &'a str {
        self.field
    }

    pub fn value(&self) -> &'a FieldValue {
        self.value
    }

    /// Value of another control in the same form.
    pub fn sibling(&self, field: &str) -> Option<&'a FieldValue> {
        self.form.get(field)
    }
}

pub type RuleFn = Arc<dyn Fn(&RuleContext<'_>) -> Option<Failure> + Send + Sync>;

/// One validation rule: identity, evaluation function, optional message template and
/// its visibility flags.
#[derive(Clone)]
pub struct RuleDescriptor {
    id: RuleId,
    evaluate: RuleFn,
    message: Option<String>,
    show_when_pristine: bool,
    always_reevaluate: bool,
}

impl RuleDescriptor {
    pub fn new(
        id: RuleId,
        evaluate: impl Fn(&RuleContext<'_>) -> Option<Failure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            evaluate: Arc::new(evaluate),
            message: None,
            show_when_pristine: false,
            always_reevaluate: false,
        }
    }

    /// Message template; `<value>` is replaced with the field's current value.
    pub fn message(mut self, template: impl Into<String>) -> Self {
        let template = template.into();
        self.message = (!template.is_empty()).then_some(template);
        self
    }

    pub fn show_when_pristine(mut self, value: bool) -> Self {
        self.show_when_pristine = value;
        self
    }

    pub fn always_reevaluate(mut self, value: bool) -> Self {
        self.always_reevaluate = value;
        self
    }

    /// Same evaluation under a different identity.
    pub fn with_id(mut self, id: RuleId) -> Self {
        self.id = id;
        self
    }

    /// Only evaluates the rule while `condition` holds; otherwise the rule passes.
    pub fn when(
        mut self,
        condition: impl Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        let inner = self.evaluate.clone();
        self.evaluate = Arc::new(move |cx: &RuleContext<'_>| {
            if condition(cx) { inner(cx) } else { None }
        });
        self
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn message_template(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_shown_when_pristine(&self) -> bool {
        self.show_when_pristine
    }

    pub fn is_always_reevaluated(&self) -> bool {
        self.always_reevaluate
    }

    pub fn evaluate(&self, cx: &RuleContext<'_>) -> Option<Failure> {
        (self.evaluate)(cx)
    }
}

impl Debug for RuleDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("id", &self.id)
            .field("message", &self.message)
            .field("show_when_pristine", &self.show_when_pristine)
            .field("always_reevaluate", &self.always_reevaluate)
            .finish_non_exhaustive()
    }
}

/// The concatenated rule set attached to a single control.
#[derive(Clone, Debug, Default)]
pub struct CompositeValidator {
    rules: Arc<[RuleDescriptor]>,
}

impl CompositeValidator {
    pub fn new(rules: impl Into<Arc<[RuleDescriptor]>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &[RuleDescriptor] {
        &self.rules
    }

    /// Runs every rule against `field`; the first failure per identity is kept.
    pub fn validate(&self, field: &FieldKey, form: &FormValues) -> ErrorMap {
        let empty = FieldValue::Empty;
        let value = form.get(field.as_str()).unwrap_or(&empty);
        let cx = RuleContext::new(field.as_str(), value, form);
        let mut errors = ErrorMap::new();
        for rule in self.rules.iter() {
            if let Some(failure) = rule.evaluate(&cx) {
                errors.entry(rule.id().clone()).or_insert(failure);
            }
        }
        errors
    }
}

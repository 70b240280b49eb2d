use rust_decimal::Decimal;

use super::rule::{Failure, RuleDescriptor, RuleId};
use super::value::FieldValue;

const VALUE_PLACEHOLDER: &str = "<value>";

/// Message shown for a failed rule: the rule's own template when it has one,
/// otherwise the default for its identity. `<value>` is substituted in both cases.
pub fn resolve_message(
    field: &str,
    rule: &RuleDescriptor,
    failure: &Failure,
    value: &FieldValue,
) -> String {
    let message = match rule.message_template() {
        Some(template) => template.to_owned(),
        None => default_message(field, rule.id(), failure),
    };
    if message.contains(VALUE_PLACEHOLDER) {
        message.replace(VALUE_PLACEHOLDER, &value.to_string())
    } else {
        message
    }
}

pub fn default_message(field: &str, id: &RuleId, failure: &Failure) -> String {
    let field = capitalize_field(field);
    match (id, failure) {
        (RuleId::Required, _) => format!("{field} is required"),
        (
            RuleId::Pattern,
            Failure::Pattern {
                required_pattern, ..
            },
        ) => format!("{field} isn't in the right format. The format must be: {required_pattern}"),
        (
            RuleId::Between,
            Failure::Range {
                min: Some(min),
                max: Some(max),
                ..
            },
        ) => format!(
            "{field} must be between {} and {}",
            number(*min),
            number(*max)
        ),
        (RuleId::Email, _) => format!("{field} must be a valid e-mail address"),
        (RuleId::Max, Failure::Range { max: Some(max), .. }) => {
            format!("{field} must be lower than or equal to {}", number(*max))
        }
        (RuleId::Min, Failure::Range { min: Some(min), .. }) => {
            format!("{field} must be higher than or equal to {}", number(*min))
        }
        (RuleId::RequiredTrue, _) => format!("{field} must be selected"),
        (
            RuleId::MinLength,
            Failure::Length {
                required_length, ..
            },
        ) => format!("{field} has a minimum length of {required_length}"),
        (
            RuleId::MaxLength,
            Failure::Length {
                required_length, ..
            },
        ) => format!("{field} has a maximum length of {required_length}"),
        (RuleId::RequiredValues, Failure::Membership { values, .. }) => {
            format!("{field} must be {}", humanize_list(values.as_slice()))
        }
        (RuleId::InvalidValues, Failure::Membership { values, .. }) => {
            format!("{field} can't be {}", humanize_list(values.as_slice()))
        }
        (RuleId::InvalidCharacters, Failure::Membership { values, .. }) => {
            format!("{field} can't contain {}", humanize_list(values.as_slice()))
        }
        (RuleId::SqlObjectName, _) => format!("{field} isn't a valid SQL name"),
        (RuleId::IsInteger, _) => format!("{field} must be an integer"),
        (RuleId::IsNumeric, _) => format!("{field} must be a numeric"),
        (RuleId::IsAlphaNumeric, _) => format!("{field} must be a alpha numerical"),
        _ => format!("{field} is invalid"),
    }
}

/// Quotes every value and joins them as `'a', 'b' or 'c'`.
pub fn humanize_list<S: AsRef<str>>(values: &[S]) -> String {
    let quoted = values
        .iter()
        .map(|value| format!("'{}'", value.as_ref()))
        .collect::<Vec<_>>();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    }
}

/// Upper-cases the first character of a field name.
pub fn capitalize_field(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn number(value: Decimal) -> Decimal {
    value.normalize()
}

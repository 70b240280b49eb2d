//! Bundled rules.
//!
//! Every rule here is a pure function of the control's value. Apart from the
//! `required*` family, rules let a blank value through so they can be combined
//! with `required` independently.

use email_address::EmailAddress;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::json;

use super::rule::{Failure, RuleContext, RuleDescriptor, RuleId};
use super::value::FieldValue;

pub fn required() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::Required, |cx| {
        cx.value().is_blank().then_some(Failure::Missing)
    })
}

/// Passes only for a checked flag.
pub fn required_true() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::RequiredTrue, |cx| {
        (cx.value().as_flag() != Some(true)).then_some(Failure::Missing)
    })
}

/// Text must match `expression` in full. The expression is anchored on both ends.
pub fn pattern(expression: &str) -> Result<RuleDescriptor, regex::Error> {
    let anchored = format!("^(?:{expression})$");
    let regex = Regex::new(&anchored)?;
    Ok(RuleDescriptor::new(RuleId::Pattern, move |cx| {
        let actual = non_blank_text(cx)?;
        (!regex.is_match(&actual)).then(|| Failure::Pattern {
            required_pattern: anchored.clone(),
            actual,
        })
    }))
}

pub fn email() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::Email, |cx| {
        let actual = non_blank_text(cx)?;
        (!EmailAddress::is_valid(&actual)).then_some(Failure::Malformed { actual })
    })
}

pub fn min(min: impl Into<Decimal>) -> RuleDescriptor {
    let min = min.into();
    RuleDescriptor::new(RuleId::Min, move |cx| {
        let actual = cx.value().as_number()?;
        (actual < min).then_some(Failure::Range {
            min: Some(min),
            max: None,
            actual,
        })
    })
}

pub fn max(max: impl Into<Decimal>) -> RuleDescriptor {
    let max = max.into();
    RuleDescriptor::new(RuleId::Max, move |cx| {
        let actual = cx.value().as_number()?;
        (actual > max).then_some(Failure::Range {
            min: None,
            max: Some(max),
            actual,
        })
    })
}

/// Inclusive numeric range.
pub fn between(min: impl Into<Decimal>, max: impl Into<Decimal>) -> RuleDescriptor {
    let (min, max) = (min.into(), max.into());
    RuleDescriptor::new(RuleId::Between, move |cx| {
        let actual = cx.value().as_number()?;
        (actual < min || actual > max).then_some(Failure::Range {
            min: Some(min),
            max: Some(max),
            actual,
        })
    })
}

pub fn min_length(length: usize) -> RuleDescriptor {
    RuleDescriptor::new(RuleId::MinLength, move |cx| {
        let actual_length = non_blank_text(cx)?.chars().count();
        (actual_length < length).then_some(Failure::Length {
            required_length: length,
            actual_length,
        })
    })
}

pub fn max_length(length: usize) -> RuleDescriptor {
    RuleDescriptor::new(RuleId::MaxLength, move |cx| {
        let actual_length = non_blank_text(cx)?.chars().count();
        (actual_length > length).then_some(Failure::Length {
            required_length: length,
            actual_length,
        })
    })
}

/// Value must be one of `values`, compared case-insensitively.
pub fn required_values<I, S>(values: I) -> RuleDescriptor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    required_values_by(values, |text: &str| text.to_string())
}

/// Like `required_values`, but compares `modifier` applied to the control's text.
pub fn required_values_by<I, S, M>(values: I, modifier: M) -> RuleDescriptor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    M: Fn(&str) -> String + Send + Sync + 'static,
{
    let values = values.into_iter().map(Into::into).collect::<Vec<String>>();
    RuleDescriptor::new(RuleId::RequiredValues, move |cx| {
        let actual = modifier(&cx.value().to_string());
        (!contains_folded(&values, &actual)).then(|| Failure::Membership {
            values: values.clone(),
            actual,
        })
    })
}

/// Value must not be any of `values`, compared case-insensitively.
pub fn invalid_values<I, S>(values: I) -> RuleDescriptor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    invalid_values_by(values, |text: &str| text.to_string())
}

/// Like `invalid_values`, but compares `modifier` applied to the control's text.
pub fn invalid_values_by<I, S, M>(values: I, modifier: M) -> RuleDescriptor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    M: Fn(&str) -> String + Send + Sync + 'static,
{
    let values = values.into_iter().map(Into::into).collect::<Vec<String>>();
    RuleDescriptor::new(RuleId::InvalidValues, move |cx| {
        let actual = modifier(&cx.value().to_string());
        contains_folded(&values, &actual).then(|| Failure::Membership {
            values: values.clone(),
            actual,
        })
    })
}

/// Text must not contain any character of `characters`, ignoring case.
pub fn invalid_characters(characters: &str) -> RuleDescriptor {
    let listed = characters.chars().map(String::from).collect::<Vec<String>>();
    let folded = characters.to_lowercase().chars().collect::<Vec<char>>();
    RuleDescriptor::new(RuleId::InvalidCharacters, move |cx| {
        let actual = non_blank_text(cx)?;
        actual
            .to_lowercase()
            .chars()
            .any(|c| folded.contains(&c))
            .then(|| Failure::Membership {
                values: listed.clone(),
                actual,
            })
    })
}

/// Identifier usable as a SQL object name: a letter, `_`, `ß` or `#` followed by
/// letters, digits, `ß`, `_`, `@`, `$` or `#`.
pub fn sql_object_name() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::SqlObjectName, |cx| {
        let actual = non_blank_text(cx)?;
        (!is_sql_object_name(&actual)).then_some(Failure::Malformed { actual })
    })
}

/// Digits only.
pub fn is_integer() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::IsInteger, |cx| {
        let actual = non_blank_text(cx)?;
        (!actual.chars().all(|c| c.is_ascii_digit())).then_some(Failure::Malformed { actual })
    })
}

/// Digits with at most one `.` or `,` separator.
pub fn is_numeric() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::IsNumeric, |cx| {
        let actual = non_blank_text(cx)?;
        (!is_plain_numeric(&actual)).then_some(Failure::Malformed { actual })
    })
}

/// ASCII letters and digits only.
pub fn is_alpha_numeric() -> RuleDescriptor {
    RuleDescriptor::new(RuleId::IsAlphaNumeric, |cx| {
        let actual = non_blank_text(cx)?;
        (!actual.chars().all(|c| c.is_ascii_alphanumeric()))
            .then_some(Failure::Malformed { actual })
    })
}

pub fn custom(
    id: impl Into<std::sync::Arc<str>>,
    evaluate: impl Fn(&RuleContext<'_>) -> Option<Failure> + Send + Sync + 'static,
) -> RuleDescriptor {
    RuleDescriptor::new(RuleId::custom(id), evaluate)
}

/// Value must equal the value of `other`. Re-evaluated on every pass because it
/// depends on a second control.
pub fn same_as(other: impl Into<String>) -> RuleDescriptor {
    let other = other.into();
    RuleDescriptor::new(RuleId::custom("same-as"), move |cx| {
        let expected = cx.sibling(&other).cloned().unwrap_or_default();
        (cx.value() != &expected).then(|| Failure::Custom(json!({ "field": other })))
    })
    .always_reevaluate(true)
}

fn non_blank_text(cx: &RuleContext<'_>) -> Option<String> {
    let value = cx.value();
    if value.is_blank() {
        return None;
    }
    match value {
        FieldValue::Text(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn contains_folded(values: &[String], actual: &str) -> bool {
    let actual = actual.to_lowercase();
    values.iter().any(|value| value.to_lowercase() == actual)
}

fn is_sql_object_name(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let leading = |c: char| c.is_ascii_alphabetic() || matches!(c, '_' | 'ß' | '#');
    leading(first) && chars.all(|c| leading(c) || c.is_ascii_digit() || matches!(c, '@' | '$'))
}

fn is_plain_numeric(text: &str) -> bool {
    let mut separators = 0;
    for c in text.chars() {
        match c {
            '0'..='9' => {}
            '.' | ',' => separators += 1,
            _ => return false,
        }
    }
    separators <= 1
}

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::record::{EnrollmentRecord, FieldKind, FieldValue};
use crate::spec::{FieldSpec, Rule, Step, step_spec};

/// Per-field error messages for a single step.
pub type ErrorMap = BTreeMap<crate::record::Field, String>;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

const MIN_PHONE_DIGITS: usize = 7;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    value.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
}

pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

pub fn is_valid_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// Validates every active field of `step`, returning only the failing ones.
pub fn validate_step(step: Step, record: &EnrollmentRecord) -> ErrorMap {
    step_spec(step)
        .fields
        .iter()
        .filter(|spec| spec.is_active(record))
        .filter_map(|spec| check_field(spec, record).map(|message| (spec.field, message)))
        .collect()
}

fn check_field(spec: &FieldSpec, record: &EnrollmentRecord) -> Option<String> {
    let value = record.get(spec.field);
    let filled = match (&value, spec.field.kind()) {
        (FieldValue::Flag(flag), FieldKind::Flag) => *flag,
        (FieldValue::Text(text), _) => is_present(text),
        _ => false,
    };

    if !filled {
        return if spec.required {
            spec.required_message.map(str::to_string)
        } else {
            None
        };
    }

    let text = value.as_text()?;
    let rule = spec.rule?;
    if satisfies(rule, text) {
        None
    } else {
        spec.invalid_message.map(str::to_string)
    }
}

fn satisfies(rule: Rule, text: &str) -> bool {
    match rule {
        Rule::Email => is_valid_email(text.trim()),
        Rule::Phone => is_valid_phone(text),
        Rule::Date => is_valid_date(text),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub step: Step,
    pub field: crate::record::Field,
    pub message: String,
}

/// Outcome of validating every input step at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub consent_satisfied: bool,
}

pub fn validate_record(record: &EnrollmentRecord) -> ValidationReport {
    let errors: Vec<FieldError> = Step::ALL
        .iter()
        .flat_map(|step| {
            validate_step(*step, record)
                .into_iter()
                .map(|(field, message)| FieldError {
                    step: *step,
                    field,
                    message,
                })
        })
        .collect();
    let consent_satisfied = record.consent_satisfied();

    ValidationReport {
        valid: errors.is_empty() && consent_satisfied,
        errors,
        consent_satisfied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_requires_dot_in_domain() {
        assert!(!is_valid_email("a@b"));
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@b."));
    }

    #[test]
    fn phone_counts_digits_only() {
        assert!(!is_valid_phone("555-123"));
        assert!(is_valid_phone("555-1234"));
        assert!(is_valid_phone("(555) 123 4567"));
        assert!(!is_valid_phone("phone"));
    }

    #[test]
    fn required_text_ignores_whitespace() {
        assert!(!is_present("   "));
        assert!(is_present(" x "));
    }

    #[test]
    fn dates_must_exist_on_the_calendar() {
        assert!(is_valid_date("2013-10-18"));
        assert!(is_valid_date("10/18/2013"));
        assert!(!is_valid_date("2013-02-30"));
        assert!(!is_valid_date("yesterday"));
        assert!(!is_valid_date(""));
    }
}

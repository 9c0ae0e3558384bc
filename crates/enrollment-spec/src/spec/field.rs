use serde::Serialize;

use crate::record::{EnrollmentRecord, Field};

/// Format rule applied to a non-empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Email,
    Phone,
    Date,
}

/// Gate deciding whether a field takes part in validation at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    SecondaryGuardianPresent,
    ConsentRequired,
}

impl Condition {
    pub fn holds(&self, record: &EnrollmentRecord) -> bool {
        match self {
            Condition::SecondaryGuardianPresent => record.has_secondary_guardian,
            Condition::ConsentRequired => record.parental_consent_required,
        }
    }
}

/// Declares how a single field is labelled and validated within its step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub field: Field,
    pub label: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<&'static [&'static str]>,
}

impl FieldSpec {
    pub fn required(field: Field, label: &'static str, message: &'static str) -> Self {
        Self {
            field,
            label,
            required: true,
            required_message: Some(message),
            rule: None,
            invalid_message: None,
            when: None,
            choices: None,
        }
    }

    pub fn optional(field: Field, label: &'static str) -> Self {
        Self {
            field,
            label,
            required: false,
            required_message: None,
            rule: None,
            invalid_message: None,
            when: None,
            choices: None,
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Rule, message: &'static str) -> Self {
        self.rule = Some(rule);
        self.invalid_message = Some(message);
        self
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = Some(choices);
        self
    }

    /// Whether the field is shown and validated for the given record.
    pub fn is_active(&self, record: &EnrollmentRecord) -> bool {
        self.when.is_none_or(|condition| condition.holds(record))
    }
}

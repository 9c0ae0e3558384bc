use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::consent;
use crate::validate::parse_date;

/// Every user-facing field of the enrollment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    StudentFirstName,
    StudentMiddleName,
    StudentLastName,
    StudentPreferredNickname,
    StudentDateOfBirth,
    StudentGrade,
    StudentAlternateEmail,
    PrimaryGuardianFirstName,
    PrimaryGuardianMiddleName,
    PrimaryGuardianLastName,
    PrimaryGuardianRelationship,
    PrimaryGuardianEmail,
    PrimaryGuardianAlternateEmail,
    PrimaryGuardianPhone,
    HasSecondaryGuardian,
    SecondaryGuardianFirstName,
    SecondaryGuardianLastName,
    SecondaryGuardianRelationship,
    SecondaryGuardianEmail,
    SecondaryGuardianPhone,
    StreetAddress,
    City,
    State,
    PostalCode,
    SecondaryPhoneNumber,
    LinkedinProfile,
    ContactAlternateEmail,
    EmergencyContactName,
    EmergencyContactPhone,
    EmergencyContactRelationship,
    ParentalConsentRequired,
    ParentalConsentGiven,
}

/// Whether a field carries text or a boolean flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Flag,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => f.write_str("text"),
            FieldKind::Flag => f.write_str("boolean"),
        }
    }
}

impl Field {
    pub const ALL: [Field; 32] = [
        Field::StudentFirstName,
        Field::StudentMiddleName,
        Field::StudentLastName,
        Field::StudentPreferredNickname,
        Field::StudentDateOfBirth,
        Field::StudentGrade,
        Field::StudentAlternateEmail,
        Field::PrimaryGuardianFirstName,
        Field::PrimaryGuardianMiddleName,
        Field::PrimaryGuardianLastName,
        Field::PrimaryGuardianRelationship,
        Field::PrimaryGuardianEmail,
        Field::PrimaryGuardianAlternateEmail,
        Field::PrimaryGuardianPhone,
        Field::HasSecondaryGuardian,
        Field::SecondaryGuardianFirstName,
        Field::SecondaryGuardianLastName,
        Field::SecondaryGuardianRelationship,
        Field::SecondaryGuardianEmail,
        Field::SecondaryGuardianPhone,
        Field::StreetAddress,
        Field::City,
        Field::State,
        Field::PostalCode,
        Field::SecondaryPhoneNumber,
        Field::LinkedinProfile,
        Field::ContactAlternateEmail,
        Field::EmergencyContactName,
        Field::EmergencyContactPhone,
        Field::EmergencyContactRelationship,
        Field::ParentalConsentRequired,
        Field::ParentalConsentGiven,
    ];

    /// The five columns that only persist when a secondary guardian is present.
    pub const SECONDARY_GUARDIAN: [Field; 5] = [
        Field::SecondaryGuardianFirstName,
        Field::SecondaryGuardianLastName,
        Field::SecondaryGuardianRelationship,
        Field::SecondaryGuardianEmail,
        Field::SecondaryGuardianPhone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::StudentFirstName => "student_first_name",
            Field::StudentMiddleName => "student_middle_name",
            Field::StudentLastName => "student_last_name",
            Field::StudentPreferredNickname => "student_preferred_nickname",
            Field::StudentDateOfBirth => "student_date_of_birth",
            Field::StudentGrade => "student_grade",
            Field::StudentAlternateEmail => "student_alternate_email",
            Field::PrimaryGuardianFirstName => "primary_guardian_first_name",
            Field::PrimaryGuardianMiddleName => "primary_guardian_middle_name",
            Field::PrimaryGuardianLastName => "primary_guardian_last_name",
            Field::PrimaryGuardianRelationship => "primary_guardian_relationship",
            Field::PrimaryGuardianEmail => "primary_guardian_email",
            Field::PrimaryGuardianAlternateEmail => "primary_guardian_alternate_email",
            Field::PrimaryGuardianPhone => "primary_guardian_phone",
            Field::HasSecondaryGuardian => "has_secondary_guardian",
            Field::SecondaryGuardianFirstName => "secondary_guardian_first_name",
            Field::SecondaryGuardianLastName => "secondary_guardian_last_name",
            Field::SecondaryGuardianRelationship => "secondary_guardian_relationship",
            Field::SecondaryGuardianEmail => "secondary_guardian_email",
            Field::SecondaryGuardianPhone => "secondary_guardian_phone",
            Field::StreetAddress => "street_address",
            Field::City => "city",
            Field::State => "state",
            Field::PostalCode => "postal_code",
            Field::SecondaryPhoneNumber => "secondary_phone_number",
            Field::LinkedinProfile => "linkedin_profile",
            Field::ContactAlternateEmail => "contact_alternate_email",
            Field::EmergencyContactName => "emergency_contact_name",
            Field::EmergencyContactPhone => "emergency_contact_phone",
            Field::EmergencyContactRelationship => "emergency_contact_relationship",
            Field::ParentalConsentRequired => "parental_consent_required",
            Field::ParentalConsentGiven => "parental_consent_given",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::HasSecondaryGuardian
            | Field::ParentalConsentRequired
            | Field::ParentalConsentGiven => FieldKind::Flag,
            _ => FieldKind::Text,
        }
    }

    /// Derived fields are computed from other fields and cannot be patched.
    pub fn is_derived(&self) -> bool {
        matches!(self, Field::ParentalConsentRequired)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| RecordError::UnknownField(s.to_string()))
    }
}

/// A single field value as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Flag(_) => FieldKind::Flag,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(flag) => Some(*flag),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Flag(true) => f.write_str("yes"),
            FieldValue::Flag(false) => f.write_str("no"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{field}' expects a {expected} value")]
    TypeMismatch { field: Field, expected: FieldKind },
    #[error("field '{0}' is derived and cannot be set directly")]
    DerivedField(Field),
    #[error("answers must be a JSON object")]
    NotAnObject,
    #[error("field '{0}' has an unsupported JSON value")]
    UnsupportedValue(Field),
}

/// Accumulated enrollment data, created empty and mutated step by step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EnrollmentRecord {
    pub student_first_name: String,
    pub student_middle_name: String,
    pub student_last_name: String,
    pub student_preferred_nickname: String,
    /// Calendar date, usually `YYYY-MM-DD`.
    pub student_date_of_birth: String,
    pub student_grade: String,
    pub student_alternate_email: String,

    pub primary_guardian_first_name: String,
    pub primary_guardian_middle_name: String,
    pub primary_guardian_last_name: String,
    pub primary_guardian_relationship: String,
    pub primary_guardian_email: String,
    pub primary_guardian_alternate_email: String,
    pub primary_guardian_phone: String,

    pub has_secondary_guardian: bool,
    pub secondary_guardian_first_name: String,
    pub secondary_guardian_last_name: String,
    pub secondary_guardian_relationship: String,
    pub secondary_guardian_email: String,
    pub secondary_guardian_phone: String,

    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub secondary_phone_number: String,
    pub linkedin_profile: String,
    pub contact_alternate_email: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,

    /// True while the student is younger than the consent age.
    pub parental_consent_required: bool,
    pub parental_consent_given: bool,
}

impl EnrollmentRecord {
    pub fn get(&self, field: Field) -> FieldValue {
        match field.kind() {
            FieldKind::Flag => FieldValue::Flag(self.flag(field).unwrap_or(false)),
            FieldKind::Text => FieldValue::Text(self.text(field).unwrap_or_default().to_string()),
        }
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::StudentFirstName => &self.student_first_name,
            Field::StudentMiddleName => &self.student_middle_name,
            Field::StudentLastName => &self.student_last_name,
            Field::StudentPreferredNickname => &self.student_preferred_nickname,
            Field::StudentDateOfBirth => &self.student_date_of_birth,
            Field::StudentGrade => &self.student_grade,
            Field::StudentAlternateEmail => &self.student_alternate_email,
            Field::PrimaryGuardianFirstName => &self.primary_guardian_first_name,
            Field::PrimaryGuardianMiddleName => &self.primary_guardian_middle_name,
            Field::PrimaryGuardianLastName => &self.primary_guardian_last_name,
            Field::PrimaryGuardianRelationship => &self.primary_guardian_relationship,
            Field::PrimaryGuardianEmail => &self.primary_guardian_email,
            Field::PrimaryGuardianAlternateEmail => &self.primary_guardian_alternate_email,
            Field::PrimaryGuardianPhone => &self.primary_guardian_phone,
            Field::SecondaryGuardianFirstName => &self.secondary_guardian_first_name,
            Field::SecondaryGuardianLastName => &self.secondary_guardian_last_name,
            Field::SecondaryGuardianRelationship => &self.secondary_guardian_relationship,
            Field::SecondaryGuardianEmail => &self.secondary_guardian_email,
            Field::SecondaryGuardianPhone => &self.secondary_guardian_phone,
            Field::StreetAddress => &self.street_address,
            Field::City => &self.city,
            Field::State => &self.state,
            Field::PostalCode => &self.postal_code,
            Field::SecondaryPhoneNumber => &self.secondary_phone_number,
            Field::LinkedinProfile => &self.linkedin_profile,
            Field::ContactAlternateEmail => &self.contact_alternate_email,
            Field::EmergencyContactName => &self.emergency_contact_name,
            Field::EmergencyContactPhone => &self.emergency_contact_phone,
            Field::EmergencyContactRelationship => &self.emergency_contact_relationship,
            Field::HasSecondaryGuardian
            | Field::ParentalConsentRequired
            | Field::ParentalConsentGiven => return None,
        };
        Some(value.as_str())
    }

    pub fn flag(&self, field: Field) -> Option<bool> {
        match field {
            Field::HasSecondaryGuardian => Some(self.has_secondary_guardian),
            Field::ParentalConsentRequired => Some(self.parental_consent_required),
            Field::ParentalConsentGiven => Some(self.parental_consent_given),
            _ => None,
        }
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        let value = match field {
            Field::StudentFirstName => &mut self.student_first_name,
            Field::StudentMiddleName => &mut self.student_middle_name,
            Field::StudentLastName => &mut self.student_last_name,
            Field::StudentPreferredNickname => &mut self.student_preferred_nickname,
            Field::StudentDateOfBirth => &mut self.student_date_of_birth,
            Field::StudentGrade => &mut self.student_grade,
            Field::StudentAlternateEmail => &mut self.student_alternate_email,
            Field::PrimaryGuardianFirstName => &mut self.primary_guardian_first_name,
            Field::PrimaryGuardianMiddleName => &mut self.primary_guardian_middle_name,
            Field::PrimaryGuardianLastName => &mut self.primary_guardian_last_name,
            Field::PrimaryGuardianRelationship => &mut self.primary_guardian_relationship,
            Field::PrimaryGuardianEmail => &mut self.primary_guardian_email,
            Field::PrimaryGuardianAlternateEmail => &mut self.primary_guardian_alternate_email,
            Field::PrimaryGuardianPhone => &mut self.primary_guardian_phone,
            Field::SecondaryGuardianFirstName => &mut self.secondary_guardian_first_name,
            Field::SecondaryGuardianLastName => &mut self.secondary_guardian_last_name,
            Field::SecondaryGuardianRelationship => &mut self.secondary_guardian_relationship,
            Field::SecondaryGuardianEmail => &mut self.secondary_guardian_email,
            Field::SecondaryGuardianPhone => &mut self.secondary_guardian_phone,
            Field::StreetAddress => &mut self.street_address,
            Field::City => &mut self.city,
            Field::State => &mut self.state,
            Field::PostalCode => &mut self.postal_code,
            Field::SecondaryPhoneNumber => &mut self.secondary_phone_number,
            Field::LinkedinProfile => &mut self.linkedin_profile,
            Field::ContactAlternateEmail => &mut self.contact_alternate_email,
            Field::EmergencyContactName => &mut self.emergency_contact_name,
            Field::EmergencyContactPhone => &mut self.emergency_contact_phone,
            Field::EmergencyContactRelationship => &mut self.emergency_contact_relationship,
            Field::HasSecondaryGuardian
            | Field::ParentalConsentRequired
            | Field::ParentalConsentGiven => return None,
        };
        Some(value)
    }

    fn flag_mut(&mut self, field: Field) -> Option<&mut bool> {
        match field {
            Field::HasSecondaryGuardian => Some(&mut self.has_secondary_guardian),
            Field::ParentalConsentRequired => Some(&mut self.parental_consent_required),
            Field::ParentalConsentGiven => Some(&mut self.parental_consent_given),
            _ => None,
        }
    }

    /// Assigns a value, enforcing the field's kind. Derived fields are rejected.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), RecordError> {
        check_assignable(field, &value)?;
        match value {
            FieldValue::Text(text) => {
                if let Some(slot) = self.text_mut(field) {
                    *slot = text;
                }
            }
            FieldValue::Flag(flag) => {
                if let Some(slot) = self.flag_mut(field) {
                    *slot = flag;
                }
            }
        }
        Ok(())
    }

    pub fn date_of_birth(&self) -> Option<NaiveDate> {
        parse_date(&self.student_date_of_birth)
    }

    /// Recomputes the consent flags from the date of birth as of `today`.
    ///
    /// An empty or unparseable birth date clears the requirement but leaves
    /// a previously given consent in place. When consent becomes required it
    /// starts out not given, whatever the flag held before.
    pub fn refresh_consent(&mut self, today: NaiveDate) {
        match self.date_of_birth() {
            Some(birth) => {
                let required = consent::consent_required(birth, today);
                if required && !self.parental_consent_required {
                    self.parental_consent_given = false;
                }
                self.parental_consent_required = required;
                if !required {
                    self.parental_consent_given = true;
                }
            }
            None => self.parental_consent_required = false,
        }
    }

    /// True when submission is not blocked by a missing parental consent.
    pub fn consent_satisfied(&self) -> bool {
        !self.parental_consent_required || self.parental_consent_given
    }
}

fn check_assignable(field: Field, value: &FieldValue) -> Result<(), RecordError> {
    if field.is_derived() {
        return Err(RecordError::DerivedField(field));
    }
    if field.kind() != value.kind() {
        return Err(RecordError::TypeMismatch {
            field,
            expected: field.kind(),
        });
    }
    Ok(())
}

/// A partial set of field updates merged into the record in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordPatch {
    values: BTreeMap<Field, FieldValue>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, field: Field, value: impl Into<String>) -> Self {
        self.values.insert(field, FieldValue::Text(value.into()));
        self
    }

    #[must_use]
    pub fn flag(mut self, field: Field, value: bool) -> Self {
        self.values.insert(field, FieldValue::Flag(value));
        self
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn touches(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.values.iter()
    }

    /// Parses an answers object keyed by field name.
    ///
    /// Strings map to text fields and booleans to flags; `null` clears a text
    /// field. The derived consent-required flag is silently ignored so saved
    /// records can be loaded back.
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        let map = value.as_object().ok_or(RecordError::NotAnObject)?;
        let mut patch = RecordPatch::new();
        for (key, raw) in map {
            let field: Field = key.parse()?;
            if field.is_derived() {
                continue;
            }
            let value = match raw {
                Value::String(text) => FieldValue::Text(text.clone()),
                Value::Bool(flag) => FieldValue::Flag(*flag),
                Value::Null if field.kind() == FieldKind::Text => FieldValue::Text(String::new()),
                _ => return Err(RecordError::UnsupportedValue(field)),
            };
            patch.insert(field, value);
        }
        Ok(patch)
    }

    /// Checks every entry without applying anything.
    pub fn check(&self) -> Result<(), RecordError> {
        self.values
            .iter()
            .try_for_each(|(field, value)| check_assignable(*field, value))
    }

    pub(crate) fn apply(self, record: &mut EnrollmentRecord) -> Result<(), RecordError> {
        self.check()?;
        for (field, value) in self.values {
            record.set(field, value)?;
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::record::Field;
use crate::spec::choices::{EMERGENCY_RELATIONSHIPS, GRADES, GUARDIAN_RELATIONSHIPS, US_STATES};
use crate::spec::field::{Condition, FieldSpec, Rule};

/// The four ordered pages of the enrollment wizard.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    StudentInfo,
    GuardianInfo,
    ContactInfo,
    Confirmation,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::StudentInfo,
        Step::GuardianInfo,
        Step::ContactInfo,
        Step::Confirmation,
    ];

    pub fn index(&self) -> usize {
        match self {
            Step::StudentInfo => 0,
            Step::GuardianInfo => 1,
            Step::ContactInfo => 2,
            Step::Confirmation => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Step::ALL.get(index).copied()
    }

    pub fn next(&self) -> Option<Step> {
        Step::from_index(self.index() + 1)
    }

    pub fn previous(&self) -> Option<Step> {
        self.index().checked_sub(1).and_then(Step::from_index)
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::StudentInfo => "Student Information",
            Step::GuardianInfo => "Guardian Information",
            Step::ContactInfo => "Contact Information",
            Step::Confirmation => "Confirmation",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Step::StudentInfo => "Basic student details",
            Step::GuardianInfo => "Parent/guardian details",
            Step::ContactInfo => "Address and emergency contact",
            Step::Confirmation => "Review and submit",
        }
    }
}

/// Field declarations for one step, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSpec {
    pub step: Step,
    pub fields: Vec<FieldSpec>,
}

impl StepSpec {
    pub fn field(&self, field: Field) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.field == field)
    }
}

const INVALID_EMAIL: &str = "Enter a valid email address";
const INVALID_PHONE: &str = "Enter a valid phone number";

pub fn step_spec(step: Step) -> StepSpec {
    let fields = match step {
        Step::StudentInfo => student_fields(),
        Step::GuardianInfo => guardian_fields(),
        Step::ContactInfo => contact_fields(),
        Step::Confirmation => Vec::new(),
    };
    StepSpec { step, fields }
}

fn student_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required(
            Field::StudentFirstName,
            "First Name",
            "First name is required",
        ),
        FieldSpec::required(Field::StudentLastName, "Last Name", "Last name is required"),
        FieldSpec::optional(Field::StudentMiddleName, "Middle Name"),
        FieldSpec::optional(Field::StudentPreferredNickname, "Preferred Nickname"),
        FieldSpec::required(
            Field::StudentDateOfBirth,
            "Date of Birth",
            "Date of birth is required",
        )
        .with_rule(Rule::Date, "Enter a valid date"),
        FieldSpec::required(Field::StudentGrade, "Grade Level", "Grade level is required")
            .with_choices(GRADES),
        FieldSpec::optional(Field::StudentAlternateEmail, "Student Alternate Email"),
    ]
}

fn guardian_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required(
            Field::PrimaryGuardianFirstName,
            "First Name",
            "First name is required",
        ),
        FieldSpec::optional(Field::PrimaryGuardianMiddleName, "Middle Name"),
        FieldSpec::required(
            Field::PrimaryGuardianLastName,
            "Last Name",
            "Last name is required",
        ),
        FieldSpec::required(
            Field::PrimaryGuardianRelationship,
            "Relationship to Student",
            "Relationship is required",
        )
        .with_choices(GUARDIAN_RELATIONSHIPS),
        FieldSpec::required(
            Field::PrimaryGuardianEmail,
            "Email Address",
            "Email is required",
        )
        .with_rule(Rule::Email, INVALID_EMAIL),
        FieldSpec::optional(Field::PrimaryGuardianAlternateEmail, "Alternate Email"),
        FieldSpec::required(
            Field::PrimaryGuardianPhone,
            "Phone Number",
            "Phone number is required",
        )
        .with_rule(Rule::Phone, INVALID_PHONE),
        FieldSpec::optional(Field::HasSecondaryGuardian, "Add a second parent/guardian"),
        FieldSpec::optional(Field::SecondaryGuardianFirstName, "Second Guardian First Name")
            .when(Condition::SecondaryGuardianPresent),
        FieldSpec::optional(Field::SecondaryGuardianLastName, "Second Guardian Last Name")
            .when(Condition::SecondaryGuardianPresent),
        FieldSpec::optional(
            Field::SecondaryGuardianRelationship,
            "Second Guardian Relationship",
        )
        .when(Condition::SecondaryGuardianPresent)
        .with_choices(GUARDIAN_RELATIONSHIPS),
        FieldSpec::optional(Field::SecondaryGuardianEmail, "Second Guardian Email")
            .when(Condition::SecondaryGuardianPresent)
            .with_rule(Rule::Email, INVALID_EMAIL),
        FieldSpec::optional(Field::SecondaryGuardianPhone, "Second Guardian Phone")
            .when(Condition::SecondaryGuardianPresent)
            .with_rule(Rule::Phone, INVALID_PHONE),
        FieldSpec::required(
            Field::ParentalConsentGiven,
            "I give parental consent for this enrollment",
            "Parental consent is required",
        )
        .when(Condition::ConsentRequired),
    ]
}

fn contact_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required(
            Field::StreetAddress,
            "Street Address",
            "Street address is required",
        ),
        FieldSpec::required(Field::City, "City", "City is required"),
        FieldSpec::required(Field::State, "State", "State is required").with_choices(US_STATES),
        FieldSpec::required(Field::PostalCode, "ZIP Code", "ZIP code is required"),
        FieldSpec::optional(Field::SecondaryPhoneNumber, "Secondary Phone Number"),
        FieldSpec::optional(Field::LinkedinProfile, "LinkedIn Profile"),
        FieldSpec::optional(Field::ContactAlternateEmail, "Alternate Email"),
        FieldSpec::required(
            Field::EmergencyContactName,
            "Emergency Contact Name",
            "Emergency contact name is required",
        ),
        FieldSpec::required(
            Field::EmergencyContactPhone,
            "Emergency Contact Phone",
            "Emergency contact phone is required",
        )
        .with_rule(Rule::Phone, INVALID_PHONE),
        FieldSpec::required(
            Field::EmergencyContactRelationship,
            "Relationship to Student",
            "Relationship is required",
        )
        .with_choices(EMERGENCY_RELATIONSHIPS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_ordered_and_bounded() {
        assert_eq!(Step::StudentInfo.previous(), None);
        assert_eq!(Step::StudentInfo.next(), Some(Step::GuardianInfo));
        assert_eq!(Step::Confirmation.next(), None);
        assert!(Step::Confirmation.is_last());
        assert_eq!(Step::from_index(4), None);
    }

    #[test]
    fn every_field_is_declared_once_except_derived() {
        let declared: Vec<Field> = Step::ALL
            .iter()
            .flat_map(|step| step_spec(*step).fields)
            .map(|spec| spec.field)
            .collect();
        for field in Field::ALL {
            let count = declared.iter().filter(|other| **other == field).count();
            let expected = usize::from(!field.is_derived());
            assert_eq!(count, expected, "{}", field);
        }
    }

    #[test]
    fn confirmation_has_no_fields() {
        assert!(step_spec(Step::Confirmation).fields.is_empty());
    }
}

use serde_json::json;

use enrollment_spec::{
    EnrollmentRecord, Field, Step, insert_schema, record_schema, validate_record, validate_step,
};

fn complete_record() -> EnrollmentRecord {
    serde_json::from_value(json!({
        "student_first_name": "Grace",
        "student_last_name": "Hopper",
        "student_date_of_birth": "2008-12-09",
        "student_grade": "12th Grade",
        "primary_guardian_first_name": "Mary",
        "primary_guardian_last_name": "Murray",
        "primary_guardian_relationship": "Mother",
        "primary_guardian_email": "mary@example.org",
        "primary_guardian_phone": "+1 555 010 2030",
        "street_address": "1 Navy Way",
        "city": "Arlington",
        "state": "Virginia",
        "postal_code": "22201",
        "emergency_contact_name": "Walter Murray",
        "emergency_contact_phone": "555-7788",
        "emergency_contact_relationship": "Uncle",
        "parental_consent_given": true
    }))
    .expect("record")
}

#[test]
fn complete_record_is_valid() {
    let report = validate_record(&complete_record());
    assert!(report.valid, "{:?}", report.errors);
    assert!(report.errors.is_empty());
}

#[test]
fn report_groups_errors_by_step() {
    let mut record = complete_record();
    record.city.clear();
    record.student_grade.clear();
    record.emergency_contact_phone = "555-12".into();

    let report = validate_record(&record);
    assert!(!report.valid);
    let located: Vec<(Step, Field)> = report
        .errors
        .iter()
        .map(|error| (error.step, error.field))
        .collect();
    assert_eq!(
        located,
        vec![
            (Step::StudentInfo, Field::StudentGrade),
            (Step::ContactInfo, Field::City),
            (Step::ContactInfo, Field::EmergencyContactPhone),
        ]
    );
}

#[test]
fn missing_consent_invalidates_report_without_field_errors_elsewhere() {
    let mut record = complete_record();
    record.parental_consent_required = true;
    record.parental_consent_given = false;

    let report = validate_record(&record);
    assert!(!report.valid);
    assert!(!report.consent_satisfied);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].field, Field::ParentalConsentGiven);
}

#[test]
fn unstored_optional_extras_are_never_validated() {
    let mut record = complete_record();
    record.student_alternate_email = "ada-at-home".into();
    record.primary_guardian_alternate_email = "nope".into();
    record.secondary_phone_number = "12".into();
    record.contact_alternate_email = "nope".into();

    let report = validate_record(&record);
    assert!(report.valid, "{:?}", report.errors);
}

#[test]
fn secondary_guardian_phone_is_checked_only_when_filled() {
    let mut record = complete_record();
    record.has_secondary_guardian = true;
    assert!(validate_step(Step::GuardianInfo, &record).is_empty());
    record.secondary_guardian_phone = "12".into();
    let errors = validate_step(Step::GuardianInfo, &record);
    assert_eq!(
        errors.get(&Field::SecondaryGuardianPhone).map(String::as_str),
        Some("Enter a valid phone number")
    );
}

#[test]
fn schemas_describe_record_and_insert() {
    let record = record_schema();
    let properties = record["properties"].as_object().expect("properties");
    assert!(properties.contains_key("student_first_name"));
    assert!(properties.contains_key("has_secondary_guardian"));

    let insert = insert_schema();
    let properties = insert["properties"].as_object().expect("properties");
    assert!(properties.contains_key("application_status"));
    assert!(properties.contains_key("secondary_guardian_email"));
}

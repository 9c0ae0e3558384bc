use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::record::EnrollmentRecord;

/// Review state of a stored application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Other,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Other => "other",
        }
    }
}

/// Insert payload for the `enrollment_applications` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationInsert {
    pub user_id: String,
    pub student_first_name: String,
    pub student_last_name: String,
    pub student_date_of_birth: String,
    pub student_grade: String,
    pub primary_guardian_first_name: String,
    pub primary_guardian_last_name: String,
    pub primary_guardian_relationship: String,
    pub primary_guardian_email: String,
    pub primary_guardian_phone: String,
    pub secondary_guardian_first_name: Option<String>,
    pub secondary_guardian_last_name: Option<String>,
    pub secondary_guardian_relationship: Option<String>,
    pub secondary_guardian_email: Option<String>,
    pub secondary_guardian_phone: Option<String>,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub parental_consent_required: bool,
    pub parental_consent_given: Option<bool>,
    pub application_status: ApplicationStatus,
}

/// A stored application as returned by a table select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRow {
    pub id: String,
    pub user_id: Option<String>,
    pub application_status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub student_first_name: String,
    pub student_last_name: String,
    pub student_date_of_birth: String,
    pub student_grade: String,
    pub primary_guardian_first_name: String,
    pub primary_guardian_last_name: String,
    pub primary_guardian_relationship: String,
    pub primary_guardian_email: String,
    pub primary_guardian_phone: String,
    pub secondary_guardian_first_name: Option<String>,
    pub secondary_guardian_last_name: Option<String>,
    pub secondary_guardian_relationship: Option<String>,
    pub secondary_guardian_email: Option<String>,
    pub secondary_guardian_phone: Option<String>,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub parental_consent_required: bool,
    pub parental_consent_given: Option<bool>,
}

/// Maps the wizard record onto the table columns.
///
/// Secondary guardian columns are `None` unless the presence flag is set,
/// whatever text was entered for them.
pub fn build_insert(record: &EnrollmentRecord, user_id: &str) -> ApplicationInsert {
    let secondary = |value: &String| {
        record
            .has_secondary_guardian
            .then(|| value.clone())
    };

    ApplicationInsert {
        user_id: user_id.to_string(),
        student_first_name: record.student_first_name.clone(),
        student_last_name: record.student_last_name.clone(),
        student_date_of_birth: record.student_date_of_birth.clone(),
        student_grade: record.student_grade.clone(),
        primary_guardian_first_name: record.primary_guardian_first_name.clone(),
        primary_guardian_last_name: record.primary_guardian_last_name.clone(),
        primary_guardian_relationship: record.primary_guardian_relationship.clone(),
        primary_guardian_email: record.primary_guardian_email.clone(),
        primary_guardian_phone: record.primary_guardian_phone.clone(),
        secondary_guardian_first_name: secondary(&record.secondary_guardian_first_name),
        secondary_guardian_last_name: secondary(&record.secondary_guardian_last_name),
        secondary_guardian_relationship: secondary(&record.secondary_guardian_relationship),
        secondary_guardian_email: secondary(&record.secondary_guardian_email),
        secondary_guardian_phone: secondary(&record.secondary_guardian_phone),
        street_address: record.street_address.clone(),
        city: record.city.clone(),
        state: record.state.clone(),
        postal_code: record.postal_code.clone(),
        emergency_contact_name: record.emergency_contact_name.clone(),
        emergency_contact_phone: record.emergency_contact_phone.clone(),
        emergency_contact_relationship: record.emergency_contact_relationship.clone(),
        parental_consent_required: record.parental_consent_required,
        parental_consent_given: Some(record.parental_consent_given),
        application_status: ApplicationStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ApplicationStatus::Pending).expect("json"),
            json!("pending")
        );
    }

    #[test]
    fn unknown_status_deserializes_as_other() {
        let status: ApplicationStatus = serde_json::from_value(json!("waitlisted")).expect("json");
        assert_eq!(status, ApplicationStatus::Other);
    }

    #[test]
    fn secondary_guardian_columns_follow_presence_flag() {
        let mut record = EnrollmentRecord {
            secondary_guardian_first_name: "Sam".into(),
            secondary_guardian_phone: "555-1234".into(),
            ..EnrollmentRecord::default()
        };
        let insert = build_insert(&record, "user-1");
        assert_eq!(insert.secondary_guardian_first_name, None);
        assert_eq!(insert.secondary_guardian_phone, None);

        record.has_secondary_guardian = true;
        let insert = build_insert(&record, "user-1");
        assert_eq!(insert.secondary_guardian_first_name.as_deref(), Some("Sam"));
        assert_eq!(insert.secondary_guardian_last_name.as_deref(), Some(""));
    }
}

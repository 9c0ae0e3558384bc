use chrono::NaiveDate;
use serde_json::{Value, json};

use enrollment_backend::{
    AuthUser, DEFAULT_TABLE, MemoryPersistence, NoticeVariant, Route, SubmissionAdapter,
    SubmitOutcome, load_dashboard,
};
use enrollment_spec::{
    Advance, EnrollmentRecord, Field, RecordPatch, Step, Wizard, build_insert,
};

fn user() -> AuthUser {
    AuthUser {
        id: "user-7".into(),
        email: Some("anne@example.com".into()),
    }
}

fn confirmed_wizard(date_of_birth: &str, consent: bool) -> Wizard {
    let mut wizard = Wizard::with_today(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
    let patch = RecordPatch::from_json(&json!({
        "student_first_name": "Ada",
        "student_last_name": "Lovelace",
        "student_date_of_birth": date_of_birth,
        "student_grade": "6th Grade",
        "primary_guardian_first_name": "Anne",
        "primary_guardian_last_name": "Byron",
        "primary_guardian_relationship": "Mother",
        "primary_guardian_email": "anne@example.com",
        "primary_guardian_phone": "555-1234",
        "parental_consent_given": true,
        "street_address": "1 Main St",
        "city": "Springfield",
        "state": "Illinois",
        "postal_code": "62701",
        "emergency_contact_name": "Mary Somerville",
        "emergency_contact_phone": "555-9876",
        "emergency_contact_relationship": "Grandparent"
    }))
    .unwrap();
    wizard.patch(patch).unwrap();
    while let Advance::Moved(_) = wizard.advance() {}
    assert_eq!(wizard.step(), Step::Confirmation);
    if !consent {
        wizard
            .patch(RecordPatch::new().flag(Field::ParentalConsentGiven, false))
            .unwrap();
    }
    wizard
}

fn stored_row(id: &str, user_id: &str, status: &str, created_at: &str) -> Value {
    let mut row = serde_json::to_value(build_insert(&EnrollmentRecord::default(), user_id)).unwrap();
    let object = row.as_object_mut().unwrap();
    object.insert("id".into(), json!(id));
    object.insert("application_status".into(), json!(status));
    object.insert("created_at".into(), json!(created_at));
    object.insert("updated_at".into(), json!(created_at));
    row
}

#[tokio::test]
async fn submission_stores_pending_row_and_resets_wizard() {
    let adapter = SubmissionAdapter::new(MemoryPersistence::new());
    let mut wizard = confirmed_wizard("2015-06-01", true);

    let outcome = adapter.submit(&mut wizard, Some(&user())).await;
    assert!(outcome.is_submitted());
    assert!(matches!(
        outcome,
        SubmitOutcome::Submitted { route: Route::Dashboard, .. }
    ));
    assert_eq!(outcome.notice().title, "Application Submitted Successfully");

    let rows = adapter.persistence().rows(DEFAULT_TABLE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["application_status"], "pending");
    assert_eq!(rows[0]["user_id"], "user-7");
    assert_eq!(rows[0]["parental_consent_required"], true);
    assert!(rows[0]["secondary_guardian_email"].is_null());

    assert_eq!(wizard.step(), Step::StudentInfo);
    assert_eq!(wizard.record().student_first_name, "");
}

#[tokio::test]
async fn missing_user_sends_nothing() {
    let adapter = SubmissionAdapter::new(MemoryPersistence::new());
    let mut wizard = confirmed_wizard("2005-06-01", true);

    let outcome = adapter.submit(&mut wizard, None).await;
    assert!(matches!(outcome, SubmitOutcome::AuthenticationRequired(_)));
    assert_eq!(outcome.notice().title, "Authentication Required");
    assert_eq!(outcome.notice().variant, NoticeVariant::Destructive);
    assert!(adapter.persistence().rows(DEFAULT_TABLE).is_empty());
    assert_eq!(wizard.step(), Step::Confirmation);
}

#[tokio::test]
async fn missing_consent_blocks_without_contacting_store() {
    let adapter = SubmissionAdapter::new(MemoryPersistence::new());
    let mut wizard = confirmed_wizard("2015-06-01", false);

    let outcome = adapter.submit(&mut wizard, Some(&user())).await;
    assert!(matches!(outcome, SubmitOutcome::Blocked(_)));
    assert!(adapter.persistence().rows(DEFAULT_TABLE).is_empty());
    assert_eq!(wizard.record().student_first_name, "Ada");
}

#[tokio::test]
async fn store_failure_keeps_wizard_for_retry() {
    let adapter = SubmissionAdapter::new(MemoryPersistence::failing("permission denied"));
    let mut wizard = confirmed_wizard("2005-06-01", true);

    let outcome = adapter.submit(&mut wizard, Some(&user())).await;
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(
        outcome.notice().description,
        "There was an error submitting your application. Please try again."
    );
    assert_eq!(wizard.step(), Step::Confirmation);
    assert_eq!(wizard.record().city, "Springfield");
}

#[tokio::test]
async fn dashboard_lists_newest_first_with_counts() {
    let store = MemoryPersistence::with_rows(
        DEFAULT_TABLE,
        vec![
            stored_row("a", "user-7", "pending", "2026-01-05T10:00:00Z"),
            stored_row("b", "user-7", "approved", "2026-03-05T10:00:00Z"),
            stored_row("c", "someone-else", "approved", "2026-04-05T10:00:00Z"),
            stored_row("d", "user-7", "rejected", "2026-02-05T10:00:00Z"),
            stored_row("e", "user-7", "pending", "2026-05-05T10:00:00Z"),
        ],
    );

    let dashboard = load_dashboard(&store, DEFAULT_TABLE, &user()).await.unwrap();
    assert_eq!(dashboard.total, 4);
    assert_eq!(dashboard.pending, 2);
    assert_eq!(dashboard.approved, 1);
    let recent: Vec<&str> = dashboard.recent().iter().map(|row| row.id.as_str()).collect();
    assert_eq!(recent, vec!["e", "b", "d"]);
}

#[tokio::test]
async fn dashboard_for_new_user_is_empty() {
    let store = MemoryPersistence::new();
    let dashboard = load_dashboard(&store, DEFAULT_TABLE, &user()).await.unwrap();
    assert!(dashboard.is_empty());
    assert!(dashboard.recent().is_empty());
}

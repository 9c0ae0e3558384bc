#![allow(missing_docs)]

pub mod consent;
pub mod record;
pub mod render;
pub mod schema;
pub mod spec;
pub mod submission;
pub mod validate;
pub mod wizard;

pub use consent::{CONSENT_AGE, age_on, consent_required};
pub use record::{EnrollmentRecord, Field, FieldKind, FieldValue, RecordError, RecordPatch};
pub use render::{
    RenderField, RenderPayload, RenderProgress, RenderStatus, build_render_payload,
    render_json_ui, render_summary, render_text,
};
pub use schema::{insert_schema, record_schema};
pub use spec::{Condition, FieldSpec, Rule, Step, StepSpec, step_spec};
pub use submission::{ApplicationInsert, ApplicationRow, ApplicationStatus, build_insert};
pub use validate::{
    ErrorMap, FieldError, ValidationReport, is_present, is_valid_date, is_valid_email,
    is_valid_phone, parse_date, validate_record, validate_step,
};
pub use wizard::{Advance, SubmitBlocked, Wizard};

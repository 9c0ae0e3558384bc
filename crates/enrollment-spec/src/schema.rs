use schemars::schema_for;
use serde_json::Value;

use crate::record::EnrollmentRecord;
use crate::submission::ApplicationInsert;

/// JSON Schema describing an answers file for the wizard.
pub fn record_schema() -> Value {
    schema_for!(EnrollmentRecord).to_value()
}

/// JSON Schema of the row inserted into the applications table.
pub fn insert_schema() -> Value {
    schema_for!(ApplicationInsert).to_value()
}

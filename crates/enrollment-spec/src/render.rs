use chrono::NaiveDate;
use handlebars::{Handlebars, RenderError};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::{
    record::{EnrollmentRecord, Field, FieldKind, FieldValue},
    spec::{Step, step_spec},
    validate::parse_date,
    wizard::{SubmitBlocked, Wizard},
};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The step still has fields to fill in.
    NeedInput,
    /// The last forward attempt failed validation.
    Invalid,
    /// On the confirmation step with consent missing.
    ConsentRequired,
    /// On the confirmation step and ready to submit.
    ReadyToSubmit,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Invalid => "invalid",
            RenderStatus::ConsentRequired => "consent_required",
            RenderStatus::ReadyToSubmit => "ready_to_submit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// One-based position of the current step.
    pub step: usize,
    pub total: usize,
    pub percent: u8,
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub field: Field,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub visible: bool,
    pub value: FieldValue,
    pub error: Option<String>,
    pub choices: Option<Vec<String>>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub step: Step,
    pub title: String,
    pub description: String,
    pub status: RenderStatus,
    pub progress: RenderProgress,
    pub fields: Vec<RenderField>,
    pub summary: Option<String>,
}

impl RenderPayload {
    pub fn visible_fields(&self) -> impl Iterator<Item = &RenderField> {
        self.fields.iter().filter(|field| field.visible)
    }
}

/// Build the renderer payload from the wizard's current state.
pub fn build_render_payload(wizard: &Wizard) -> RenderPayload {
    let step = wizard.step();
    let record = wizard.record();
    let errors = wizard.errors();

    let fields = step_spec(step)
        .fields
        .iter()
        .map(|spec| RenderField {
            field: spec.field,
            label: spec.label.to_string(),
            kind: spec.field.kind(),
            required: spec.required,
            visible: spec.is_active(record),
            value: record.get(spec.field),
            error: errors.get(&spec.field).cloned(),
            choices: spec
                .choices
                .map(|choices| choices.iter().map(|choice| choice.to_string()).collect()),
        })
        .collect::<Vec<_>>();

    let status = if step == Step::Confirmation {
        match wizard.submission_blocker() {
            Some(SubmitBlocked::ConsentMissing) => RenderStatus::ConsentRequired,
            _ => RenderStatus::ReadyToSubmit,
        }
    } else if errors.is_empty() {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Invalid
    };

    let summary = if step == Step::Confirmation {
        review_or_warn(render_summary(record))
    } else {
        None
    };

    RenderPayload {
        step,
        title: step.title().to_string(),
        description: step.description().to_string(),
        status,
        progress: RenderProgress {
            step: step.index() + 1,
            total: Step::ALL.len(),
            percent: wizard.progress_percent(),
        },
        fields,
        summary,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.field.as_str().to_string()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert(
                "type".into(),
                Value::String(field_type_label(field.kind).to_string()),
            );
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("visible".into(), Value::Bool(field.visible));
            map.insert(
                "value".into(),
                match &field.value {
                    FieldValue::Text(text) => Value::String(text.clone()),
                    FieldValue::Flag(flag) => Value::Bool(*flag),
                },
            );
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            if let Some(choices) = &field.choices {
                map.insert(
                    "choices".into(),
                    Value::Array(
                        choices
                            .iter()
                            .map(|choice| Value::String(choice.clone()))
                            .collect(),
                    ),
                );
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "step": payload.step,
        "title": payload.title,
        "description": payload.description,
        "status": payload.status.as_str(),
        "progress": {
            "step": payload.progress.step,
            "total": payload.progress.total,
            "percent": payload.progress.percent,
        },
        "fields": fields,
        "summary": payload.summary,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Step {}/{}: {} ({}%)",
        payload.progress.step, payload.progress.total, payload.title, payload.progress.percent
    ));
    lines.push(payload.description.clone());

    for field in payload.visible_fields() {
        let mut entry = format!(" - {}", field.label);
        if field.required {
            entry.push_str(" *");
        }
        let value = field.value.to_string();
        if !value.is_empty() {
            entry.push_str(&format!(" = {}", value));
        }
        lines.push(entry);
        if let Some(error) = &field.error {
            lines.push(format!("   ! {}", error));
        }
    }

    if let Some(summary) = &payload.summary {
        lines.push(summary.clone());
    }
    if payload.status == RenderStatus::ConsentRequired {
        lines.push("Parental consent is required to submit the application.".to_string());
    }

    lines.join("\n")
}

const SUMMARY_TEMPLATE: &str = "\
Review Your Application
Student Information
  Name: {{student.name}}
  Date of Birth: {{student.date_of_birth}}
  Grade Level: {{student.grade}}
{{#if consent.required}}
  {{#if consent.given}}Parental consent provided{{else}}Parental consent required{{/if}}
{{/if}}
Guardian Information
  Primary: {{primary.name}} ({{primary.relationship}})
  Email: {{primary.email}}
  Phone: {{primary.phone}}
{{#if secondary}}
  Secondary: {{secondary.name}} ({{secondary.relationship}})
  Email: {{secondary.email}}
  Phone: {{secondary.phone}}
{{/if}}
Contact Information
  Address: {{contact.street}}, {{contact.city}}, {{contact.state}} {{contact.postal_code}}
  Emergency Contact: {{emergency.name}} ({{emergency.relationship}}) {{emergency.phone}}";

/// Render the confirmation-step review of the whole record.
pub fn render_summary(record: &EnrollmentRecord) -> Result<String, RenderError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    let secondary = record.has_secondary_guardian.then(|| {
        json!({
            "name": full_name(&record.secondary_guardian_first_name, &record.secondary_guardian_last_name),
            "relationship": record.secondary_guardian_relationship,
            "email": record.secondary_guardian_email,
            "phone": record.secondary_guardian_phone,
        })
    });
    let context = json!({
        "student": {
            "name": full_name(&record.student_first_name, &record.student_last_name),
            "date_of_birth": format_date(&record.student_date_of_birth),
            "grade": record.student_grade,
        },
        "consent": {
            "required": record.parental_consent_required,
            "given": record.parental_consent_given,
        },
        "primary": {
            "name": full_name(&record.primary_guardian_first_name, &record.primary_guardian_last_name),
            "relationship": record.primary_guardian_relationship,
            "email": record.primary_guardian_email,
            "phone": record.primary_guardian_phone,
        },
        "secondary": secondary,
        "contact": {
            "street": record.street_address,
            "city": record.city,
            "state": record.state,
            "postal_code": record.postal_code,
        },
        "emergency": {
            "name": record.emergency_contact_name,
            "relationship": record.emergency_contact_relationship,
            "phone": record.emergency_contact_phone,
        },
    });
    handlebars.render_template(SUMMARY_TEMPLATE, &context)
}

fn review_or_warn(rendered: Result<String, RenderError>) -> Option<String> {
    match rendered {
        Ok(review) => Some(review),
        Err(err) => {
            warn!(error = %err, "confirmation review failed to render");
            None
        }
    }
}

fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

/// Long US-style date, e.g. "October 18, 2013".
pub fn format_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => long_date(date),
        None if raw.trim().is_empty() => "Not provided".to_string(),
        None => raw.to_string(),
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn field_type_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "string",
        FieldKind::Flag => "boolean",
    }
}

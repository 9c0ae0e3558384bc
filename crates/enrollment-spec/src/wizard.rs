use chrono::{Local, NaiveDate};
use thiserror::Error;

use crate::record::{EnrollmentRecord, Field, FieldValue, RecordError, RecordPatch};
use crate::spec::Step;
use crate::submission::{ApplicationInsert, build_insert};
use crate::validate::{ErrorMap, validate_step};

/// Result of a forward transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Validation passed and the wizard moved to this step.
    Moved(Step),
    /// The current step has failing fields; see [`Wizard::errors`].
    Blocked,
    /// Already on the last step.
    Capped,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlocked {
    #[error("the application can only be submitted from the confirmation step (currently on {0:?})")]
    NotAtConfirmation(Step),
    #[error("Parental consent is required to submit the application.")]
    ConsentMissing,
}

/// Multi-step enrollment controller owning the record, step position and errors.
#[derive(Debug, Clone, Default)]
pub struct Wizard {
    step: Step,
    record: EnrollmentRecord,
    errors: ErrorMap,
    today: Option<NaiveDate>,
}

impl Wizard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the date used for age calculations.
    pub fn with_today(today: NaiveDate) -> Self {
        Self {
            today: Some(today),
            ..Self::default()
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn record(&self) -> &EnrollmentRecord {
        &self.record
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn progress_percent(&self) -> u8 {
        let done = self.step.index() + 1;
        (done * 100 / Step::ALL.len()) as u8
    }

    /// Merges field updates into the record.
    ///
    /// The patch is applied atomically: if any entry is rejected nothing
    /// changes. Consent flags are recomputed when the birth date or the
    /// consent checkbox is touched.
    pub fn patch(&mut self, patch: RecordPatch) -> Result<(), RecordError> {
        let refresh = patch.touches(Field::StudentDateOfBirth)
            || patch.touches(Field::ParentalConsentGiven);
        let consent = patch
            .get(Field::ParentalConsentGiven)
            .and_then(FieldValue::as_flag);
        patch.apply(&mut self.record)?;
        if refresh {
            let today = self.today();
            self.record.refresh_consent(today);
            // consent given in the same patch as a birth date still counts
            if let Some(given) = consent
                && self.record.parental_consent_required
            {
                self.record.parental_consent_given = given;
            }
        }
        Ok(())
    }

    pub fn advance(&mut self) -> Advance {
        let Some(next) = self.step.next() else {
            return Advance::Capped;
        };
        let errors = validate_step(self.step, &self.record);
        if errors.is_empty() {
            self.errors.clear();
            self.step = next;
            Advance::Moved(next)
        } else {
            self.errors = errors;
            Advance::Blocked
        }
    }

    /// Steps back without validating; stays on the first step when already there.
    pub fn retreat(&mut self) -> Step {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    pub fn reset(&mut self) {
        self.step = Step::StudentInfo;
        self.record = EnrollmentRecord::default();
        self.errors.clear();
    }

    pub fn submission_blocker(&self) -> Option<SubmitBlocked> {
        if self.step != Step::Confirmation {
            Some(SubmitBlocked::NotAtConfirmation(self.step))
        } else if !self.record.consent_satisfied() {
            Some(SubmitBlocked::ConsentMissing)
        } else {
            None
        }
    }

    /// Builds the insert payload once the consent invariant holds.
    ///
    /// Consent is re-derived from the birth date first so a session left open
    /// across a birthday submits the flags as of today.
    pub fn prepare_submission(&mut self, user_id: &str) -> Result<ApplicationInsert, SubmitBlocked> {
        let today = self.today();
        self.record.refresh_consent(today);
        match self.submission_blocker() {
            Some(blocked) => Err(blocked),
            None => Ok(build_insert(&self.record, user_id)),
        }
    }
}

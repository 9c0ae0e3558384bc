use enrollment_spec::{SubmitBlocked, Wizard};
use tracing::{error, info, warn};

use crate::config::DEFAULT_TABLE;
use crate::feedback::{Notice, Route};
use crate::persistence::Persistence;
use crate::session::AuthUser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Row stored; the wizard was reset.
    Submitted { notice: Notice, route: Route },
    /// No signed-in user; nothing was sent.
    AuthenticationRequired(Notice),
    /// The wizard is not in a submittable state; nothing was sent.
    Blocked(Notice),
    /// The store rejected the row; the wizard is untouched.
    Failed(Notice),
}

impl SubmitOutcome {
    pub fn notice(&self) -> &Notice {
        match self {
            SubmitOutcome::Submitted { notice, .. }
            | SubmitOutcome::AuthenticationRequired(notice)
            | SubmitOutcome::Blocked(notice)
            | SubmitOutcome::Failed(notice) => notice,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted { .. })
    }
}

/// Sends confirmed wizard records to the applications table.
#[derive(Debug)]
pub struct SubmissionAdapter<P> {
    persistence: P,
    table: String,
}

impl<P: Persistence> SubmissionAdapter<P> {
    pub fn new(persistence: P) -> Self {
        Self::with_table(persistence, DEFAULT_TABLE)
    }

    pub fn with_table(persistence: P, table: impl Into<String>) -> Self {
        Self {
            persistence,
            table: table.into(),
        }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub async fn submit(&self, wizard: &mut Wizard, user: Option<&AuthUser>) -> SubmitOutcome {
        let Some(user) = user else {
            return SubmitOutcome::AuthenticationRequired(Notice::error(
                "Authentication Required",
                "Please log in to submit your enrollment application.",
            ));
        };

        let insert = match wizard.prepare_submission(&user.id) {
            Ok(insert) => insert,
            Err(blocked) => {
                warn!(reason = %blocked, "submission blocked");
                let title = match blocked {
                    SubmitBlocked::ConsentMissing => "Parental Consent Required",
                    SubmitBlocked::NotAtConfirmation(_) => "Application Incomplete",
                };
                return SubmitOutcome::Blocked(Notice::error(title, blocked.to_string()));
            }
        };

        let stored = match serde_json::to_value(&insert) {
            Ok(row) => self.persistence.insert_one(&self.table, row).await,
            Err(err) => Err(err.into()),
        };
        match stored {
            Ok(()) => {
                info!(user_id = %user.id, table = %self.table, "application submitted");
                wizard.reset();
                SubmitOutcome::Submitted {
                    notice: Notice::info(
                        "Application Submitted Successfully",
                        "Your enrollment application has been submitted and is under review.",
                    ),
                    route: Route::Dashboard,
                }
            }
            Err(err) => {
                error!(error = %err, "error submitting application");
                SubmitOutcome::Failed(Notice::error(
                    "Submission Failed",
                    "There was an error submitting your application. Please try again.",
                ))
            }
        }
    }
}

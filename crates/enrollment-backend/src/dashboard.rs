use enrollment_spec::{ApplicationRow, ApplicationStatus};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::persistence::{Direction, Persistence, Query};
use crate::session::AuthUser;

pub const RECENT_LIMIT: usize = 3;

/// A user's applications, newest first, with status tallies.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub applications: Vec<ApplicationRow>,
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
}

impl Dashboard {
    pub fn from_rows(applications: Vec<ApplicationRow>) -> Self {
        let count = |status: ApplicationStatus| {
            applications
                .iter()
                .filter(|row| row.application_status == status)
                .count()
        };
        Self {
            total: applications.len(),
            pending: count(ApplicationStatus::Pending),
            approved: count(ApplicationStatus::Approved),
            applications,
        }
    }

    pub fn recent(&self) -> &[ApplicationRow] {
        &self.applications[..self.applications.len().min(RECENT_LIMIT)]
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

pub async fn load_dashboard<P: Persistence + ?Sized>(
    persistence: &P,
    table: &str,
    user: &AuthUser,
) -> Result<Dashboard> {
    let query = Query::new()
        .eq("user_id", user.id.as_str())
        .order("created_at", Direction::Descending);
    let rows = persistence.select(table, &query).await?;
    let applications = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<ApplicationRow>, _>>()?;
    debug!(user_id = %user.id, count = applications.len(), "loaded applications");
    Ok(Dashboard::from_rows(applications))
}

//! ---
//! refdata_section: "06-security-access-control"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Right checks against materialized assignments."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use refdata_persistence::RightAssignmentRepository;
use tracing::debug;
use uuid::Uuid;

use crate::metrics::SecurityMetrics;
use crate::{Result, SecurityError};

/// Answers authorization questions from the right assignment table.
#[derive(Clone)]
pub struct RightService {
    assignments: RightAssignmentRepository,
    metrics: Option<SecurityMetrics>,
}

impl RightService {
    pub fn new(assignments: RightAssignmentRepository) -> Self {
        Self {
            assignments,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SecurityMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn has_right(
        &self,
        user_id: Uuid,
        right: &str,
        facility_id: Option<Uuid>,
        program_id: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self
            .assignments
            .has_right(user_id, right, facility_id, program_id)
            .await?)
    }

    /// Fails with [`SecurityError::Unauthorized`] unless the user holds
    /// `right` without facility or program scope.
    pub async fn check_admin_right(&self, user_id: Uuid, right: &str) -> Result<()> {
        if self.has_right(user_id, right, None, None).await? {
            return Ok(());
        }
        debug!(%user_id, right, "admin right denied");
        if let Some(metrics) = &self.metrics {
            metrics.inc_right_denial(right);
        }
        Err(SecurityError::Unauthorized {
            right: right.to_owned(),
        })
    }
}

//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Shared handler state and cross-cutting helpers."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use refdata_common::config::{ApiConfig, AppConfig};
use refdata_common::version::VersionInfo;
use refdata_domain::{EntityKind, Pageable};
use refdata_persistence::{Database, Repositories};
use refdata_rights::{RightAssignmentGenerator, RightsMetrics};
use refdata_security::{AuditTrail, RightService, SecurityMetrics, TokenService};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, QueryParams};

/// Shared API state exposed to handlers.
pub struct ApiState {
    pub(crate) database: Database,
    pub(crate) repos: Repositories,
    pub(crate) tokens: TokenService,
    pub(crate) rights: RightService,
    pub(crate) audit: AuditTrail,
    pub(crate) generator: RightAssignmentGenerator,
    pub(crate) config: ApiConfig,
    pub(crate) version: VersionInfo,
    regenerate_on_change: bool,
}

impl ApiState {
    pub fn new(database: Database, config: &AppConfig) -> Self {
        let repos = database.repositories();
        Self {
            tokens: TokenService::new(
                repos.tokens.clone(),
                repos.users.clone(),
                config.auth.token_ttl,
            ),
            rights: RightService::new(repos.right_assignments.clone()),
            audit: AuditTrail::new(repos.audit.clone(), config.audit.enabled),
            generator: RightAssignmentGenerator::new(repos.clone()),
            config: config.api.clone(),
            version: VersionInfo::current(),
            regenerate_on_change: config.right_assignments.regenerate_on_change,
            database,
            repos,
        }
    }

    pub fn with_security_metrics(mut self, metrics: SecurityMetrics) -> Self {
        self.tokens = self.tokens.with_metrics(metrics.clone());
        self.rights = self.rights.with_metrics(metrics);
        self
    }

    pub fn with_rights_metrics(mut self, metrics: RightsMetrics) -> Self {
        self.generator = self.generator.with_metrics(metrics);
        self
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn generator(&self) -> &RightAssignmentGenerator {
        &self.generator
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// 403 unless the caller holds `right` globally.
    pub(crate) async fn require(&self, user: &AuthenticatedUser, right: &str) -> Result<(), ApiError> {
        self.rights.check_admin_right(user.id(), right).await?;
        Ok(())
    }

    /// `page`/`size` with the configured default; sizes are capped.
    pub(crate) fn pageable(&self, params: &QueryParams) -> Result<Pageable, ApiError> {
        let page = params.u32("page")?.unwrap_or(0);
        let size = params
            .u32("size")?
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size);
        Ok(Pageable::new(page, size))
    }

    pub(crate) async fn record<T: Serialize>(
        &self,
        user: &AuthenticatedUser,
        action: &str,
        entity: EntityKind,
        entity_id: Uuid,
        value: &T,
    ) -> Result<(), ApiError> {
        let metadata = serde_json::to_value(value).unwrap_or_default();
        self.audit
            .record(Some(user.id()), action, entity.as_ref(), entity_id, metadata)
            .await?;
        Ok(())
    }

    /// Rebuild every right assignment after the supervision hierarchy or a
    /// role changed.
    pub(crate) async fn regenerate_all(&self) -> Result<(), ApiError> {
        if self.regenerate_on_change {
            let report = self.generator.generate_all().await?;
            info!(rows = report.rows_written, "right assignments regenerated");
        }
        Ok(())
    }

    pub(crate) async fn regenerate_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.regenerate_on_change {
            self.generator.generate_for_user(user_id).await?;
        }
        Ok(())
    }
}

//! ---
//! refdata_section: "06-security-access-control"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Hash-chained audit trail over the audit_log table."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use refdata_persistence::{AuditRecord, AuditRepository};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::Result;

const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[allow(clippy::too_many_arguments)]
fn compute_hash(
    recorded_at: DateTime<Utc>,
    actor_id: Option<Uuid>,
    action: &str,
    entity_type: &str,
    entity_id: Uuid,
    metadata: &serde_json::Value,
    previous_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(recorded_at.timestamp_micros().to_be_bytes());
    if let Some(actor) = actor_id {
        hasher.update(actor.as_bytes());
    }
    hasher.update(action.as_bytes());
    hasher.update(entity_type.as_bytes());
    hasher.update(entity_id.as_bytes());
    hasher.update(metadata.to_string().as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

fn record_hash(record: &AuditRecord, previous_hash: &str) -> String {
    compute_hash(
        record.recorded_at,
        record.actor_id,
        &record.action,
        &record.entity_type,
        record.entity_id,
        &record.metadata,
        previous_hash,
    )
}

/// Append-only audit log. Each record hashes its content together with the
/// previous record's hash so edits to stored rows are detectable.
#[derive(Clone)]
pub struct AuditTrail {
    repository: AuditRepository,
    enabled: bool,
    append_lock: Arc<Mutex<()>>,
}

impl AuditTrail {
    pub fn new(repository: AuditRepository, enabled: bool) -> Self {
        Self {
            repository,
            enabled,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append one entry; returns `None` when auditing is disabled.
    pub async fn record(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        metadata: serde_json::Value,
    ) -> Result<Option<AuditRecord>> {
        if !self.enabled {
            return Ok(None);
        }
        let _guard = self.append_lock.lock().await;
        let previous = self.repository.last_hash().await?;
        // Stored timestamps keep microseconds.
        let recorded_at = Utc::now().trunc_subsecs(6);
        let mut record = AuditRecord {
            sequence: 0,
            recorded_at,
            actor_id,
            action: action.to_owned(),
            entity_type: entity_type.to_owned(),
            entity_id,
            metadata,
            previous_hash: previous.clone(),
            hash: String::new(),
        };
        record.hash = record_hash(&record, previous.as_deref().unwrap_or(GENESIS));
        Ok(Some(self.repository.append(&record).await?))
    }

    pub async fn history(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditRecord>> {
        Ok(self.repository.list_for_entity(entity_type, entity_id).await?)
    }

    /// Recompute the chain; `false` when any record or link was altered.
    pub async fn verify(&self) -> Result<bool> {
        let mut previous: Option<String> = None;
        for record in self.repository.list_all().await? {
            if record.previous_hash != previous {
                warn!(sequence = record.sequence, "audit chain link broken");
                return Ok(false);
            }
            let expected = record_hash(&record, previous.as_deref().unwrap_or(GENESIS));
            if expected != record.hash {
                warn!(sequence = record.sequence, "audit record altered");
                return Ok(false);
            }
            previous = Some(record.hash);
        }
        Ok(true)
    }
}

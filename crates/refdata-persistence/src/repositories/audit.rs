//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Append-only audit log storage."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::codec;
use crate::Result;

/// One entry of the audit chain. `sequence` is assigned by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub sequence: i64,
    pub recorded_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub metadata: Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

fn record_from_row(row: &SqliteRow) -> Result<AuditRecord> {
    let metadata: String = row.try_get("metadata")?;
    Ok(AuditRecord {
        sequence: row.try_get("sequence")?,
        recorded_at: row.try_get("recorded_at")?,
        actor_id: codec::opt_uuid(row, "actor_id")?,
        action: row.try_get("action")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: codec::uuid(row, "entity_id")?,
        metadata: serde_json::from_str(&metadata)?,
        previous_hash: row.try_get("previous_hash")?,
        hash: row.try_get("hash")?,
    })
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash of the newest record, if any.
    pub async fn last_hash(&self) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY sequence DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }

    /// Store `record` and return it with its assigned sequence.
    pub async fn append(&self, record: &AuditRecord) -> Result<AuditRecord> {
        let result = sqlx::query(
            "INSERT INTO audit_log (recorded_at, actor_id, action, entity_type, entity_id,
             metadata, previous_hash, hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.recorded_at)
        .bind(codec::opt_string(record.actor_id))
        .bind(&record.action)
        .bind(&record.entity_type)
        .bind(record.entity_id.to_string())
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(&record.previous_hash)
        .bind(&record.hash)
        .execute(&self.pool)
        .await?;
        Ok(AuditRecord {
            sequence: result.last_insert_rowid(),
            ..record.clone()
        })
    }

    pub async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_log WHERE entity_type = ? AND entity_id = ? ORDER BY sequence",
        )
        .bind(entity_type)
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query("SELECT * FROM audit_log ORDER BY sequence")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}

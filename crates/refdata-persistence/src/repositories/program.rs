//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Program storage."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use refdata_domain::{Page, Pageable, Program};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{limit_offset, to_u64};
use crate::codec;
use crate::{PersistenceError, Result};

#[derive(Debug, Clone)]
pub struct ProgramRepository {
    pool: SqlitePool,
}

fn program_from_row(row: &SqliteRow) -> Result<Program> {
    Ok(Program {
        id: codec::uuid(row, "id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        active: row.try_get("active")?,
        periods_skippable: row.try_get("periods_skippable")?,
        show_non_full_supply_tab: row.try_get("show_non_full_supply_tab")?,
    })
}

impl ProgramRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Program>> {
        let row = sqlx::query("SELECT * FROM programs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(program_from_row).transpose()
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM programs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Program>> {
        let row = sqlx::query("SELECT * FROM programs WHERE code = ? COLLATE NOCASE")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(program_from_row).transpose()
    }

    pub async fn save(&self, program: &Program) -> Result<()> {
        sqlx::query(
            "INSERT INTO programs (id, code, name, description, active, periods_skippable,
             show_non_full_supply_tab) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name,
             description = excluded.description, active = excluded.active,
             periods_skippable = excluded.periods_skippable,
             show_non_full_supply_tab = excluded.show_non_full_supply_tab",
        )
        .bind(program.id.to_string())
        .bind(program.code.trim())
        .bind(&program.name)
        .bind(&program.description)
        .bind(program.active)
        .bind(program.periods_skippable)
        .bind(program.show_non_full_supply_tab)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::classify)?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM programs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_page(&self, pageable: Pageable) -> Result<Page<Program>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM programs")
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query("SELECT * FROM programs ORDER BY code LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let content = rows.iter().map(program_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

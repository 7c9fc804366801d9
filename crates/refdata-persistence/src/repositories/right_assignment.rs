//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Materialized right assignment table."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use refdata_domain::RightAssignment;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::codec::{self, opt_string};
use crate::Result;

#[derive(Debug, Clone)]
pub struct RightAssignmentRepository {
    pool: SqlitePool,
}

async fn insert_all(conn: &mut SqliteConnection, assignments: &[RightAssignment]) -> Result<u64> {
    let mut written = 0;
    for assignment in assignments {
        written += sqlx::query(
            "INSERT INTO right_assignments (id, user_id, right_name, facility_id, program_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(assignment.user_id.to_string())
        .bind(&assignment.right_name)
        .bind(opt_string(assignment.facility_id))
        .bind(opt_string(assignment.program_id))
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(written)
}

impl RightAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Drop the whole table and write `assignments` in one transaction.
    /// Returns the number of rows inserted.
    pub async fn replace_all(&self, assignments: &[RightAssignment]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        debug!("dropping existing right assignments");
        sqlx::query("DELETE FROM right_assignments")
            .execute(&mut *tx)
            .await?;
        debug!("inserting right assignments");
        let written = insert_all(&mut tx, assignments).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Same as [`Self::replace_all`] limited to one user's rows; rows of
    /// other users in `assignments` are ignored.
    pub async fn replace_for_user(
        &self,
        user_id: Uuid,
        assignments: &[RightAssignment],
    ) -> Result<u64> {
        let own: Vec<RightAssignment> = assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM right_assignments WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
        let written = insert_all(&mut tx, &own).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Exact lookup; `None` matches a stored NULL.
    pub async fn has_right(
        &self,
        user_id: Uuid,
        right_name: &str,
        facility_id: Option<Uuid>,
        program_id: Option<Uuid>,
    ) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM right_assignments
             WHERE user_id = ? AND right_name = ? AND facility_id IS ? AND program_id IS ?
             LIMIT 1",
        )
        .bind(user_id.to_string())
        .bind(right_name.to_owned())
        .bind(opt_string(facility_id))
        .bind(opt_string(program_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<RightAssignment>> {
        let rows = sqlx::query(
            "SELECT user_id, right_name, facility_id, program_id FROM right_assignments
             WHERE user_id = ? ORDER BY right_name, facility_id, program_id",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<RightAssignment> {
                Ok(RightAssignment {
                    user_id: codec::uuid(row, "user_id")?,
                    right_name: row.try_get("right_name")?,
                    facility_id: codec::opt_uuid(row, "facility_id")?,
                    program_id: codec::opt_uuid(row, "program_id")?,
                })
            })
            .collect()
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM right_assignments")
            .fetch_one(&self.pool)
            .await?;
        Ok(super::to_u64(count))
    }
}

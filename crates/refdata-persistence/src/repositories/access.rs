//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Rights, roles, users and role assignment storage."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use refdata_domain::{
    AssignmentScope, IntermediateRightAssignment, Page, Pageable, Right, RightType, Role,
    RoleAssignment, User,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{limit_offset, to_u64};
use crate::codec::{self, opt_string};
use crate::{PersistenceError, Result};

#[derive(Debug, Clone)]
pub struct RightRepository {
    pool: SqlitePool,
}

fn right_from_row(row: &SqliteRow) -> Result<Right> {
    let raw_type: String = row.try_get("type")?;
    let right_type = raw_type
        .parse::<RightType>()
        .map_err(|_| PersistenceError::Corrupt {
            column: "type",
            value: raw_type.clone(),
        })?;
    let attachments: String = row.try_get("attachment_ids")?;
    Ok(Right {
        id: codec::uuid(row, "id")?,
        name: row.try_get("name")?,
        right_type,
        description: row.try_get("description")?,
        attachment_ids: serde_json::from_str(&attachments)?,
    })
}

impl RightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Right>> {
        let row = sqlx::query("SELECT * FROM rights WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(right_from_row).transpose()
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Right>> {
        let row = sqlx::query("SELECT * FROM rights WHERE name = ?")
            .bind(name.to_owned())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(right_from_row).transpose()
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    pub async fn find_all(&self) -> Result<Vec<Right>> {
        let rows = sqlx::query("SELECT * FROM rights ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(right_from_row).collect()
    }

    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Right>> {
        let mut rights = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(right) = self.find_by_id(*id).await? {
                rights.push(right);
            }
        }
        Ok(rights)
    }

    pub async fn save(&self, right: &Right) -> Result<()> {
        sqlx::query(
            "INSERT INTO rights (id, name, type, description, attachment_ids) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, type = excluded.type,
             description = excluded.description, attachment_ids = excluded.attachment_ids",
        )
        .bind(right.id.to_string())
        .bind(right.name.trim())
        .bind(right.right_type.to_string())
        .bind(&right.description)
        .bind(serde_json::to_string(&right.attachment_ids)?)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::classify)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Role> {
        let id = codec::uuid(row, "id")?;
        let rights: Vec<String> =
            sqlx::query_scalar("SELECT right_id FROM role_rights WHERE role_id = ? ORDER BY right_id")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;
        Ok(Role {
            id,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            right_ids: rights
                .iter()
                .map(|raw| codec::parse_uuid("right_id", raw))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT * FROM roles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT * FROM roles WHERE name = ? COLLATE NOCASE")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM roles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn find_all(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let mut roles = Vec::with_capacity(rows.len());
        for row in &rows {
            roles.push(self.hydrate(row).await?);
        }
        Ok(roles)
    }

    /// Right type shared by the role's rights; `None` for an empty role.
    pub async fn right_type(&self, role_id: Uuid) -> Result<Option<RightType>> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT r.type FROM role_rights rr JOIN rights r ON r.id = rr.right_id
             WHERE rr.role_id = ? LIMIT 1",
        )
        .bind(role_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        raw.map(|raw| {
            raw.parse::<RightType>()
                .map_err(|_| PersistenceError::Corrupt {
                    column: "type",
                    value: raw.clone(),
                })
        })
        .transpose()
    }

    pub async fn save(&self, role: &Role) -> Result<()> {
        let id = role.id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO roles (id, name, description) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, description = excluded.description",
        )
        .bind(&id)
        .bind(role.name.trim())
        .bind(&role.description)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;

        sqlx::query("DELETE FROM role_rights WHERE role_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        for right in &role.right_ids {
            sqlx::query("INSERT OR IGNORE INTO role_rights (role_id, right_id) VALUES (?, ?)")
                .bind(&id)
                .bind(right.to_string())
                .execute(&mut *tx)
                .await
                .map_err(PersistenceError::classify)?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }
}

const KIND_DIRECT: &str = "DIRECT";
const KIND_SUPERVISION: &str = "SUPERVISION";
const KIND_FULFILLMENT: &str = "FULFILLMENT";

fn assignment_from_row(row: &SqliteRow) -> Result<RoleAssignment> {
    let role_id = codec::uuid(row, "role_id")?;
    let kind: String = row.try_get("kind")?;
    let scope = match kind.as_str() {
        KIND_DIRECT => AssignmentScope::Direct,
        KIND_SUPERVISION => AssignmentScope::Supervision {
            program_id: codec::uuid(row, "program_id")?,
            supervisory_node_id: codec::opt_uuid(row, "supervisory_node_id")?,
        },
        KIND_FULFILLMENT => AssignmentScope::Fulfillment {
            warehouse_id: codec::uuid(row, "warehouse_id")?,
        },
        _ => {
            return Err(PersistenceError::Corrupt {
                column: "kind",
                value: kind,
            })
        }
    };
    Ok(RoleAssignment { role_id, scope })
}

async fn write_assignments(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    assignments: &[RoleAssignment],
) -> Result<()> {
    let user = user_id.to_string();
    sqlx::query("DELETE FROM role_assignments WHERE user_id = ?")
        .bind(&user)
        .execute(&mut *conn)
        .await?;
    for assignment in assignments {
        let (kind, program, node, warehouse) = match assignment.scope {
            AssignmentScope::Direct => (KIND_DIRECT, None, None, None),
            AssignmentScope::Supervision {
                program_id,
                supervisory_node_id,
            } => (KIND_SUPERVISION, Some(program_id), supervisory_node_id, None),
            AssignmentScope::Fulfillment { warehouse_id } => {
                (KIND_FULFILLMENT, None, None, Some(warehouse_id))
            }
        };
        sqlx::query(
            "INSERT INTO role_assignments (id, user_id, role_id, kind, program_id,
             supervisory_node_id, warehouse_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user)
        .bind(assignment.role_id.to_string())
        .bind(kind)
        .bind(opt_string(program))
        .bind(opt_string(node))
        .bind(opt_string(warehouse))
        .execute(&mut *conn)
        .await
        .map_err(PersistenceError::classify)?;
    }
    Ok(())
}

async fn assignments_of(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
    let rows = sqlx::query(
        "SELECT * FROM role_assignments WHERE user_id = ?
         ORDER BY role_id, program_id, supervisory_node_id, warehouse_id",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(assignment_from_row).collect()
}

#[derive(Debug, Clone)]
pub struct RoleAssignmentRepository {
    pool: SqlitePool,
}

impl RoleAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
        assignments_of(&self.pool, user_id).await
    }

    /// Role assignments that use `role_id`, whoever holds them.
    pub async fn find_by_role(&self, role_id: Uuid) -> Result<Vec<RoleAssignment>> {
        let rows = sqlx::query("SELECT * FROM role_assignments WHERE role_id = ?")
            .bind(role_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(assignment_from_row).collect()
    }

    /// Replace every role assignment of the user.
    pub async fn replace_for_user(&self, user_id: Uuid, assignments: &[RoleAssignment]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_assignments(&mut tx, user_id, assignments).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Role assignments joined with their roles' rights, before node expansion.
    ///
    /// Home facility supervision resolves to the user's home facility and is
    /// skipped for users without one. Restricted to `user_id` when given.
    pub async fn find_intermediate(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<Vec<IntermediateRightAssignment>> {
        let rows = sqlx::query(
            "SELECT ra.user_id, r.name AS right_name,
                CASE
                    WHEN ra.kind = 'SUPERVISION' AND ra.supervisory_node_id IS NULL
                        THEN u.home_facility_id
                    WHEN ra.kind = 'FULFILLMENT' THEN ra.warehouse_id
                END AS facility_id,
                ra.program_id, ra.supervisory_node_id
             FROM role_assignments ra
             JOIN users u ON u.id = ra.user_id
             JOIN role_rights rr ON rr.role_id = ra.role_id
             JOIN rights r ON r.id = rr.right_id
             WHERE (ra.kind <> 'SUPERVISION' OR ra.supervisory_node_id IS NOT NULL
                    OR u.home_facility_id IS NOT NULL)
               AND (?1 IS NULL OR ra.user_id = ?1)",
        )
        .bind(opt_string(user_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<IntermediateRightAssignment> {
                Ok(IntermediateRightAssignment {
                    user_id: codec::uuid(row, "user_id")?,
                    right_name: row.try_get("right_name")?,
                    facility_id: codec::opt_uuid(row, "facility_id")?,
                    program_id: codec::opt_uuid(row, "program_id")?,
                    supervisory_node_id: codec::opt_uuid(row, "supervisory_node_id")?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<User> {
        let id = codec::uuid(row, "id")?;
        Ok(User {
            id,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            job_title: row.try_get("job_title")?,
            timezone: row.try_get("timezone")?,
            home_facility_id: codec::opt_uuid(row, "home_facility_id")?,
            active: row.try_get("active")?,
            login_restricted: row.try_get("login_restricted")?,
            role_assignments: assignments_of(&self.pool, id).await?,
        })
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(self.hydrate(row).await?);
        }
        Ok(users)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ? COLLATE NOCASE")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Store the user's own columns; role assignments are written through
    /// [`RoleAssignmentRepository::replace_for_user`].
    pub async fn save(&self, user: &User) -> Result<()> {
        self.save_with_assignments(user, None).await
    }

    /// Store the user and, when given, replace its role assignments in the
    /// same transaction.
    pub async fn save_with_assignments(
        &self,
        user: &User,
        assignments: Option<&[RoleAssignment]>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, username, first_name, last_name, email, job_title, timezone,
             home_facility_id, active, login_restricted) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET username = excluded.username,
             first_name = excluded.first_name, last_name = excluded.last_name,
             email = excluded.email, job_title = excluded.job_title, timezone = excluded.timezone,
             home_facility_id = excluded.home_facility_id, active = excluded.active,
             login_restricted = excluded.login_restricted",
        )
        .bind(user.id.to_string())
        .bind(user.username.trim())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.job_title)
        .bind(&user.timezone)
        .bind(opt_string(user.home_facility_id))
        .bind(user.active)
        .bind(user.login_restricted)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;
        if let Some(assignments) = assignments {
            write_assignments(&mut tx, user.id, assignments).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_page(&self, pageable: Pageable) -> Result<Page<User>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query("SELECT * FROM users ORDER BY username LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let content = self.hydrate_all(&rows).await?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }

    /// Users holding `right_id` through a supervision role at `node_id` for `program_id`.
    pub async fn find_users_by_supervision_right(
        &self,
        right_id: Uuid,
        node_id: Uuid,
        program_id: Uuid,
    ) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT DISTINCT u.* FROM users u
             JOIN role_assignments ra ON ra.user_id = u.id
             JOIN role_rights rr ON rr.role_id = ra.role_id
             WHERE ra.kind = 'SUPERVISION' AND rr.right_id = ?
               AND ra.supervisory_node_id = ? AND ra.program_id = ?
             ORDER BY u.username",
        )
        .bind(right_id.to_string())
        .bind(node_id.to_string())
        .bind(program_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(&rows).await
    }
}

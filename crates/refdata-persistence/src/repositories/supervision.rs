//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Supervisory node and requisition group storage."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Parent links are the source of truth for the node tree: a node's
//! `child_node_ids` are read back from the children's `parent_node_id`, and a
//! node's requisition group is the group pointing at it.

use refdata_domain::{Page, Pageable, RequisitionGroup, SupervisoryNode};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{limit_offset, to_u64};
use crate::codec::{self, opt_string};
use crate::{PersistenceError, Result};

/// Search filters for supervisory nodes. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct SupervisoryNodeSearch {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Exact code, ignoring case.
    pub code: Option<String>,
    /// Member facility of the node's requisition group.
    pub facility_id: Option<Uuid>,
    /// Program supported by the node's requisition group.
    pub program_id: Option<Uuid>,
    /// Zone of the node's own facility.
    pub zone_id: Option<Uuid>,
    pub ids: Vec<Uuid>,
}

/// Node tree and requisition group coverage loaded in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisionSnapshot {
    /// `(node, parent)` for every node.
    pub nodes: Vec<(Uuid, Option<Uuid>)>,
    /// `(node, program, facility)`: the node's requisition groups cover the
    /// facility for the program.
    pub coverage: Vec<(Uuid, Uuid, Uuid)>,
}

#[derive(Debug, Clone)]
pub struct SupervisoryNodeRepository {
    pool: SqlitePool,
}

fn push_node_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &SupervisoryNodeSearch) {
    if let Some(name) = &search.name {
        qb.push(" AND n.name LIKE ").push_bind(format!("%{}%", name.trim()));
    }
    if let Some(code) = &search.code {
        qb.push(" AND n.code = ").push_bind(code.trim().to_owned());
        qb.push(" COLLATE NOCASE");
    }
    if search.facility_id.is_some() || search.program_id.is_some() {
        qb.push(" AND n.id IN (SELECT rg.supervisory_node_id FROM requisition_groups rg");
        if search.facility_id.is_some() {
            qb.push(" JOIN requisition_group_members m ON m.requisition_group_id = rg.id");
        }
        if search.program_id.is_some() {
            qb.push(" JOIN requisition_group_programs p ON p.requisition_group_id = rg.id");
        }
        qb.push(" WHERE 1 = 1");
        if let Some(facility) = search.facility_id {
            qb.push(" AND m.facility_id = ").push_bind(facility.to_string());
        }
        if let Some(program) = search.program_id {
            qb.push(" AND p.program_id = ").push_bind(program.to_string());
        }
        qb.push(")");
    }
    if let Some(zone) = search.zone_id {
        qb.push(" AND n.facility_id IN (SELECT id FROM facilities WHERE geographic_zone_id = ")
            .push_bind(zone.to_string())
            .push(")");
    }
    if !search.ids.is_empty() {
        qb.push(" AND n.id IN (");
        let mut ids = qb.separated(", ");
        for id in &search.ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");
    }
}

impl SupervisoryNodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<SupervisoryNode> {
        let id = codec::uuid(row, "id")?;
        let children: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM supervisory_nodes WHERE parent_node_id = ? ORDER BY code",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        let group: Option<String> = sqlx::query_scalar(
            "SELECT id FROM requisition_groups WHERE supervisory_node_id = ? ORDER BY code LIMIT 1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(SupervisoryNode {
            id,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            facility_id: codec::opt_uuid(row, "facility_id")?,
            parent_node_id: codec::opt_uuid(row, "parent_node_id")?,
            child_node_ids: Some(
                children
                    .iter()
                    .map(|raw| codec::parse_uuid("id", raw))
                    .collect::<Result<Vec<_>>>()?,
            ),
            requisition_group_id: group
                .map(|raw| codec::parse_uuid("id", &raw))
                .transpose()?,
        })
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> Result<Vec<SupervisoryNode>> {
        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            nodes.push(self.hydrate(row).await?);
        }
        Ok(nodes)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SupervisoryNode>> {
        let row = sqlx::query("SELECT * FROM supervisory_nodes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM supervisory_nodes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<SupervisoryNode>> {
        let row = sqlx::query("SELECT * FROM supervisory_nodes WHERE code = ? COLLATE NOCASE")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Insert or update the node, re-pointing the referenced requisition
    /// group at it. A present child list replaces the node's children; an
    /// absent one keeps them.
    pub async fn save(&self, node: &SupervisoryNode) -> Result<()> {
        let id = node.id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO supervisory_nodes (id, code, name, description, facility_id, parent_node_id)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name,
             description = excluded.description, facility_id = excluded.facility_id,
             parent_node_id = excluded.parent_node_id",
        )
        .bind(&id)
        .bind(node.code.trim())
        .bind(&node.name)
        .bind(&node.description)
        .bind(opt_string(node.facility_id))
        .bind(opt_string(node.parent_node_id))
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;

        if let Some(children) = &node.child_node_ids {
            sqlx::query(
                "UPDATE supervisory_nodes SET parent_node_id = NULL WHERE parent_node_id = ?",
            )
            .bind(&id)
            .execute(&mut *tx)
            .await?;
            for child in children.iter().filter(|child| **child != node.id) {
                sqlx::query("UPDATE supervisory_nodes SET parent_node_id = ? WHERE id = ?")
                    .bind(&id)
                    .bind(child.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(PersistenceError::classify)?;
            }
        }

        if let Some(group) = node.requisition_group_id {
            sqlx::query("UPDATE requisition_groups SET supervisory_node_id = ? WHERE id = ?")
                .bind(&id)
                .bind(group.to_string())
                .execute(&mut *tx)
                .await
                .map_err(PersistenceError::classify)?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM supervisory_nodes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn search(
        &self,
        search: &SupervisoryNodeSearch,
        pageable: Pageable,
    ) -> Result<Page<SupervisoryNode>> {
        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM supervisory_nodes n WHERE 1 = 1");
        push_node_filters(&mut count, search);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let (limit, offset) = limit_offset(pageable);
        let mut select = QueryBuilder::<Sqlite>::new("SELECT n.* FROM supervisory_nodes n WHERE 1 = 1");
        push_node_filters(&mut select, search);
        select
            .push(" ORDER BY n.code LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build().fetch_all(&self.pool).await?;
        let content = self.hydrate_all(&rows).await?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }

    pub async fn find_all(&self) -> Result<Vec<SupervisoryNode>> {
        let rows = sqlx::query("SELECT * FROM supervisory_nodes ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_all(&rows).await
    }

    /// Node tree plus group coverage, the input of supervision expansion.
    pub async fn load_snapshot(&self) -> Result<SupervisionSnapshot> {
        let node_rows = sqlx::query("SELECT id, parent_node_id FROM supervisory_nodes")
            .fetch_all(&self.pool)
            .await?;
        let nodes = node_rows
            .iter()
            .map(|row| -> Result<(Uuid, Option<Uuid>)> {
                Ok((codec::uuid(row, "id")?, codec::opt_uuid(row, "parent_node_id")?))
            })
            .collect::<Result<Vec<_>>>()?;

        let coverage_rows = sqlx::query(
            "SELECT rg.supervisory_node_id AS node_id, p.program_id, m.facility_id
             FROM requisition_groups rg
             JOIN requisition_group_programs p ON p.requisition_group_id = rg.id
             JOIN requisition_group_members m ON m.requisition_group_id = rg.id",
        )
        .fetch_all(&self.pool)
        .await?;
        let coverage = coverage_rows
            .iter()
            .map(|row| -> Result<(Uuid, Uuid, Uuid)> {
                Ok((
                    codec::uuid(row, "node_id")?,
                    codec::uuid(row, "program_id")?,
                    codec::uuid(row, "facility_id")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SupervisionSnapshot { nodes, coverage })
    }
}

#[derive(Debug, Clone)]
pub struct RequisitionGroupRepository {
    pool: SqlitePool,
}

impl RequisitionGroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<RequisitionGroup> {
        let id = codec::uuid(row, "id")?;
        let members: Vec<String> = sqlx::query_scalar(
            "SELECT facility_id FROM requisition_group_members WHERE requisition_group_id = ?
             ORDER BY facility_id",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        let programs: Vec<String> = sqlx::query_scalar(
            "SELECT program_id FROM requisition_group_programs WHERE requisition_group_id = ?
             ORDER BY program_id",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(RequisitionGroup {
            id,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            supervisory_node_id: codec::uuid(row, "supervisory_node_id")?,
            member_facility_ids: members
                .iter()
                .map(|raw| codec::parse_uuid("facility_id", raw))
                .collect::<Result<Vec<_>>>()?,
            program_ids: programs
                .iter()
                .map(|raw| codec::parse_uuid("program_id", raw))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RequisitionGroup>> {
        let row = sqlx::query("SELECT * FROM requisition_groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM requisition_groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<RequisitionGroup>> {
        let row = sqlx::query("SELECT * FROM requisition_groups WHERE code = ? COLLATE NOCASE")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, group: &RequisitionGroup) -> Result<()> {
        let id = group.id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO requisition_groups (id, code, name, description, supervisory_node_id)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name,
             description = excluded.description, supervisory_node_id = excluded.supervisory_node_id",
        )
        .bind(&id)
        .bind(group.code.trim())
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.supervisory_node_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;

        sqlx::query("DELETE FROM requisition_group_members WHERE requisition_group_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        for facility in &group.member_facility_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO requisition_group_members (requisition_group_id, facility_id)
                 VALUES (?, ?)",
            )
            .bind(&id)
            .bind(facility.to_string())
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::classify)?;
        }

        sqlx::query("DELETE FROM requisition_group_programs WHERE requisition_group_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        for program in &group.program_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO requisition_group_programs (requisition_group_id, program_id)
                 VALUES (?, ?)",
            )
            .bind(&id)
            .bind(program.to_string())
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::classify)?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM requisition_groups WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_page(&self, pageable: Pageable) -> Result<Page<RequisitionGroup>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM requisition_groups")
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query("SELECT * FROM requisition_groups ORDER BY code LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let mut content = Vec::with_capacity(rows.len());
        for row in &rows {
            content.push(self.hydrate(row).await?);
        }
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

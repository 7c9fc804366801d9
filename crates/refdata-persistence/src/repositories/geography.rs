//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Geographic zone, facility type and facility storage."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::collections::HashMap;

use refdata_domain::{Facility, FacilityType, GeographicZone, Page, Pageable, SupportedProgram};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{limit_offset, to_u64};
use crate::codec::{self, date_string, opt_string};
use crate::{PersistenceError, Result};

#[derive(Debug, Clone)]
pub struct GeographicZoneRepository {
    pool: SqlitePool,
}

fn zone_from_row(row: &SqliteRow) -> Result<GeographicZone> {
    Ok(GeographicZone {
        id: codec::uuid(row, "id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        parent_id: codec::opt_uuid(row, "parent_id")?,
    })
}

impl GeographicZoneRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<GeographicZone>> {
        let row = sqlx::query("SELECT * FROM geographic_zones WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(zone_from_row).transpose()
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<GeographicZone>> {
        let row = sqlx::query("SELECT * FROM geographic_zones WHERE code = ? COLLATE NOCASE")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(zone_from_row).transpose()
    }

    pub async fn save(&self, zone: &GeographicZone) -> Result<()> {
        sqlx::query(
            "INSERT INTO geographic_zones (id, code, name, parent_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name,
             parent_id = excluded.parent_id",
        )
        .bind(zone.id.to_string())
        .bind(zone.code.trim())
        .bind(&zone.name)
        .bind(opt_string(zone.parent_id))
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::classify)?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM geographic_zones WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_page(&self, pageable: Pageable) -> Result<Page<GeographicZone>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geographic_zones")
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query("SELECT * FROM geographic_zones ORDER BY code LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let content = rows.iter().map(zone_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

#[derive(Debug, Clone)]
pub struct FacilityTypeRepository {
    pool: SqlitePool,
}

fn facility_type_from_row(row: &SqliteRow) -> Result<FacilityType> {
    Ok(FacilityType {
        id: codec::uuid(row, "id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        display_order: row.try_get("display_order")?,
        active: row.try_get("active")?,
    })
}

impl FacilityTypeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FacilityType>> {
        let row = sqlx::query("SELECT * FROM facility_types WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(facility_type_from_row).transpose()
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<FacilityType>> {
        let row = sqlx::query("SELECT * FROM facility_types WHERE code = ? COLLATE NOCASE")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(facility_type_from_row).transpose()
    }

    pub async fn save(&self, facility_type: &FacilityType) -> Result<()> {
        sqlx::query(
            "INSERT INTO facility_types (id, code, name, description, display_order, active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name,
             description = excluded.description, display_order = excluded.display_order,
             active = excluded.active",
        )
        .bind(facility_type.id.to_string())
        .bind(facility_type.code.trim())
        .bind(&facility_type.name)
        .bind(&facility_type.description)
        .bind(facility_type.display_order)
        .bind(facility_type.active)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::classify)?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM facility_types WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_page(&self, pageable: Pageable) -> Result<Page<FacilityType>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM facility_types")
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query(
            "SELECT * FROM facility_types ORDER BY display_order IS NULL, display_order, code
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let content = rows
            .iter()
            .map(facility_type_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

/// Optional facility filters; `code` and `name` match case-insensitive substrings.
#[derive(Debug, Clone, Default)]
pub struct FacilitySearch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub zone_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct FacilityRepository {
    pool: SqlitePool,
}

fn push_facility_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &FacilitySearch) {
    if let Some(code) = &search.code {
        qb.push(" AND code LIKE ").push_bind(format!("%{}%", code.trim()));
    }
    if let Some(name) = &search.name {
        qb.push(" AND name LIKE ").push_bind(format!("%{}%", name.trim()));
    }
    if let Some(zone) = search.zone_id {
        qb.push(" AND geographic_zone_id = ").push_bind(zone.to_string());
    }
}

impl FacilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Facility> {
        let id = codec::uuid(row, "id")?;
        let programs = sqlx::query(
            "SELECT program_id, active, start_date FROM facility_supported_programs
             WHERE facility_id = ? ORDER BY program_id",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        let supported_programs = programs
            .iter()
            .map(|p| -> Result<SupportedProgram> {
                Ok(SupportedProgram {
                    program_id: codec::uuid(p, "program_id")?,
                    active: p.try_get("active")?,
                    start_date: codec::opt_date(p, "start_date")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Facility {
            id,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            geographic_zone_id: codec::uuid(row, "geographic_zone_id")?,
            type_id: codec::uuid(row, "type_id")?,
            active: row.try_get("active")?,
            enabled: row.try_get("enabled")?,
            go_live_date: codec::opt_date(row, "go_live_date")?,
            go_down_date: codec::opt_date(row, "go_down_date")?,
            supported_programs,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Facility>> {
        let row = sqlx::query("SELECT * FROM facilities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM facilities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Facility>> {
        let row = sqlx::query("SELECT * FROM facilities WHERE code = ? COLLATE NOCASE")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Facility codes keyed by id, for exports that print codes.
    pub async fn codes_by_id(&self) -> Result<HashMap<Uuid, String>> {
        let rows = sqlx::query("SELECT id, code FROM facilities")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<(Uuid, String)> {
                Ok((codec::uuid(row, "id")?, row.try_get("code")?))
            })
            .collect()
    }

    pub async fn save(&self, facility: &Facility) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO facilities (id, code, name, description, geographic_zone_id, type_id,
             active, enabled, go_live_date, go_down_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name,
             description = excluded.description, geographic_zone_id = excluded.geographic_zone_id,
             type_id = excluded.type_id, active = excluded.active, enabled = excluded.enabled,
             go_live_date = excluded.go_live_date, go_down_date = excluded.go_down_date",
        )
        .bind(facility.id.to_string())
        .bind(facility.code.trim())
        .bind(&facility.name)
        .bind(&facility.description)
        .bind(facility.geographic_zone_id.to_string())
        .bind(facility.type_id.to_string())
        .bind(facility.active)
        .bind(facility.enabled)
        .bind(date_string(facility.go_live_date))
        .bind(date_string(facility.go_down_date))
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;

        sqlx::query("DELETE FROM facility_supported_programs WHERE facility_id = ?")
            .bind(facility.id.to_string())
            .execute(&mut *tx)
            .await?;
        for program in &facility.supported_programs {
            sqlx::query(
                "INSERT OR REPLACE INTO facility_supported_programs
                 (facility_id, program_id, active, start_date) VALUES (?, ?, ?, ?)",
            )
            .bind(facility.id.to_string())
            .bind(program.program_id.to_string())
            .bind(program.active)
            .bind(date_string(program.start_date))
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::classify)?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM facilities WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::classify)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn search(&self, search: &FacilitySearch, pageable: Pageable) -> Result<Page<Facility>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM facilities WHERE 1 = 1");
        push_facility_filters(&mut count, search);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let (limit, offset) = limit_offset(pageable);
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM facilities WHERE 1 = 1");
        push_facility_filters(&mut select, search);
        select
            .push(" ORDER BY code LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build().fetch_all(&self.pool).await?;

        let mut content = Vec::with_capacity(rows.len());
        for row in &rows {
            content.push(self.hydrate(row).await?);
        }
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

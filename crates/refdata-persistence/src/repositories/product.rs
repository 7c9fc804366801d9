//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Orderable, trade item, display category and approved product storage."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Orderables are versioned: every update stores a new `(id, version_number)`
//! row and reads return the highest version unless a version is requested.

use chrono::{DateTime, Utc};
use refdata_domain::{
    FacilityTypeApprovedProduct, Orderable, OrderableDisplayCategory, Page, Pageable,
    ProgramOrderable, TradeItem, TradeItemClassification,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{limit_offset, to_u64};
use crate::codec::{self, opt_string};
use crate::{PersistenceError, Result};

#[derive(Debug, Clone)]
pub struct OrderableDisplayCategoryRepository {
    pool: SqlitePool,
}

fn category_from_row(row: &SqliteRow) -> Result<OrderableDisplayCategory> {
    Ok(OrderableDisplayCategory {
        id: codec::uuid(row, "id")?,
        code: row.try_get("code")?,
        display_name: row.try_get("display_name")?,
        display_order: row.try_get("display_order")?,
    })
}

impl OrderableDisplayCategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderableDisplayCategory>> {
        let row = sqlx::query("SELECT * FROM orderable_display_categories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<OrderableDisplayCategory>> {
        let row = sqlx::query(
            "SELECT * FROM orderable_display_categories WHERE code = ? COLLATE NOCASE",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    pub async fn save(&self, category: &OrderableDisplayCategory) -> Result<()> {
        sqlx::query(
            "INSERT INTO orderable_display_categories (id, code, display_name, display_order)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code,
             display_name = excluded.display_name, display_order = excluded.display_order",
        )
        .bind(category.id.to_string())
        .bind(category.code.trim())
        .bind(&category.display_name)
        .bind(category.display_order)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::classify)?;
        Ok(())
    }

    pub async fn find_page(&self, pageable: Pageable) -> Result<Page<OrderableDisplayCategory>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orderable_display_categories")
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query(
            "SELECT * FROM orderable_display_categories ORDER BY display_order, code
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let content = rows.iter().map(category_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

/// Orderable search filters. `code` and `name` match case-insensitive
/// substrings, `program_code` must equal a linked program's code.
#[derive(Debug, Clone, Default)]
pub struct OrderableSearch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub program_code: Option<String>,
}

impl OrderableSearch {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none() && self.program_code.is_none()
    }
}

const LATEST_VERSION: &str =
    " o.version_number = (SELECT MAX(x.version_number) FROM orderables x WHERE x.id = o.id)";

fn push_orderable_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &OrderableSearch) {
    if let Some(code) = &search.code {
        qb.push(" AND o.product_code LIKE ")
            .push_bind(format!("%{}%", code.trim()));
    }
    if let Some(name) = &search.name {
        qb.push(" AND o.full_product_name LIKE ")
            .push_bind(format!("%{}%", name.trim()));
    }
    if let Some(program) = &search.program_code {
        qb.push(
            " AND EXISTS (SELECT 1 FROM program_orderables po JOIN programs p ON p.id = po.program_id
              WHERE po.orderable_id = o.id AND po.orderable_version_number = o.version_number
              AND p.code = ",
        )
        .push_bind(program.trim().to_owned())
        .push(" COLLATE NOCASE)");
    }
}

fn push_id_filter(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    qb.push(" AND o.id IN (");
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(id.to_string());
    }
    list.push_unseparated(")");
}

#[derive(Debug, Clone)]
pub struct OrderableRepository {
    pool: SqlitePool,
}

impl OrderableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Orderable> {
        let id = codec::uuid(row, "id")?;
        let version_number: i64 = row.try_get("version_number")?;
        let program_rows = sqlx::query(
            "SELECT * FROM program_orderables WHERE orderable_id = ? AND orderable_version_number = ?
             ORDER BY display_order, program_id",
        )
        .bind(id.to_string())
        .bind(version_number)
        .fetch_all(&self.pool)
        .await?;

        let mut programs = Vec::with_capacity(program_rows.len());
        for p in &program_rows {
            let price: String = p.try_get("price_per_pack")?;
            programs.push(ProgramOrderable {
                orderable_id: id,
                program_id: codec::uuid(p, "program_id")?,
                orderable_display_category_id: codec::uuid(p, "orderable_display_category_id")?,
                doses_per_patient: p.try_get("doses_per_patient")?,
                active: p.try_get("active")?,
                full_supply: p.try_get("full_supply")?,
                display_order: p.try_get("display_order")?,
                max_months_stock: p.try_get("max_months_stock")?,
                price_per_pack: price.parse()?,
            });
        }

        let dispensable: String = row.try_get("dispensable")?;
        let identifiers: String = row.try_get("identifiers")?;
        let extra_data: String = row.try_get("extra_data")?;
        Ok(Orderable {
            id,
            version_number,
            product_code: row.try_get("product_code")?,
            full_product_name: row.try_get("full_product_name")?,
            description: row.try_get("description")?,
            dispensable: serde_json::from_str(&dispensable)?,
            net_content: row.try_get("net_content")?,
            pack_rounding_threshold: row.try_get("pack_rounding_threshold")?,
            round_to_zero: row.try_get("round_to_zero")?,
            trade_item_id: codec::opt_uuid(row, "trade_item_id")?,
            programs,
            identifiers: serde_json::from_str(&identifiers)?,
            extra_data: serde_json::from_str(&extra_data)?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> Result<Vec<Orderable>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    /// Store `orderable` as a new version row. Existing versions are immutable.
    pub async fn insert_version(&self, orderable: &Orderable) -> Result<()> {
        let id = orderable.id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orderables (id, version_number, product_code, full_product_name,
             description, dispensable, net_content, pack_rounding_threshold, round_to_zero,
             trade_item_id, identifiers, extra_data, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(orderable.version_number)
        .bind(orderable.product_code.trim())
        .bind(&orderable.full_product_name)
        .bind(&orderable.description)
        .bind(serde_json::to_string(&orderable.dispensable)?)
        .bind(orderable.net_content)
        .bind(orderable.pack_rounding_threshold)
        .bind(orderable.round_to_zero)
        .bind(opt_string(orderable.trade_item_id))
        .bind(serde_json::to_string(&orderable.identifiers)?)
        .bind(serde_json::to_string(&orderable.extra_data)?)
        .bind(orderable.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;

        for program in &orderable.programs {
            sqlx::query(
                "INSERT INTO program_orderables (orderable_id, orderable_version_number, program_id,
                 orderable_display_category_id, doses_per_patient, active, full_supply,
                 display_order, max_months_stock, price_per_pack)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(orderable.version_number)
            .bind(program.program_id.to_string())
            .bind(program.orderable_display_category_id.to_string())
            .bind(program.doses_per_patient)
            .bind(program.active)
            .bind(program.full_supply)
            .bind(program.display_order)
            .bind(program.max_months_stock)
            .bind(program.price_per_pack.as_str())
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::classify)?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn find_latest(&self, id: Uuid) -> Result<Option<Orderable>> {
        let row = sqlx::query(
            "SELECT * FROM orderables WHERE id = ? ORDER BY version_number DESC LIMIT 1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_version(&self, id: Uuid, version_number: i64) -> Result<Option<Orderable>> {
        let row = sqlx::query("SELECT * FROM orderables WHERE id = ? AND version_number = ?")
            .bind(id.to_string())
            .bind(version_number)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orderables WHERE id = ? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Latest version of the orderable with this product code, if any.
    pub async fn find_latest_by_product_code(&self, code: &str) -> Result<Option<Orderable>> {
        let row = sqlx::query(&format!(
            "SELECT o.* FROM orderables o WHERE o.product_code = ? COLLATE NOCASE AND{LATEST_VERSION}"
        ))
        .bind(code.trim().to_owned())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn page_of(
        &self,
        search: &OrderableSearch,
        ids: Option<&[Uuid]>,
        pageable: Pageable,
    ) -> Result<Page<Orderable>> {
        let where_clause = format!(" FROM orderables o WHERE{LATEST_VERSION}");

        let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*){where_clause}"));
        push_orderable_filters(&mut count, search);
        if let Some(ids) = ids {
            push_id_filter(&mut count, ids);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let (limit, offset) = limit_offset(pageable);
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT o.*{where_clause}"));
        push_orderable_filters(&mut select, search);
        if let Some(ids) = ids {
            push_id_filter(&mut select, ids);
        }
        select
            .push(" ORDER BY o.full_product_name, o.product_code LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build().fetch_all(&self.pool).await?;
        let content = self.hydrate_all(&rows).await?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }

    pub async fn find_all_latest(&self, pageable: Pageable) -> Result<Page<Orderable>> {
        self.page_of(&OrderableSearch::default(), None, pageable).await
    }

    pub async fn find_all_latest_by_ids(
        &self,
        ids: &[Uuid],
        pageable: Pageable,
    ) -> Result<Page<Orderable>> {
        if ids.is_empty() {
            return Ok(Page::new(Vec::new(), pageable, 0));
        }
        self.page_of(&OrderableSearch::default(), Some(ids), pageable)
            .await
    }

    pub async fn search(&self, search: &OrderableSearch, pageable: Pageable) -> Result<Page<Orderable>> {
        self.page_of(search, None, pageable).await
    }

    async fn latest_modified(
        &self,
        search: &OrderableSearch,
        ids: Option<&[Uuid]>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT MAX(o.last_updated) FROM orderables o WHERE{LATEST_VERSION}"
        ));
        push_orderable_filters(&mut query, search);
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(None);
            }
            push_id_filter(&mut query, ids);
        }
        let raw: Option<String> = query.build_query_scalar().fetch_one(&self.pool).await?;
        raw.map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| PersistenceError::Corrupt {
                    column: "last_updated",
                    value: raw,
                })
        })
        .transpose()
    }

    pub async fn find_latest_modified_date_of_all(&self) -> Result<Option<DateTime<Utc>>> {
        self.latest_modified(&OrderableSearch::default(), None).await
    }

    pub async fn find_latest_modified_date_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Option<DateTime<Utc>>> {
        self.latest_modified(&OrderableSearch::default(), Some(ids))
            .await
    }

    pub async fn find_latest_modified_date_by_params(
        &self,
        search: &OrderableSearch,
    ) -> Result<Option<DateTime<Utc>>> {
        self.latest_modified(search, None).await
    }

    /// Ids of latest orderable versions referencing the trade item.
    pub async fn find_ids_by_trade_item(&self, trade_item_id: Uuid) -> Result<Vec<Uuid>> {
        let raw: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT o.id FROM orderables o WHERE o.trade_item_id = ? AND{LATEST_VERSION}
             ORDER BY o.id"
        ))
        .bind(trade_item_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        raw.iter().map(|raw| codec::parse_uuid("id", raw)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct TradeItemRepository {
    pool: SqlitePool,
}

impl TradeItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<TradeItem> {
        let id = codec::uuid(row, "id")?;
        let classifications = sqlx::query(
            "SELECT classification_system, classification_id FROM trade_item_classifications
             WHERE trade_item_id = ? ORDER BY classification_system",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|c| -> Result<TradeItemClassification> {
            Ok(TradeItemClassification {
                classification_system: c.try_get("classification_system")?,
                classification_id: c.try_get("classification_id")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(TradeItem {
            id,
            manufacturer_of_trade_item: row.try_get("manufacturer_of_trade_item")?,
            classifications,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TradeItem>> {
        let row = sqlx::query("SELECT * FROM trade_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM trade_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn save(&self, item: &TradeItem) -> Result<()> {
        let id = item.id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO trade_items (id, manufacturer_of_trade_item) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET
             manufacturer_of_trade_item = excluded.manufacturer_of_trade_item",
        )
        .bind(&id)
        .bind(&item.manufacturer_of_trade_item)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::classify)?;

        sqlx::query("DELETE FROM trade_item_classifications WHERE trade_item_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        for classification in &item.classifications {
            sqlx::query(
                "INSERT OR REPLACE INTO trade_item_classifications
                 (trade_item_id, classification_system, classification_id) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(&classification.classification_system)
            .bind(&classification.classification_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All trade items, optionally only those carrying `classification_id`.
    pub async fn find_all(&self, classification_id: Option<&str>) -> Result<Vec<TradeItem>> {
        let rows = match classification_id {
            Some(classification) => {
                sqlx::query(
                    "SELECT t.* FROM trade_items t WHERE EXISTS (
                     SELECT 1 FROM trade_item_classifications c
                     WHERE c.trade_item_id = t.id AND c.classification_id = ?)
                     ORDER BY t.id",
                )
                .bind(classification.to_owned())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM trade_items ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(self.hydrate(row).await?);
        }
        Ok(items)
    }
}

#[derive(Debug, Clone)]
pub struct FacilityTypeApprovedProductRepository {
    pool: SqlitePool,
}

fn approved_product_from_row(row: &SqliteRow) -> Result<FacilityTypeApprovedProduct> {
    Ok(FacilityTypeApprovedProduct {
        id: codec::uuid(row, "id")?,
        facility_type_id: codec::uuid(row, "facility_type_id")?,
        orderable_id: codec::uuid(row, "orderable_id")?,
        program_id: codec::uuid(row, "program_id")?,
        max_periods_of_stock: row.try_get("max_periods_of_stock")?,
        min_periods_of_stock: row.try_get("min_periods_of_stock")?,
        emergency_order_point: row.try_get("emergency_order_point")?,
        active: row.try_get("active")?,
    })
}

impl FacilityTypeApprovedProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FacilityTypeApprovedProduct>> {
        let row = sqlx::query("SELECT * FROM facility_type_approved_products WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(approved_product_from_row).transpose()
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    pub async fn find_by_facility_type_orderable_program(
        &self,
        facility_type_id: Uuid,
        orderable_id: Uuid,
        program_id: Uuid,
    ) -> Result<Option<FacilityTypeApprovedProduct>> {
        let row = sqlx::query(
            "SELECT * FROM facility_type_approved_products
             WHERE facility_type_id = ? AND orderable_id = ? AND program_id = ?",
        )
        .bind(facility_type_id.to_string())
        .bind(orderable_id.to_string())
        .bind(program_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(approved_product_from_row).transpose()
    }

    pub async fn save(&self, product: &FacilityTypeApprovedProduct) -> Result<()> {
        sqlx::query(
            "INSERT INTO facility_type_approved_products (id, facility_type_id, orderable_id,
             program_id, max_periods_of_stock, min_periods_of_stock, emergency_order_point, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET facility_type_id = excluded.facility_type_id,
             orderable_id = excluded.orderable_id, program_id = excluded.program_id,
             max_periods_of_stock = excluded.max_periods_of_stock,
             min_periods_of_stock = excluded.min_periods_of_stock,
             emergency_order_point = excluded.emergency_order_point, active = excluded.active",
        )
        .bind(product.id.to_string())
        .bind(product.facility_type_id.to_string())
        .bind(product.orderable_id.to_string())
        .bind(product.program_id.to_string())
        .bind(product.max_periods_of_stock)
        .bind(product.min_periods_of_stock)
        .bind(product.emergency_order_point)
        .bind(product.active)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::classify)?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM facility_type_approved_products WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active approved products for the facility type and program codes.
    pub async fn search_products(
        &self,
        facility_type_code: &str,
        program_code: &str,
        pageable: Pageable,
    ) -> Result<Page<FacilityTypeApprovedProduct>> {
        const FROM: &str = " FROM facility_type_approved_products f
             JOIN facility_types ft ON ft.id = f.facility_type_id
             JOIN programs p ON p.id = f.program_id
             WHERE f.active = 1 AND ft.code = ? COLLATE NOCASE AND p.code = ? COLLATE NOCASE";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*){FROM}"))
            .bind(facility_type_code.trim().to_owned())
            .bind(program_code.trim().to_owned())
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(pageable);
        let rows = sqlx::query(&format!(
            "SELECT f.*{FROM} ORDER BY f.orderable_id LIMIT ? OFFSET ?"
        ))
        .bind(facility_type_code.trim().to_owned())
        .bind(program_code.trim().to_owned())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let content = rows
            .iter()
            .map(approved_product_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, pageable, to_u64(total)))
    }
}

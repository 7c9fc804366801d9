//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Versioned schema migrations."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Schema migrations. Versions are applied in order and recorded in
//! `_migrations`; each version runs at most once per database.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::{PersistenceError, Result};

/// Latest schema version known to this build.
pub const CURRENT_VERSION: i64 = 3;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: reference data schema.
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS geographic_zones (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT,
        parent_id TEXT REFERENCES geographic_zones(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS facility_types (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT,
        description TEXT,
        display_order INTEGER,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS programs (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT,
        description TEXT,
        active INTEGER NOT NULL DEFAULT 0,
        periods_skippable INTEGER NOT NULL DEFAULT 0,
        show_non_full_supply_tab INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS facilities (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT NOT NULL,
        description TEXT,
        geographic_zone_id TEXT NOT NULL REFERENCES geographic_zones(id),
        type_id TEXT NOT NULL REFERENCES facility_types(id),
        active INTEGER NOT NULL DEFAULT 1,
        enabled INTEGER NOT NULL DEFAULT 1,
        go_live_date TEXT,
        go_down_date TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_facilities_zone ON facilities(geographic_zone_id);

    CREATE TABLE IF NOT EXISTS facility_supported_programs (
        facility_id TEXT NOT NULL REFERENCES facilities(id) ON DELETE CASCADE,
        program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
        active INTEGER NOT NULL DEFAULT 1,
        start_date TEXT,
        PRIMARY KEY (facility_id, program_id)
    );

    CREATE TABLE IF NOT EXISTS supervisory_nodes (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT,
        description TEXT,
        facility_id TEXT REFERENCES facilities(id) ON DELETE SET NULL,
        parent_node_id TEXT REFERENCES supervisory_nodes(id) ON DELETE SET NULL
    );

    CREATE INDEX IF NOT EXISTS idx_supervisory_nodes_parent ON supervisory_nodes(parent_node_id);

    CREATE TABLE IF NOT EXISTS requisition_groups (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT NOT NULL,
        description TEXT,
        supervisory_node_id TEXT NOT NULL REFERENCES supervisory_nodes(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_requisition_groups_node ON requisition_groups(supervisory_node_id);

    CREATE TABLE IF NOT EXISTS requisition_group_members (
        requisition_group_id TEXT NOT NULL REFERENCES requisition_groups(id) ON DELETE CASCADE,
        facility_id TEXT NOT NULL REFERENCES facilities(id) ON DELETE CASCADE,
        PRIMARY KEY (requisition_group_id, facility_id)
    );

    CREATE TABLE IF NOT EXISTS requisition_group_programs (
        requisition_group_id TEXT NOT NULL REFERENCES requisition_groups(id) ON DELETE CASCADE,
        program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
        PRIMARY KEY (requisition_group_id, program_id)
    );

    CREATE TABLE IF NOT EXISTS orderable_display_categories (
        id TEXT PRIMARY KEY NOT NULL,
        code TEXT NOT NULL UNIQUE COLLATE NOCASE,
        display_name TEXT NOT NULL,
        display_order INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS trade_items (
        id TEXT PRIMARY KEY NOT NULL,
        manufacturer_of_trade_item TEXT
    );

    CREATE TABLE IF NOT EXISTS trade_item_classifications (
        trade_item_id TEXT NOT NULL REFERENCES trade_items(id) ON DELETE CASCADE,
        classification_system TEXT NOT NULL,
        classification_id TEXT NOT NULL,
        PRIMARY KEY (trade_item_id, classification_system)
    );

    CREATE TABLE IF NOT EXISTS orderables (
        id TEXT NOT NULL,
        version_number INTEGER NOT NULL,
        product_code TEXT NOT NULL COLLATE NOCASE,
        full_product_name TEXT NOT NULL,
        description TEXT,
        dispensable TEXT NOT NULL,
        net_content INTEGER NOT NULL DEFAULT 0,
        pack_rounding_threshold INTEGER NOT NULL DEFAULT 0,
        round_to_zero INTEGER NOT NULL DEFAULT 0,
        trade_item_id TEXT REFERENCES trade_items(id) ON DELETE SET NULL,
        identifiers TEXT NOT NULL DEFAULT '{}',
        extra_data TEXT NOT NULL DEFAULT '{}',
        last_updated TEXT NOT NULL,
        PRIMARY KEY (id, version_number)
    );

    CREATE INDEX IF NOT EXISTS idx_orderables_code ON orderables(product_code);

    CREATE TABLE IF NOT EXISTS program_orderables (
        orderable_id TEXT NOT NULL,
        orderable_version_number INTEGER NOT NULL,
        program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
        orderable_display_category_id TEXT NOT NULL REFERENCES orderable_display_categories(id),
        doses_per_patient INTEGER,
        active INTEGER NOT NULL DEFAULT 1,
        full_supply INTEGER NOT NULL DEFAULT 1,
        display_order INTEGER NOT NULL DEFAULT 0,
        max_months_stock INTEGER NOT NULL DEFAULT 0,
        price_per_pack TEXT NOT NULL DEFAULT '0.00',
        PRIMARY KEY (orderable_id, orderable_version_number, program_id),
        FOREIGN KEY (orderable_id, orderable_version_number)
            REFERENCES orderables(id, version_number) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS facility_type_approved_products (
        id TEXT PRIMARY KEY NOT NULL,
        facility_type_id TEXT NOT NULL REFERENCES facility_types(id) ON DELETE CASCADE,
        orderable_id TEXT NOT NULL,
        program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
        max_periods_of_stock REAL NOT NULL,
        min_periods_of_stock REAL,
        emergency_order_point REAL,
        active INTEGER NOT NULL DEFAULT 1,
        UNIQUE (facility_type_id, orderable_id, program_id)
    );

    CREATE TABLE IF NOT EXISTS rights (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL CHECK (type IN ('GENERAL_ADMIN', 'SUPERVISION', 'ORDER_FULFILLMENT', 'REPORTS')),
        description TEXT,
        attachment_ids TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS roles (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS role_rights (
        role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        right_id TEXT NOT NULL REFERENCES rights(id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, right_id)
    );

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        first_name TEXT,
        last_name TEXT,
        email TEXT,
        job_title TEXT,
        timezone TEXT,
        home_facility_id TEXT REFERENCES facilities(id) ON DELETE SET NULL,
        active INTEGER NOT NULL DEFAULT 1,
        login_restricted INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS role_assignments (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK (kind IN ('DIRECT', 'SUPERVISION', 'FULFILLMENT')),
        program_id TEXT REFERENCES programs(id) ON DELETE CASCADE,
        supervisory_node_id TEXT REFERENCES supervisory_nodes(id) ON DELETE CASCADE,
        warehouse_id TEXT REFERENCES facilities(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_role_assignments_user ON role_assignments(user_id);

    CREATE TABLE IF NOT EXISTS right_assignments (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        right_name TEXT NOT NULL,
        facility_id TEXT,
        program_id TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_right_assignments_lookup
        ON right_assignments(user_id, right_name);
"#;

/// Migration 2: administrative right catalogue.
const MIGRATION_V2: &str = r#"
    INSERT OR IGNORE INTO rights (id, name, type, description) VALUES
        ('0ef8186d-9ea3-43ca-8f1f-7cce3516a21e', 'FACILITIES_MANAGE', 'GENERAL_ADMIN', 'Manage facilities'),
        ('c199ddc1-f069-465a-bc38-dbcccc8b80d5', 'FACILITY_TYPES_MANAGE', 'GENERAL_ADMIN', 'Manage facility types'),
        ('436aa327-eb93-4d71-ad9f-00fd89993bda', 'GEOGRAPHIC_ZONES_MANAGE', 'GENERAL_ADMIN', 'Manage geographic zones'),
        ('c41a8100-7ee0-430e-8d37-991b7fd01973', 'PROGRAMS_MANAGE', 'GENERAL_ADMIN', 'Manage programs'),
        ('6f15c5bb-c1c8-4b7e-bf0d-2b6310118847', 'SUPERVISORY_NODES_MANAGE', 'GENERAL_ADMIN', 'Manage supervisory nodes'),
        ('69618592-c75f-4e14-9767-4ba61f0af613', 'REQUISITION_GROUPS_MANAGE', 'GENERAL_ADMIN', 'Manage requisition groups'),
        ('1c7c151b-bb2e-4c10-bed1-dec961508cb2', 'ORDERABLES_MANAGE', 'GENERAL_ADMIN', 'Manage orderables'),
        ('4ba37e38-c850-45ec-af15-a8b1c85358ef', 'FACILITY_APPROVED_ORDERABLES_MANAGE', 'GENERAL_ADMIN', 'Manage facility type approved products'),
        ('613a3355-6dea-40aa-bf1a-456a899a1366', 'USERS_MANAGE', 'GENERAL_ADMIN', 'Manage users'),
        ('6cd486f9-a39f-4bbc-b30d-61ee02d601c9', 'USER_ROLES_MANAGE', 'GENERAL_ADMIN', 'Manage user role assignments'),
        ('e7b5c130-89a5-4fb1-8374-5ceb1e1f3c62', 'ROLES_MANAGE', 'GENERAL_ADMIN', 'Manage roles');
"#;

/// Migration 3: API tokens and the hash-chained audit log.
const MIGRATION_V3: &str = r#"
    CREATE TABLE IF NOT EXISTS api_tokens (
        token_hash TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        label TEXT,
        created_at TEXT NOT NULL,
        expires_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id);

    CREATE TABLE IF NOT EXISTS audit_log (
        sequence INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at TEXT NOT NULL,
        actor_id TEXT,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT 'null',
        previous_hash TEXT,
        hash TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log(entity_type, entity_id);
"#;

const MIGRATIONS: [(i64, &str, &str); 3] = [
    (1, "reference data schema", MIGRATION_V1),
    (2, "administrative rights", MIGRATION_V2),
    (3, "api tokens and audit log", MIGRATION_V3),
];

/// Migration status information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub needs_migration: bool,
}

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply all pending migrations, each inside its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = current_version(pool).await?;
    info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );
    if current >= CURRENT_VERSION {
        debug!("database is up to date");
        return Ok(());
    }

    for (version, label, sql) in MIGRATIONS {
        if version <= current {
            continue;
        }
        info!(version, label, "applying migration");
        let wrap = |source| PersistenceError::Migration { version, source };
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(wrap)?;
        sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;
        tx.commit().await?;
    }

    info!("database migrations completed");
    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> Result<MigrationStatus> {
    let current = current_version(pool).await?;
    Ok(MigrationStatus {
        current_version: current,
        target_version: CURRENT_VERSION,
        needs_migration: current < CURRENT_VERSION,
    })
}

//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Repository handles grouped per aggregate."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use sqlx::SqlitePool;

pub mod access;
pub mod audit;
pub mod geography;
pub mod product;
pub mod program;
pub mod right_assignment;
pub mod supervision;
pub mod token;

use access::{RightRepository, RoleAssignmentRepository, RoleRepository, UserRepository};
use audit::AuditRepository;
use geography::{FacilityRepository, FacilityTypeRepository, GeographicZoneRepository};
use product::{
    FacilityTypeApprovedProductRepository, OrderableDisplayCategoryRepository,
    OrderableRepository, TradeItemRepository,
};
use program::ProgramRepository;
use right_assignment::RightAssignmentRepository;
use supervision::{RequisitionGroupRepository, SupervisoryNodeRepository};
use token::TokenRepository;

/// Every repository over one shared pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub geographic_zones: GeographicZoneRepository,
    pub facility_types: FacilityTypeRepository,
    pub facilities: FacilityRepository,
    pub programs: ProgramRepository,
    pub supervisory_nodes: SupervisoryNodeRepository,
    pub requisition_groups: RequisitionGroupRepository,
    pub orderable_display_categories: OrderableDisplayCategoryRepository,
    pub orderables: OrderableRepository,
    pub trade_items: TradeItemRepository,
    pub approved_products: FacilityTypeApprovedProductRepository,
    pub rights: RightRepository,
    pub roles: RoleRepository,
    pub users: UserRepository,
    pub role_assignments: RoleAssignmentRepository,
    pub right_assignments: RightAssignmentRepository,
    pub tokens: TokenRepository,
    pub audit: AuditRepository,
}

impl Repositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            geographic_zones: GeographicZoneRepository::new(pool.clone()),
            facility_types: FacilityTypeRepository::new(pool.clone()),
            facilities: FacilityRepository::new(pool.clone()),
            programs: ProgramRepository::new(pool.clone()),
            supervisory_nodes: SupervisoryNodeRepository::new(pool.clone()),
            requisition_groups: RequisitionGroupRepository::new(pool.clone()),
            orderable_display_categories: OrderableDisplayCategoryRepository::new(pool.clone()),
            orderables: OrderableRepository::new(pool.clone()),
            trade_items: TradeItemRepository::new(pool.clone()),
            approved_products: FacilityTypeApprovedProductRepository::new(pool.clone()),
            rights: RightRepository::new(pool.clone()),
            roles: RoleRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            role_assignments: RoleAssignmentRepository::new(pool.clone()),
            right_assignments: RightAssignmentRepository::new(pool.clone()),
            tokens: TokenRepository::new(pool.clone()),
            audit: AuditRepository::new(pool),
        }
    }
}

/// Row count helper shared by paged searches.
pub(crate) fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// `LIMIT`/`OFFSET` values for SQLite, clamped to its signed range.
pub(crate) fn limit_offset(pageable: refdata_domain::Pageable) -> (i64, i64) {
    let limit = i64::try_from(pageable.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(pageable.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}

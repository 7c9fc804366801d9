//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Entities, value objects and right catalogue."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Domain model for the reference data service.
//!
//! Entities double as their JSON representation (camelCase). Every entity is
//! identified by a UUID v4 which is generated when a payload omits it.

pub mod assignment;
pub mod error;
pub mod facility;
pub mod messages;
pub mod paging;
pub mod product;
pub mod program;
pub mod right;
pub mod supervision;
pub mod user;
pub mod validation;
pub mod values;

pub use assignment::{IntermediateRightAssignment, RightAssignment};
pub use error::{DomainError, Result};
pub use facility::{Facility, FacilityType, GeographicZone, SupportedProgram};
pub use messages::EntityKind;
pub use paging::{Page, Pageable};
pub use product::{
    FacilityTypeApprovedProduct, Orderable, OrderableDisplayCategory, ProgramOrderable,
    TradeItem, TradeItemClassification,
};
pub use program::Program;
pub use right::{right_names, Right, RightType, Role};
pub use supervision::{ObjectReference, RequisitionGroup, SupervisoryNode};
pub use user::{AssignmentScope, RoleAssignment, User};
pub use validation::validate;
pub use values::{Code, Dispensable, Money};

/// Fresh random identifier for newly created entities.
pub fn new_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}

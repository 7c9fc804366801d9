//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Message keys returned to API clients."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

const PREFIX: &str = "referenceData.error";

pub const ERROR_UNAUTHORIZED: &str = "referenceData.error.unauthorized";
pub const ERROR_AUTHENTICATION_REQUIRED: &str = "referenceData.error.authentication.required";
pub const ERROR_INTERNAL: &str = "referenceData.error.internal";
pub const ERROR_INVALID_REQUEST_BODY: &str = "referenceData.error.request.invalidBody";
pub const ERROR_INVALID_PARAMETER: &str = "referenceData.error.request.invalidParameter";
pub const ERROR_ROLE_RIGHT_TYPES_MIXED: &str = "referenceData.error.role.rightTypesMixed";
pub const ERROR_ROLE_ASSIGNMENT_MISMATCH: &str = "referenceData.error.roleAssignment.typeMismatch";
pub const ERROR_ROLE_ASSIGNMENT_INVALID: &str = "referenceData.error.roleAssignment.invalid";
pub const ERROR_SEARCH_FACILITY_TYPE_REQUIRED: &str =
    "referenceData.error.facilityTypeApprovedProduct.search.facilityType.required";
pub const ERROR_SEARCH_PROGRAM_REQUIRED: &str =
    "referenceData.error.facilityTypeApprovedProduct.search.program.required";
pub const ERROR_MONEY_INVALID: &str = "referenceData.error.money.invalid";
pub const ERROR_CONSTRAINT_VIOLATED: &str = "referenceData.error.constraintViolated";
pub const ERROR_REFERENCE_VIOLATED: &str = "referenceData.error.referenceViolated";

/// Entity families used to build message keys such as
/// `referenceData.error.supervisoryNode.notFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    GeographicZone,
    FacilityType,
    Facility,
    Program,
    SupervisoryNode,
    RequisitionGroup,
    OrderableDisplayCategory,
    Orderable,
    TradeItem,
    FacilityTypeApprovedProduct,
    User,
    Role,
    Right,
}

impl EntityKind {
    pub fn not_found_key(self) -> String {
        format!("{PREFIX}.{self}.notFound")
    }

    pub fn duplicated_key(self) -> String {
        format!("{PREFIX}.{self}.duplicated")
    }

    pub fn code_duplicated_key(self) -> String {
        format!("{PREFIX}.{self}.code.duplicated")
    }

    pub fn field_key(self, field: &str, problem: &str) -> String {
        format!("{PREFIX}.{self}.{field}.{problem}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_camel_case_entity_names() {
        assert_eq!(
            EntityKind::SupervisoryNode.not_found_key(),
            "referenceData.error.supervisoryNode.notFound"
        );
        assert_eq!(
            EntityKind::FacilityTypeApprovedProduct.duplicated_key(),
            "referenceData.error.facilityTypeApprovedProduct.duplicated"
        );
        assert_eq!(
            EntityKind::Facility.field_key("code", "required"),
            "referenceData.error.facility.code.required"
        );
    }
}

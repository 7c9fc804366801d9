//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Rights, right types and roles."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, Result};
use crate::messages::ERROR_ROLE_RIGHT_TYPES_MIXED;
use crate::new_id;
use crate::validation::not_blank;

/// Category of a right; decides which kind of role assignment can carry it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RightType {
    GeneralAdmin,
    Supervision,
    OrderFulfillment,
    Reports,
}

/// Names of the administrative rights seeded at install time.
pub mod right_names {
    pub const FACILITIES_MANAGE: &str = "FACILITIES_MANAGE";
    pub const FACILITY_TYPES_MANAGE: &str = "FACILITY_TYPES_MANAGE";
    pub const GEOGRAPHIC_ZONES_MANAGE: &str = "GEOGRAPHIC_ZONES_MANAGE";
    pub const PROGRAMS_MANAGE: &str = "PROGRAMS_MANAGE";
    pub const SUPERVISORY_NODES_MANAGE: &str = "SUPERVISORY_NODES_MANAGE";
    pub const REQUISITION_GROUPS_MANAGE: &str = "REQUISITION_GROUPS_MANAGE";
    pub const ORDERABLES_MANAGE: &str = "ORDERABLES_MANAGE";
    pub const FACILITY_APPROVED_ORDERABLES_MANAGE: &str = "FACILITY_APPROVED_ORDERABLES_MANAGE";
    pub const USERS_MANAGE: &str = "USERS_MANAGE";
    pub const USER_ROLES_MANAGE: &str = "USER_ROLES_MANAGE";
    pub const ROLES_MANAGE: &str = "ROLES_MANAGE";

    pub const ALL_ADMIN: [&str; 11] = [
        FACILITIES_MANAGE,
        FACILITY_TYPES_MANAGE,
        GEOGRAPHIC_ZONES_MANAGE,
        PROGRAMS_MANAGE,
        SUPERVISORY_NODES_MANAGE,
        REQUISITION_GROUPS_MANAGE,
        ORDERABLES_MANAGE,
        FACILITY_APPROVED_ORDERABLES_MANAGE,
        USERS_MANAGE,
        USER_ROLES_MANAGE,
        ROLES_MANAGE,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Right {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(rename = "type")]
    pub right_type: RightType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub right_ids: Vec<Uuid>,
}

impl Role {
    /// Common right type of `rights`, which must all belong to this role.
    ///
    /// Returns `None` for a role without rights.
    pub fn right_type(rights: &[Right]) -> Result<Option<RightType>> {
        let mut types = rights.iter().map(|r| r.right_type);
        let Some(first) = types.next() else {
            return Ok(None);
        };
        if types.any(|t| t != first) {
            return Err(DomainError::validation(
                ERROR_ROLE_RIGHT_TYPES_MIXED,
                "all rights of a role must share one right type",
            ));
        }
        Ok(Some(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right(name: &str, right_type: RightType) -> Right {
        Right {
            id: Uuid::new_v4(),
            name: name.into(),
            right_type,
            description: None,
            attachment_ids: Vec::new(),
        }
    }

    #[test]
    fn right_type_round_trips_through_strings() {
        assert_eq!(RightType::OrderFulfillment.to_string(), "ORDER_FULFILLMENT");
        assert_eq!(
            "GENERAL_ADMIN".parse::<RightType>().unwrap(),
            RightType::GeneralAdmin
        );
    }

    #[test]
    fn mixed_role_rights_rejected() {
        let rights = [
            right("A", RightType::Supervision),
            right("B", RightType::GeneralAdmin),
        ];
        assert!(Role::right_type(&rights).is_err());
        assert_eq!(Role::right_type(&rights[..1]).unwrap(), Some(RightType::Supervision));
        assert_eq!(Role::right_type(&[]).unwrap(), None);
    }
}

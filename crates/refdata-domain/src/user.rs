//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Users and their role assignments."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, Result};
use crate::messages::{ERROR_ROLE_ASSIGNMENT_INVALID, ERROR_ROLE_ASSIGNMENT_MISMATCH};
use crate::new_id;
use crate::right::RightType;
use crate::validation::not_blank;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub home_facility_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub login_restricted: bool,
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,
}

fn default_active() -> bool {
    true
}

/// Where a role applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentScope {
    /// Global; for general admin and report roles.
    Direct,
    /// Program scoped. Without a node the user's home facility is supervised.
    Supervision {
        program_id: Uuid,
        supervisory_node_id: Option<Uuid>,
    },
    Fulfillment { warehouse_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "RoleAssignmentPayload", try_from = "RoleAssignmentPayload")]
pub struct RoleAssignment {
    pub role_id: Uuid,
    pub scope: AssignmentScope,
}

impl RoleAssignment {
    pub fn direct(role_id: Uuid) -> Self {
        Self {
            role_id,
            scope: AssignmentScope::Direct,
        }
    }

    pub fn supervision(role_id: Uuid, program_id: Uuid, node: Option<Uuid>) -> Self {
        Self {
            role_id,
            scope: AssignmentScope::Supervision {
                program_id,
                supervisory_node_id: node,
            },
        }
    }

    pub fn fulfillment(role_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            role_id,
            scope: AssignmentScope::Fulfillment { warehouse_id },
        }
    }

    /// Check the assignment kind against the right type of its role.
    pub fn check_right_type(&self, role_type: Option<RightType>) -> Result<()> {
        let Some(role_type) = role_type else {
            return Ok(());
        };
        let matches = match self.scope {
            AssignmentScope::Direct => {
                matches!(role_type, RightType::GeneralAdmin | RightType::Reports)
            }
            AssignmentScope::Supervision { .. } => role_type == RightType::Supervision,
            AssignmentScope::Fulfillment { .. } => role_type == RightType::OrderFulfillment,
        };
        if matches {
            Ok(())
        } else {
            Err(DomainError::validation(
                ERROR_ROLE_ASSIGNMENT_MISMATCH,
                format!("role {} with {role_type} rights cannot be assigned this way", self.role_id),
            ))
        }
    }
}

/// Flat wire form: `{roleId, programId?, supervisoryNodeId?, warehouseId?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentPayload {
    pub role_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisory_node_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<Uuid>,
}

impl From<RoleAssignment> for RoleAssignmentPayload {
    fn from(value: RoleAssignment) -> Self {
        let mut payload = Self {
            role_id: value.role_id,
            program_id: None,
            supervisory_node_id: None,
            warehouse_id: None,
        };
        match value.scope {
            AssignmentScope::Direct => {}
            AssignmentScope::Supervision {
                program_id,
                supervisory_node_id,
            } => {
                payload.program_id = Some(program_id);
                payload.supervisory_node_id = supervisory_node_id;
            }
            AssignmentScope::Fulfillment { warehouse_id } => {
                payload.warehouse_id = Some(warehouse_id);
            }
        }
        payload
    }
}

impl TryFrom<RoleAssignmentPayload> for RoleAssignment {
    type Error = DomainError;

    fn try_from(value: RoleAssignmentPayload) -> Result<Self> {
        let scope = match (value.program_id, value.supervisory_node_id, value.warehouse_id) {
            (None, None, None) => AssignmentScope::Direct,
            (Some(program_id), node, None) => AssignmentScope::Supervision {
                program_id,
                supervisory_node_id: node,
            },
            (None, None, Some(warehouse_id)) => AssignmentScope::Fulfillment { warehouse_id },
            _ => {
                return Err(DomainError::validation(
                    ERROR_ROLE_ASSIGNMENT_INVALID,
                    "role assignment must be direct, supervision (programId) or fulfillment (warehouseId)",
                ))
            }
        };
        Ok(Self {
            role_id: value.role_id,
            scope,
        })
    }
}

//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Flattened right assignment tuples."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized `(user, right, facility?, program?)` tuple used for
/// permission lookups. Equality covers all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RightAssignment {
    pub user_id: Uuid,
    pub right_name: String,
    pub facility_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
}

impl RightAssignment {
    pub fn new(
        user_id: Uuid,
        right_name: impl Into<String>,
        facility_id: Option<Uuid>,
        program_id: Option<Uuid>,
    ) -> Self {
        Self {
            user_id,
            right_name: right_name.into(),
            facility_id,
            program_id,
        }
    }

    /// `RIGHT`, `RIGHT|facility` or `RIGHT|facility|program`.
    pub fn permission_string(&self) -> String {
        let mut out = self.right_name.clone();
        if let Some(facility) = self.facility_id {
            out.push('|');
            out.push_str(&facility.to_string());
            if let Some(program) = self.program_id {
                out.push('|');
                out.push_str(&program.to_string());
            }
        }
        out
    }
}

/// One row derived from a role assignment before supervisory nodes are
/// expanded into facilities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntermediateRightAssignment {
    pub user_id: Uuid,
    pub right_name: String,
    pub facility_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub supervisory_node_id: Option<Uuid>,
}

impl IntermediateRightAssignment {
    /// Copy without the node; used for rows that need no expansion.
    pub fn into_assignment(self) -> RightAssignment {
        RightAssignment {
            user_id: self.user_id,
            right_name: self.right_name,
            facility_id: self.facility_id,
            program_id: self.program_id,
        }
    }

    /// Tuple for one facility supervised through this row's node.
    pub fn for_facility(&self, facility_id: Uuid) -> RightAssignment {
        RightAssignment {
            user_id: self.user_id,
            right_name: self.right_name.clone(),
            facility_id: Some(facility_id),
            program_id: self.program_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_strings_include_scope() {
        let user = Uuid::new_v4();
        let facility = Uuid::new_v4();
        let program = Uuid::new_v4();
        assert_eq!(
            RightAssignment::new(user, "USERS_MANAGE", None, None).permission_string(),
            "USERS_MANAGE"
        );
        assert_eq!(
            RightAssignment::new(user, "PODS_MANAGE", Some(facility), None).permission_string(),
            format!("PODS_MANAGE|{facility}")
        );
        assert_eq!(
            RightAssignment::new(user, "REQUISITION_VIEW", Some(facility), Some(program))
                .permission_string(),
            format!("REQUISITION_VIEW|{facility}|{program}")
        );
    }
}

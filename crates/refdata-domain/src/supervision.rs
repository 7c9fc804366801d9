//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Supervision hierarchy: supervisory nodes and requisition groups."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Supervisory nodes form a tree (parent links, child lists). Each node may
//! own one requisition group whose member facilities it supervises for the
//! group's programs. Related entities are exchanged as `{ "id": ... }`
//! references on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::new_id;
use crate::validation::not_blank;

/// `{ "id": ... }` pointer to another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    pub id: Uuid,
}

impl From<Uuid> for ObjectReference {
    fn from(id: Uuid) -> Self {
        Self { id }
    }
}

pub(crate) mod reference {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    use super::ObjectReference;

    pub fn serialize<S: Serializer>(value: &Option<Uuid>, s: S) -> Result<S::Ok, S::Error> {
        value.map(ObjectReference::from).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Uuid>, D::Error> {
        Ok(Option::<ObjectReference>::deserialize(d)?.map(|r| r.id))
    }
}

pub(crate) mod required_reference {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    use super::ObjectReference;

    pub fn serialize<S: Serializer>(value: &Uuid, s: S) -> Result<S::Ok, S::Error> {
        ObjectReference::from(*value).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Uuid, D::Error> {
        Ok(ObjectReference::deserialize(d)?.id)
    }
}

/// Like [`references`]; an absent list stays `None` and serializes as `[]`.
pub(crate) mod optional_references {
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    use super::ObjectReference;

    pub fn serialize<S: Serializer>(value: &Option<Vec<Uuid>>, s: S) -> Result<S::Ok, S::Error> {
        super::references::serialize(value.as_deref().unwrap_or_default(), s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Uuid>>, D::Error> {
        Ok(Option::<Vec<ObjectReference>>::deserialize(d)?
            .map(|refs| refs.into_iter().map(|r| r.id).collect()))
    }
}

pub(crate) mod references {
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    use super::ObjectReference;

    pub fn serialize<S: Serializer>(value: &[Uuid], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(value.iter().copied().map(ObjectReference::from))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Uuid>, D::Error> {
        Ok(Vec::<ObjectReference>::deserialize(d)?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupervisoryNode {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "facility", default, with = "reference")]
    pub facility_id: Option<Uuid>,
    #[serde(rename = "parentNode", default, with = "reference")]
    pub parent_node_id: Option<Uuid>,
    /// `None` leaves the stored children untouched on save.
    #[serde(rename = "childNodes", default, with = "optional_references")]
    pub child_node_ids: Option<Vec<Uuid>>,
    #[serde(rename = "requisitionGroup", default, with = "reference")]
    pub requisition_group_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionGroup {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "supervisoryNode", with = "required_reference")]
    pub supervisory_node_id: Uuid,
    #[serde(rename = "memberFacilities", default, with = "references")]
    pub member_facility_ids: Vec<Uuid>,
    #[serde(rename = "programs", default, with = "references")]
    pub program_ids: Vec<Uuid>,
}

impl RequisitionGroup {
    pub fn supports(&self, program_id: Uuid) -> bool {
        self.program_ids.contains(&program_id)
    }
}

//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Facilities, facility types and geographic zones."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::new_id;
use crate::validation::not_blank;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeographicZone {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FacilityType {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub display_order: Option<i32>,
    #[serde(default = "crate::facility::default_active")]
    pub active: bool,
}

/// Program support declared by a facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedProgram {
    pub program_id: Uuid,
    #[serde(default = "crate::facility::default_active")]
    pub active: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub geographic_zone_id: Uuid,
    pub type_id: Uuid,
    #[serde(default = "crate::facility::default_active")]
    pub active: bool,
    #[serde(default = "crate::facility::default_active")]
    pub enabled: bool,
    #[serde(default)]
    pub go_live_date: Option<NaiveDate>,
    #[serde(default)]
    pub go_down_date: Option<NaiveDate>,
    #[serde(default)]
    pub supported_programs: Vec<SupportedProgram>,
}

impl Facility {
    /// Whether the facility actively supports the program.
    pub fn supports(&self, program_id: Uuid) -> bool {
        self.supported_programs
            .iter()
            .any(|sp| sp.program_id == program_id && sp.active)
    }
}

pub(crate) fn default_active() -> bool {
    true
}

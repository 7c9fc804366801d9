//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Health programs."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::new_id;
use crate::validation::not_blank;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub periods_skippable: bool,
    #[serde(default)]
    pub show_non_full_supply_tab: bool,
}

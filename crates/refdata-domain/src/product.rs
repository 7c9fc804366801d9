//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Orderables, trade items and approved products."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::new_id;
use crate::supervision::required_reference;
use crate::validation::not_blank;
use crate::values::{Dispensable, Money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderableDisplayCategory {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    #[validate(custom(function = "not_blank"))]
    pub display_name: String,
    #[serde(default)]
    pub display_order: i32,
}

/// Link between an orderable and a program it is used in.
///
/// Equality and hashing only look at the program and the owning orderable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramOrderable {
    #[serde(default, skip_serializing)]
    pub orderable_id: Uuid,
    pub program_id: Uuid,
    pub orderable_display_category_id: Uuid,
    #[serde(default)]
    pub doses_per_patient: Option<i32>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub full_supply: bool,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub max_months_stock: i32,
    #[serde(default)]
    pub price_per_pack: Money,
}

impl PartialEq for ProgramOrderable {
    fn eq(&self, other: &Self) -> bool {
        self.program_id == other.program_id && self.orderable_id == other.orderable_id
    }
}

impl Eq for ProgramOrderable {}

impl Hash for ProgramOrderable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.program_id.hash(state);
        self.orderable_id.hash(state);
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Orderable {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[serde(default = "default_version")]
    pub version_number: i64,
    #[validate(custom(function = "not_blank"))]
    pub product_code: String,
    #[validate(custom(function = "not_blank"))]
    pub full_product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dispensable: Dispensable,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub net_content: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub pack_rounding_threshold: i64,
    #[serde(default)]
    pub round_to_zero: bool,
    #[serde(default)]
    pub trade_item_id: Option<Uuid>,
    #[serde(default)]
    pub programs: Vec<ProgramOrderable>,
    #[serde(default)]
    pub identifiers: IndexMap<String, String>,
    #[serde(default)]
    pub extra_data: IndexMap<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Orderable {
    /// Point every program link at this orderable and drop repeated programs.
    pub fn link_programs(&mut self) {
        let id = self.id;
        let mut seen = std::collections::HashSet::new();
        self.programs.retain_mut(|po| {
            po.orderable_id = id;
            seen.insert(po.program_id)
        });
    }

    pub fn program_orderable(&self, program_id: Uuid) -> Option<&ProgramOrderable> {
        self.programs.iter().find(|po| po.program_id == program_id)
    }

    /// Successor version carrying the changes in `update`.
    pub fn next_version(&self, mut update: Orderable) -> Orderable {
        update.id = self.id;
        update.version_number = self.version_number + 1;
        update.last_updated = Utc::now();
        update.link_programs();
        update
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeItemClassification {
    pub classification_system: String,
    pub classification_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeItem {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[serde(default)]
    pub manufacturer_of_trade_item: Option<String>,
    #[serde(default)]
    pub classifications: Vec<TradeItemClassification>,
}

impl TradeItem {
    pub fn has_classification(&self, classification_id: &str) -> bool {
        self.classifications
            .iter()
            .any(|c| c.classification_id == classification_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FacilityTypeApprovedProduct {
    #[serde(default = "new_id")]
    pub id: Uuid,
    #[serde(rename = "facilityType", with = "required_reference")]
    pub facility_type_id: Uuid,
    #[serde(rename = "orderable", with = "required_reference")]
    pub orderable_id: Uuid,
    #[serde(rename = "program", with = "required_reference")]
    pub program_id: Uuid,
    #[validate(range(min = 0.0))]
    pub max_periods_of_stock: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub min_periods_of_stock: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub emergency_order_point: Option<f64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orderable() -> Orderable {
        serde_json::from_value(json!({
            "productCode": "P1",
            "fullProductName": "Paracetamol",
            "netContent": 10,
            "programs": [
                { "programId": Uuid::nil(), "orderableDisplayCategoryId": Uuid::nil(), "pricePerPack": 4.5 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn program_links_compare_on_program_and_orderable() {
        let mut first = orderable();
        first.link_programs();
        let mut same = first.programs[0].clone();
        same.display_order = 7;
        assert_eq!(first.programs[0], same);

        let mut other = orderable();
        other.link_programs();
        assert_ne!(first.programs[0], other.programs[0]);
    }

    #[test]
    fn next_version_keeps_identity() {
        let current = orderable();
        let next = current.next_version(orderable());
        assert_eq!(next.id, current.id);
        assert_eq!(next.version_number, current.version_number + 1);
        assert_eq!(next.programs[0].orderable_id, current.id);
    }

    #[test]
    fn approved_product_uses_object_references() {
        let ftap: FacilityTypeApprovedProduct = serde_json::from_value(json!({
            "facilityType": { "id": Uuid::nil() },
            "orderable": { "id": Uuid::nil() },
            "program": { "id": Uuid::nil() },
            "maxPeriodsOfStock": 3.0
        }))
        .unwrap();
        assert!(ftap.active);
        assert!(ftap.min_periods_of_stock.is_none());
    }
}

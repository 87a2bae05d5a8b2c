//! Local business entities correlated to ERP records.
//!
//! Every entity owns a locally generated primary id plus an optional
//! `sap_id` correlating it to the remote ERP record. A contract's `sap_id`
//! is composite because one ERP blanket agreement document backs multiple
//! local contracts, one per item group line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ItemGroupCategory;

/// Compose the contract correlation key from an agreement document.
///
/// Two agreement lines sharing document number and year but differing in
/// item group map to two distinct local contracts.
pub fn contract_sap_id(year: i32, doc_num: i64, item_group_sap_id: &str) -> String {
    format!("{year}-{doc_num}-{item_group_sap_id}")
}

/// Lifecycle state of a local contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    OnHold,
    Approved,
    Rejected,
    Terminated,
}

crate::impl_domain_status_conversions!(ContractStatus {
    Draft => "draft",
    OnHold => "on_hold",
    Approved => "approved",
    Rejected => "rejected",
    Terminated => "terminated",
});

/// Yearly delivery contract between a member and the cooperative.
///
/// ERP-owned fields (dates, quantities, status) are overwritten on every
/// pull sync; user-editable fields (comments, proposed-quantity override,
/// reject and area details) are preserved by the merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    pub id: String,
    pub sap_id: Option<String>,
    /// Identity-provider id of the owning member.
    pub user_id: String,
    pub item_group_id: String,
    pub delivery_place_id: String,
    pub year: i32,
    pub status: ContractStatus,
    pub contract_quantity: f64,
    pub delivered_quantity: f64,
    pub proposed_quantity: Option<f64>,
    pub quantity_comment: Option<String>,
    pub reject_comment: Option<String>,
    pub area_details: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sign_date: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Item group a cooperative member can contract for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemGroup {
    pub id: String,
    pub sap_id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub category: Option<ItemGroupCategory>,
    pub minimum_profit_estimation: f64,
    /// Local id of the item group that must exist before contracts for this
    /// group can be created.
    pub prerequisite_item_group_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Location members deliver produce to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPlace {
    pub id: String,
    pub sap_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DeliveryPlace {
    pub fn new(sap_id: impl Into<String>, name: impl Into<String>, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sap_id: sap_id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Attribute keys carried on identity-provider users.
pub mod user_attributes {
    pub const SAP_ID: &str = "sapId";
    pub const COMPANY_NAME: &str = "companyName";
    pub const PHONE_1: &str = "phone1";
    pub const PHONE_2: &str = "phone2";
    pub const ADDRESS: &str = "address";
    pub const POSTAL_CODE: &str = "postalCode";
    pub const CITY: &str = "city";
    pub const IBAN: &str = "iban";
    pub const BIC: &str = "bic";
    pub const TAX_CODE: &str = "taxCode";
    pub const VAT_LIABLE: &str = "vatLiable";
}

/// Identity-provider view of a cooperative member.
///
/// Users are owned by the identity service; this is the projection the
/// reconciliation engine reads and writes through the directory port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl UserProfile {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Remove an attribute entirely (used when the ERP clears a field).
    pub fn clear_attribute(&mut self, key: &str) {
        self.attributes.remove(key);
    }
}

//! ERP wire types.
//!
//! Record shapes exchanged with the remote ERP service layer. Field names
//! follow the ERP's PascalCase conventions via serde renames so the structs
//! can be posted and parsed verbatim. The agreement's per-item-group planned
//! quantities are an explicit sparse map instead of dynamically keyed extra
//! properties, keeping the reconciliation logic statically checkable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Authenticated ERP session parsed from the login response cookies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErpSession {
    pub session_id: String,
    pub route_id: String,
    /// Unix timestamp after which the session must not be used.
    pub expires_at: i64,
}

impl ErpSession {
    /// A session is reusable while `now` is at least `margin_secs` short of
    /// expiry.
    pub fn is_valid_at(&self, now: i64, margin_secs: i64) -> bool {
        now < self.expires_at - margin_secs
    }
}

/// Business partner (contact) record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpBusinessPartner {
    #[serde(rename = "CardCode")]
    pub card_code: String,
    #[serde(rename = "CardName")]
    pub card_name: Option<String>,
    #[serde(rename = "EmailAddress")]
    pub email: Option<String>,
    #[serde(rename = "Phone1")]
    pub phone1: Option<String>,
    #[serde(rename = "Phone2")]
    pub phone2: Option<String>,
    #[serde(rename = "FederalTaxID")]
    pub federal_tax_id: Option<String>,
    #[serde(rename = "VatLiable")]
    pub vat_liable: Option<String>,
    #[serde(rename = "Addresses", default)]
    pub addresses: Vec<ErpBpAddress>,
    #[serde(rename = "BankAccounts", default)]
    pub bank_accounts: Vec<ErpBpBankAccount>,
}

/// Postal address attached to a business partner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpBpAddress {
    #[serde(rename = "Type")]
    pub address_type: ErpAddressType,
    #[serde(rename = "Street")]
    pub street: Option<String>,
    #[serde(rename = "ZipCode")]
    pub zip_code: Option<String>,
    #[serde(rename = "City")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErpAddressType {
    #[serde(rename = "bo_BillTo")]
    Billing,
    #[serde(rename = "bo_ShipTo")]
    Shipping,
}

/// Bank account attached to a business partner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpBpBankAccount {
    #[serde(rename = "IBAN")]
    pub iban: Option<String>,
    #[serde(rename = "BICSwiftCode")]
    pub bic: Option<String>,
}

/// Status of a blanket agreement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErpAgreementStatus {
    #[serde(rename = "asApproved")]
    Approved,
    #[serde(rename = "asOnHold")]
    OnHold,
    #[serde(rename = "asDraft")]
    Draft,
    #[serde(rename = "asTerminated")]
    Terminated,
}

impl ErpAgreementStatus {
    /// String form used in OData `$filter` expressions and PATCH bodies.
    pub fn as_erp_str(&self) -> &'static str {
        match self {
            Self::Approved => "asApproved",
            Self::OnHold => "asOnHold",
            Self::Draft => "asDraft",
            Self::Terminated => "asTerminated",
        }
    }
}

/// Blanket agreement — the ERP's representation of a yearly contract,
/// one line per item group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpAgreement {
    /// Numeric key used in update URLs.
    #[serde(rename = "AgreementNo")]
    pub agreement_no: Option<i64>,
    /// Document number correlated into local contract sap ids.
    #[serde(rename = "DocNum")]
    pub doc_num: Option<i64>,
    #[serde(rename = "BPCode")]
    pub bp_code: String,
    #[serde(rename = "StartDate")]
    pub start_date: Option<String>,
    #[serde(rename = "EndDate")]
    pub end_date: Option<String>,
    #[serde(rename = "SigningDate")]
    pub signing_date: Option<String>,
    #[serde(rename = "Status")]
    pub status: ErpAgreementStatus,
    /// Delivery place code the member delivers against.
    #[serde(rename = "DeliveryPlaceCode")]
    pub delivery_place_code: Option<String>,
    #[serde(rename = "AgreementLines", default)]
    pub lines: Vec<ErpAgreementLine>,
    /// Planned quantity per item-group code. Sparse: absent means the
    /// agreement does not cover that group.
    #[serde(rename = "PlannedQuantities", default)]
    pub planned_quantities: BTreeMap<String, f64>,
}

impl ErpAgreement {
    /// True when any line already carries the given item-group code.
    /// Appending a second line for the same group would break idempotent
    /// re-synchronization, so callers must check this first.
    pub fn has_line_for_group(&self, item_group_code: &str) -> bool {
        self.lines.iter().any(|line| line.item_group_code == item_group_code)
    }
}

/// One agreement line, tied to a single item group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpAgreementLine {
    #[serde(rename = "ItemGroupCode")]
    pub item_group_code: String,
    #[serde(rename = "PlannedQuantity")]
    pub planned_quantity: Option<f64>,
    #[serde(rename = "CumulativeQuantity")]
    pub cumulative_quantity: Option<f64>,
}

/// Item group record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpItemGroup {
    #[serde(rename = "Number")]
    pub number: i64,
    #[serde(rename = "GroupName")]
    pub group_name: String,
}

impl ErpItemGroup {
    /// Correlation id stored on local item groups.
    pub fn sap_id(&self) -> String {
        self.number.to_string()
    }
}

/// Delivery place record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpDeliveryPlace {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Purchase delivery note posted when received goods are booked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpPurchaseDeliveryNote {
    #[serde(rename = "DocEntry")]
    pub doc_entry: Option<i64>,
    #[serde(rename = "CardCode")]
    pub card_code: String,
    #[serde(rename = "DocDate")]
    pub doc_date: String,
    #[serde(rename = "Comments")]
    pub comments: Option<String>,
    #[serde(rename = "DocumentLines", default)]
    pub lines: Vec<ErpDocumentLine>,
}

/// Line of a purchase delivery note or stock transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpDocumentLine {
    #[serde(rename = "ItemCode")]
    pub item_code: String,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "UnitPrice")]
    pub unit_price: Option<f64>,
    #[serde(rename = "WarehouseCode")]
    pub warehouse_code: Option<String>,
}

/// Stock transfer between warehouses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpStockTransfer {
    #[serde(rename = "DocEntry")]
    pub doc_entry: Option<i64>,
    #[serde(rename = "DocDate")]
    pub doc_date: String,
    #[serde(rename = "FromWarehouse")]
    pub from_warehouse: String,
    #[serde(rename = "ToWarehouse")]
    pub to_warehouse: String,
    #[serde(rename = "StockTransferLines", default)]
    pub lines: Vec<ErpDocumentLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_validity_honors_margin() {
        let session =
            ErpSession { session_id: "s".into(), route_id: "r".into(), expires_at: 1_000_000 };

        // 15 minutes before expiry with a 10 minute margin: still valid.
        assert!(session.is_valid_at(1_000_000 - 15 * 60, 10 * 60));
        // 9 minutes before expiry: inside the margin, must be replaced.
        assert!(!session.is_valid_at(1_000_000 - 9 * 60, 10 * 60));
    }

    #[test]
    fn agreement_line_lookup_matches_on_group_code() {
        let agreement = ErpAgreement {
            agreement_no: Some(7),
            doc_num: Some(1042),
            bp_code: "C-100".into(),
            start_date: None,
            end_date: None,
            signing_date: None,
            status: ErpAgreementStatus::Approved,
            delivery_place_code: None,
            lines: vec![ErpAgreementLine {
                item_group_code: "103".into(),
                planned_quantity: Some(500.0),
                cumulative_quantity: Some(120.0),
            }],
            planned_quantities: BTreeMap::new(),
        };

        assert!(agreement.has_line_for_group("103"));
        assert!(!agreement.has_line_for_group("104"));
    }

    #[test]
    fn agreement_parses_erp_field_names() {
        let json = r#"{
            "AgreementNo": 12,
            "DocNum": 5001,
            "BPCode": "C-200",
            "Status": "asOnHold",
            "AgreementLines": [
                {"ItemGroupCode": "101", "PlannedQuantity": 300.0, "CumulativeQuantity": 10.5}
            ],
            "PlannedQuantities": {"101": 300.0}
        }"#;

        let agreement: ErpAgreement = serde_json::from_str(json).unwrap();
        assert_eq!(agreement.status, ErpAgreementStatus::OnHold);
        assert_eq!(agreement.lines.len(), 1);
        assert_eq!(agreement.planned_quantities.get("101"), Some(&300.0));
    }
}

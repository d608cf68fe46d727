//! Serde models for the upstream bill-analysis JSON exchange.
//!
//! The input document ([`BillDocument`]) is tolerant: share fields may
//! be missing and two field-naming variants are accepted
//! (`vat_share`/`other_share`/`discount_share` and
//! `tax_share`/`service_share`/`tip_share`). The output document
//! ([`SettlementDocument`]) always uses the canonical `vat`/`other`/
//! `discount` naming; tax folds into the vat column and service/tip
//! fold into the other column.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One priced item as it appears upstream: `{"item": ..., "price": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub item: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
}

/// A person's flattened breakdown in an incoming document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PersonEntry {
    #[serde(default)]
    pub items: Vec<ItemEntry>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub individual_total: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub vat_share: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub tax_share: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub other_share: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub service_share: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub tip_share: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub discount_share: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub final_total: Option<Decimal>,
}

impl PersonEntry {
    /// The person's tax/VAT share across both naming variants.
    pub fn folded_vat_share(&self) -> Decimal {
        self.vat_share.unwrap_or_default() + self.tax_share.unwrap_or_default()
    }

    /// The person's fee share: other, service and tip columns combined.
    pub fn folded_other_share(&self) -> Decimal {
        self.other_share.unwrap_or_default()
            + self.service_share.unwrap_or_default()
            + self.tip_share.unwrap_or_default()
    }

    pub fn folded_discount_share(&self) -> Decimal {
        self.discount_share.unwrap_or_default()
    }
}

/// An upstream bill-analysis document, as produced by a multimodal
/// model or a compatible backend. Totals are treated as claims; the
/// settlement engine recomputes every number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BillDocument {
    pub split_details: IndexMap<String, PersonEntry>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_bill: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_vat: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_tax: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_other: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_service: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_tip: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_discount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl BillDocument {
    pub fn folded_total_vat(&self) -> Decimal {
        self.total_vat.unwrap_or_default() + self.total_tax.unwrap_or_default()
    }

    pub fn folded_total_other(&self) -> Decimal {
        self.total_other.unwrap_or_default()
            + self.total_service.unwrap_or_default()
            + self.total_tip.unwrap_or_default()
    }

    pub fn folded_total_discount(&self) -> Decimal {
        self.total_discount.unwrap_or_default()
    }
}

/// A person's breakdown in an outgoing settlement document. All fields
/// are present and quantized to the currency's minor unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub items: Vec<ItemEntry>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub individual_total: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub vat_share: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub other_share: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub discount_share: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub final_total: Decimal,
}

/// The canonical outgoing settlement document, mirroring the upstream
/// shape so existing rendering layers can consume it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementDocument {
    pub split_details: IndexMap<String, SettlementEntry>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_bill: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_vat: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_other: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_discount: Decimal,
    pub currency: String,
}

#![warn(clippy::uninlined_format_args)]

//! JSON interchange boundary for the settlement engine.
//!
//! Upstream collaborators (a multimodal model behind an HTTP API) speak
//! a flattened per-person JSON document. This crate reconstructs a
//! structured [`Bill`] from that document — treating every number the
//! collaborator computed as a claim, not a result — and serializes a
//! [`BillSettlement`] back into the same shape for the rendering layer.

pub mod model;

use indexmap::IndexMap;
use kongsi_domain::{
    settle, Adjustment, AdjustmentKind, Bill, BillSettlement, LineItem, Money, Owner, SettleError,
    SettlementContext,
};
use rust_decimal::Decimal;
use thiserror::Error;

pub use model::{BillDocument, ItemEntry, PersonEntry, SettlementDocument, SettlementEntry};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed bill document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document has no persons under split_details")]
    EmptyDocument,
    #[error("person '{person}' has no items")]
    EmptyItems { person: String },
    #[error("person '{person}' has a negative price for '{item}'")]
    NegativePrice { person: String, item: String },
    #[error(transparent)]
    Settle(#[from] SettleError),
}

/// Parses an upstream JSON document into a [`Bill`].
pub fn parse_bill(json: &str) -> Result<Bill, WireError> {
    let document: BillDocument = serde_json::from_str(json)?;
    document.into_bill()
}

/// Serializes a settlement into the canonical upstream JSON shape.
pub fn to_json(settlement: &BillSettlement) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(
        &SettlementDocument::from_settlement(settlement),
    )?)
}

/// End to end: parse an upstream document, recompute the settlement
/// deterministically, and serialize the verified breakdown.
pub fn settle_json(json: &str, context: SettlementContext) -> Result<String, WireError> {
    let bill = parse_bill(json)?;
    let settlement = settle(&bill, context)?;
    tracing::debug!(
        currency = %settlement.currency,
        total_bill = %settlement.total_bill,
        person_count = settlement.per_person.len(),
        "recomputed settlement from upstream document"
    );
    to_json(&settlement)
}

impl BillDocument {
    /// Reconstructs a structured [`Bill`] from the flattened per-person
    /// view.
    ///
    /// Each person's items become single-owner line items in document
    /// order. Bill-level adjustments are rebuilt from the totals: a
    /// non-zero VAT total becomes a proportional tax, a non-zero fee
    /// total a flat fee. The upstream document never carries a discount
    /// rate, so the discount kind is inferred from the per-person
    /// shares: equal shares (within half a minor unit) mean an even
    /// split, anything else a proportional allocation of the stated
    /// amount.
    pub fn into_bill(self) -> Result<Bill, WireError> {
        if self.split_details.is_empty() {
            return Err(WireError::EmptyDocument);
        }

        let mut items = Vec::new();
        let mut discount_shares = Vec::with_capacity(self.split_details.len());
        for (person, entry) in &self.split_details {
            if entry.items.is_empty() {
                return Err(WireError::EmptyItems {
                    person: person.clone(),
                });
            }
            for item in &entry.items {
                if item.price.is_sign_negative() && !item.price.is_zero() {
                    return Err(WireError::NegativePrice {
                        person: person.clone(),
                        item: item.item.clone(),
                    });
                }
                items.push(LineItem {
                    description: item.item.clone(),
                    price: Money::from_decimal(item.price),
                    owners: vec![Owner::named(person.clone())],
                });
            }
            discount_shares.push(entry.folded_discount_share());
        }

        let mut adjustments = Vec::new();
        let total_vat = self.folded_total_vat();
        if !total_vat.is_zero() {
            adjustments.push(Adjustment::with_amount(
                AdjustmentKind::ProportionalTax,
                Money::from_decimal(total_vat),
            ));
        }
        let total_other = self.folded_total_other();
        if !total_other.is_zero() {
            adjustments.push(Adjustment::with_amount(
                AdjustmentKind::FlatFee,
                Money::from_decimal(total_other),
            ));
        }
        let total_discount = self.folded_total_discount();
        if !total_discount.is_zero() {
            let kind = infer_discount_kind(&discount_shares);
            adjustments.push(Adjustment::with_amount(
                kind,
                Money::from_decimal(total_discount.abs()),
            ));
        }

        Ok(Bill {
            currency: self.currency.unwrap_or_else(|| "$".to_string()),
            items,
            adjustments,
        })
    }
}

/// Half a minor unit: per-person shares closer than this are taken as
/// an even split.
const EVEN_SPLIT_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Picks the discount kind implied by flattened per-person shares. With
/// no per-person evidence the upstream convention applies: a rate-less
/// discount is distributed evenly.
fn infer_discount_kind(shares: &[Decimal]) -> AdjustmentKind {
    let nonzero: Vec<Decimal> = shares
        .iter()
        .copied()
        .map(|share| share.abs())
        .filter(|share| !share.is_zero())
        .collect();
    if nonzero.is_empty() {
        return AdjustmentKind::FlatDiscount;
    }
    let min = nonzero.iter().copied().fold(nonzero[0], Decimal::min);
    let max = nonzero.iter().copied().fold(nonzero[0], Decimal::max);
    if max - min <= EVEN_SPLIT_TOLERANCE && nonzero.len() == shares.len() {
        AdjustmentKind::FlatDiscount
    } else {
        AdjustmentKind::RatedDiscount
    }
}

impl SettlementDocument {
    /// Flattens a settlement into the canonical wire shape. Tax shares
    /// land in the vat column, fee shares in the other column, and the
    /// discount column carries positive magnitudes, as upstream
    /// consumers expect.
    pub fn from_settlement(settlement: &BillSettlement) -> Self {
        let mut split_details = IndexMap::with_capacity(settlement.per_person.len());
        for (person, breakdown) in &settlement.per_person {
            let items = breakdown
                .items
                .iter()
                .map(|share| ItemEntry {
                    item: share.description.clone(),
                    price: share.amount.as_decimal(),
                })
                .collect();
            let discount_share = -(breakdown.share_of(AdjustmentKind::RatedDiscount)
                + breakdown.share_of(AdjustmentKind::FlatDiscount));
            split_details.insert(
                person.clone(),
                SettlementEntry {
                    items,
                    individual_total: breakdown.individual_total.as_decimal(),
                    vat_share: breakdown.share_of(AdjustmentKind::ProportionalTax).as_decimal(),
                    other_share: breakdown.share_of(AdjustmentKind::FlatFee).as_decimal(),
                    discount_share: discount_share.as_decimal(),
                    final_total: breakdown.final_total.as_decimal(),
                },
            );
        }

        Self {
            split_details,
            total_bill: settlement.total_bill.as_decimal(),
            total_vat: settlement.total_tax.as_decimal(),
            total_other: settlement.total_fees.as_decimal(),
            total_discount: settlement.total_discount.as_decimal(),
            currency: settlement.currency.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_document() -> &'static str {
        r#"{
            "split_details": {
                "Budi": {
                    "items": [
                        {"item": "nasi goreng", "price": 45000},
                        {"item": "es teh", "price": 8000}
                    ],
                    "individual_total": 53000,
                    "vat_share": 5830,
                    "other_share": 2500,
                    "discount_share": 0,
                    "final_total": 61330
                },
                "Sari": {
                    "items": [
                        {"item": "sate ayam", "price": 35000}
                    ],
                    "individual_total": 35000,
                    "vat_share": 3850,
                    "other_share": 2500,
                    "discount_share": 0,
                    "final_total": 41350
                }
            },
            "total_bill": 102680,
            "total_vat": 9680,
            "total_other": 5000,
            "total_discount": 0,
            "currency": "Rp"
        }"#
    }

    #[test]
    fn parses_and_recomputes_upstream_document() {
        let bill = parse_bill(sample_document()).unwrap();
        assert_eq!(bill.currency, "Rp");
        assert_eq!(bill.items.len(), 3);
        assert_eq!(bill.adjustments.len(), 2);
        assert_eq!(bill.adjustments[0].kind, AdjustmentKind::ProportionalTax);
        assert_eq!(bill.adjustments[1].kind, AdjustmentKind::FlatFee);

        let settlement = bill.settle().unwrap();
        assert_eq!(settlement.total_bill, Money::from_i64(102680));
        let budi = &settlement.per_person["Budi"];
        assert_eq!(budi.individual_total, Money::from_i64(53000));
        assert_eq!(
            budi.share_of(AdjustmentKind::ProportionalTax),
            Money::new(583_000, 2)
        );
        assert_eq!(budi.final_total, Money::from_i64(61330));
    }

    #[test]
    fn accepts_tax_service_tip_variant() {
        let json = r#"{
            "split_details": {
                "Ana": {
                    "items": [{"item": "burger", "price": 12.0}],
                    "tax_share": 1.2,
                    "service_share": 1.0,
                    "tip_share": 2.0
                }
            },
            "total_tax": 1.2,
            "total_service": 1.0,
            "total_tip": 2.0,
            "currency": "$"
        }"#;

        let bill = parse_bill(json).unwrap();
        assert_eq!(bill.adjustments.len(), 2);
        assert_eq!(bill.adjustments[0].kind, AdjustmentKind::ProportionalTax);
        assert_eq!(
            bill.adjustments[0].amount,
            Some(Money::new(12, 1))
        );
        assert_eq!(bill.adjustments[1].kind, AdjustmentKind::FlatFee);
        assert_eq!(bill.adjustments[1].amount, Some(Money::from_i64(3)));
    }

    #[rstest]
    #[case::equal_shares_mean_flat(&["10.00", "10.00"], AdjustmentKind::FlatDiscount)]
    #[case::unequal_shares_mean_rated(&["15.00", "5.00"], AdjustmentKind::RatedDiscount)]
    #[case::no_evidence_means_flat(&["0", "0"], AdjustmentKind::FlatDiscount)]
    #[case::negative_shares_compare_by_magnitude(&["-10.00", "-10.00"], AdjustmentKind::FlatDiscount)]
    #[case::mixed_sign_unequal_shares(&["-15.00", "5.00"], AdjustmentKind::RatedDiscount)]
    fn discount_kind_is_inferred_from_shares(
        #[case] shares: &[&str],
        #[case] expected: AdjustmentKind,
    ) {
        let shares: Vec<Decimal> = shares.iter().map(|s| s.parse().unwrap()).collect();
        assert_eq!(infer_discount_kind(&shares), expected);
    }

    #[test]
    fn discount_reconstruction_round_trips_through_engine() {
        let json = r#"{
            "split_details": {
                "Alice": {
                    "items": [{"item": "wine", "price": 150}],
                    "discount_share": 15
                },
                "Bob": {
                    "items": [{"item": "soda", "price": 50}],
                    "discount_share": 5
                }
            },
            "total_discount": 20,
            "currency": "$"
        }"#;

        let bill = parse_bill(json).unwrap();
        assert_eq!(bill.adjustments[0].kind, AdjustmentKind::RatedDiscount);

        let settlement = bill.settle().unwrap();
        assert_eq!(settlement.total_discount, Money::from_i64(20));
        assert_eq!(
            settlement.per_person["Alice"].final_total,
            Money::from_i64(135)
        );
        assert_eq!(
            settlement.per_person["Bob"].final_total,
            Money::from_i64(45)
        );
    }

    #[test]
    fn settle_json_produces_canonical_document() {
        let output = settle_json(sample_document(), SettlementContext::default()).unwrap();
        let document: SettlementDocument = serde_json::from_str(&output).unwrap();

        assert_eq!(document.currency, "Rp");
        assert_eq!(document.total_bill, Decimal::from(102680));
        assert_eq!(document.split_details.len(), 2);
        let budi = &document.split_details["Budi"];
        assert_eq!(budi.final_total, Decimal::from(61330));

        let settled: Decimal = document
            .split_details
            .values()
            .map(|entry| entry.final_total)
            .sum();
        assert_eq!(settled, document.total_bill);
    }

    #[test]
    fn person_order_is_preserved_from_document() {
        let bill = parse_bill(sample_document()).unwrap();
        let settlement = bill.settle().unwrap();
        let names: Vec<&String> = settlement.per_person.keys().collect();
        assert_eq!(names, ["Budi", "Sari"]);
    }

    #[rstest]
    #[case::empty_split_details(r#"{"split_details": {}, "currency": "$"}"#)]
    #[case::person_without_items(
        r#"{"split_details": {"Ana": {"items": []}}, "currency": "$"}"#
    )]
    #[case::negative_price(
        r#"{"split_details": {"Ana": {"items": [{"item": "x", "price": -1}]}}, "currency": "$"}"#
    )]
    fn malformed_documents_are_rejected(#[case] json: &str) {
        assert!(parse_bill(json).is_err());
    }
}

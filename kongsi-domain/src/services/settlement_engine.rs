//! The settlement engine: a pure transform from a [`Bill`] to a
//! [`BillSettlement`].
//!
//! Allocation order follows the bill: item ownership shares first, then
//! adjustments in declaration order. Discounts apply where they are
//! declared; they are never reordered around tax.

use fxhash::FxHashMap;
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::{
    error::{InvalidBillReason, SettleError},
    model::{
        Adjustment, AdjustmentKind, AdjustmentShare, Bill, BillSettlement, ItemShare, Money,
        PersonSettlement,
    },
    services::{
        settlement_rounding::{quantize, quantize_column, SettlementContext},
        share_allocator::{owner_weights, resolve_persons, split_by_weights},
    },
};

/// Settles a bill: allocates item prices to owners, applies shared
/// adjustments in declaration order, and quantizes the result to the
/// context's minor unit with the residue assigned to the first resolved
/// person.
///
/// The input is never mutated; calling twice on the same bill yields
/// identical output.
pub fn settle(bill: &Bill, context: SettlementContext) -> Result<BillSettlement, SettleError> {
    validate(bill)?;

    let persons = resolve_persons(&bill.items);
    let index_of: FxHashMap<&str, usize> = persons
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    tracing::debug!(
        currency = %bill.currency,
        person_count = persons.len(),
        item_count = bill.items.len(),
        adjustment_count = bill.adjustments.len(),
        "settlement started"
    );

    // Phase 1: exact item allocation.
    let mut person_items: Vec<Vec<ItemShare>> = vec![Vec::new(); persons.len()];
    let mut individual_totals = vec![Money::ZERO; persons.len()];
    for item in &bill.items {
        let weights = owner_weights(item)?;
        let shares = split_by_weights(item.price, &weights);
        for (owner, share) in item.owners.iter().zip(shares) {
            let idx = index_of[owner.name.as_str()];
            individual_totals[idx] += share;
            person_items[idx].push(ItemShare {
                description: item.description.clone(),
                amount: share,
            });
        }
    }
    let grand_item_total: Money = individual_totals.iter().copied().sum();

    // Phase 2: exact adjustment allocation, in declaration order.
    // Each column holds signed per-person shares plus the signed total.
    let mut adjustment_columns: Vec<(AdjustmentKind, Vec<Money>, Money)> =
        Vec::with_capacity(bill.adjustments.len());
    for (index, adjustment) in bill.adjustments.iter().enumerate() {
        let amount = adjustment_amount(adjustment, grand_item_total, index)?;
        let shares = match adjustment.kind {
            AdjustmentKind::ProportionalTax | AdjustmentKind::RatedDiscount => {
                proportional_split(amount, &individual_totals, grand_item_total)
            }
            AdjustmentKind::FlatFee | AdjustmentKind::FlatDiscount => {
                if persons.is_empty() {
                    return Err(SettleError::EmptyPersonSet);
                }
                split_by_weights(amount, &vec![Decimal::ONE; persons.len()])
            }
        };
        let (shares, total) = if adjustment.kind.is_discount() {
            (shares.into_iter().map(|share| -share).collect(), -amount)
        } else {
            (shares, amount)
        };
        adjustment_columns.push((adjustment.kind, shares, total));
    }

    // Phase 3: quantize each column, repairing residue onto the first
    // resolved person, then assemble the output.
    let base = quantize_column(&individual_totals, grand_item_total, context);

    let mut total_tax = Money::ZERO;
    let mut total_fees = Money::ZERO;
    let mut total_discount = Money::ZERO;
    let mut rounded_columns = Vec::with_capacity(adjustment_columns.len());
    for (kind, shares, total) in &adjustment_columns {
        let column = quantize_column(shares, *total, context);
        match kind {
            AdjustmentKind::ProportionalTax => total_tax += column.total,
            AdjustmentKind::FlatFee => total_fees += column.total,
            AdjustmentKind::RatedDiscount | AdjustmentKind::FlatDiscount => {
                total_discount += -column.total;
            }
        }
        rounded_columns.push((*kind, column));
    }

    let total_bill = base.total + total_tax + total_fees - total_discount;

    let mut per_person: IndexMap<String, PersonSettlement> = IndexMap::with_capacity(persons.len());
    for (idx, name) in persons.iter().enumerate() {
        let adjustment_shares: Vec<AdjustmentShare> = rounded_columns
            .iter()
            .enumerate()
            .map(|(index, (kind, column))| AdjustmentShare {
                index,
                kind: *kind,
                amount: column.entries[idx],
            })
            .collect();
        let final_total = base.entries[idx]
            + adjustment_shares
                .iter()
                .map(|share| share.amount)
                .sum::<Money>();
        let items = person_items[idx]
            .iter()
            .map(|share| ItemShare {
                description: share.description.clone(),
                amount: quantize(share.amount, context),
            })
            .collect();
        per_person.insert(
            name.clone(),
            PersonSettlement {
                items,
                individual_total: base.entries[idx],
                adjustment_shares,
                final_total,
            },
        );
    }

    let settled: Money = per_person
        .values()
        .map(|person| person.final_total)
        .sum();
    if settled != total_bill {
        tracing::error!(
            expected = %total_bill,
            actual = %settled,
            person_count = persons.len(),
            "settlement failed post-rounding reconciliation"
        );
        return Err(SettleError::RoundingReconciliation {
            expected: total_bill,
            actual: settled,
        });
    }

    Ok(BillSettlement {
        currency: bill.currency.clone(),
        total_bill,
        total_tax,
        total_fees,
        total_discount,
        per_person,
    })
}

/// The positive magnitude of an adjustment: the pre-computed amount
/// when present, otherwise `rate * grand_item_total` for proportional
/// kinds. Validation guarantees one of the two exists.
fn adjustment_amount(
    adjustment: &Adjustment,
    grand_item_total: Money,
    index: usize,
) -> Result<Money, SettleError> {
    if let Some(amount) = adjustment.amount {
        return Ok(amount);
    }
    let rate = adjustment
        .rate
        .ok_or(InvalidBillReason::MissingAmountAndRate { index })?;
    Ok(grand_item_total * rate)
}

/// Splits `amount` in proportion to per-person item totals, falling
/// back to an equal split when the item base is zero.
fn proportional_split(
    amount: Money,
    individual_totals: &[Money],
    grand_item_total: Money,
) -> Vec<Money> {
    if grand_item_total.is_zero() {
        return split_by_weights(amount, &vec![Decimal::ONE; individual_totals.len()]);
    }
    let weights: Vec<Decimal> = individual_totals
        .iter()
        .map(|total| total.as_decimal())
        .collect();
    split_by_weights(amount, &weights)
}

fn validate(bill: &Bill) -> Result<(), InvalidBillReason> {
    if bill.items.is_empty() {
        return Err(InvalidBillReason::EmptyItems);
    }
    for item in &bill.items {
        if item.owners.is_empty() {
            return Err(InvalidBillReason::UnownedItem {
                description: item.description.clone(),
            });
        }
        if item.price.is_negative() {
            return Err(InvalidBillReason::NegativePrice {
                description: item.description.clone(),
            });
        }
    }
    for (index, adjustment) in bill.adjustments.iter().enumerate() {
        if let Some(amount) = adjustment.amount {
            if amount.is_negative() {
                return Err(InvalidBillReason::NegativeAmount { index });
            }
        }
        if let Some(rate) = adjustment.rate {
            if rate.is_sign_negative() && !rate.is_zero() {
                return Err(InvalidBillReason::NegativeRate { index });
            }
            if adjustment.kind == AdjustmentKind::RatedDiscount && rate > Decimal::ONE {
                return Err(InvalidBillReason::RateAboveOne { index });
            }
        }
        let needs_amount_or_rate = matches!(
            adjustment.kind,
            AdjustmentKind::ProportionalTax | AdjustmentKind::RatedDiscount
        );
        if adjustment.amount.is_none() && (!needs_amount_or_rate || adjustment.rate.is_none()) {
            return Err(InvalidBillReason::MissingAmountAndRate { index });
        }
    }
    Ok(())
}

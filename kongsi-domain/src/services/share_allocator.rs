//! Ownership resolution and exact share splitting.
//!
//! Splitting never creates or destroys value: the final share in a
//! split is defined as the unallocated remainder, so shares always sum
//! to the split total at full decimal precision.

use fxhash::FxHashSet;
use rust_decimal::Decimal;

use crate::{
    error::InvalidBillReason,
    model::{LineItem, Money},
};

/// Builds the person set implied by the items' owner lists, in first
/// appearance order. The first resolved person is the designated
/// recipient of any rounding residue.
pub fn resolve_persons(items: &[LineItem]) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut persons = Vec::new();
    for item in items {
        for owner in &item.owners {
            if seen.insert(owner.name.as_str()) {
                persons.push(owner.name.clone());
            }
        }
    }
    persons
}

/// Effective owner weights for an item: all 1 when no owner declares a
/// weight, otherwise declared weights with absent ones defaulting to 1.
pub fn owner_weights(item: &LineItem) -> Result<Vec<Decimal>, InvalidBillReason> {
    let weights: Vec<Decimal> = item
        .owners
        .iter()
        .map(|owner| owner.weight.unwrap_or(Decimal::ONE))
        .collect();

    for (owner, weight) in item.owners.iter().zip(&weights) {
        if weight.is_sign_negative() {
            return Err(InvalidBillReason::NegativeWeight {
                description: item.description.clone(),
                owner: owner.name.clone(),
            });
        }
    }
    if weights.iter().sum::<Decimal>().is_zero() {
        return Err(InvalidBillReason::ZeroWeightSum {
            description: item.description.clone(),
        });
    }

    Ok(weights)
}

/// Splits `total` across `weights`, normalizing the weights. The last
/// share absorbs the division remainder so the shares sum to `total`
/// exactly.
///
/// Callers must ensure the weights are non-negative with a positive
/// sum; [`owner_weights`] enforces this for item splits.
pub fn split_by_weights(total: Money, weights: &[Decimal]) -> Vec<Money> {
    let weight_sum: Decimal = weights.iter().sum();
    let mut shares = Vec::with_capacity(weights.len());
    let mut allocated = Money::ZERO;

    for (idx, weight) in weights.iter().enumerate() {
        let share = if idx + 1 == weights.len() {
            total - allocated
        } else {
            Money::from_decimal(total.as_decimal() * weight / weight_sum)
        };
        allocated += share;
        shares.push(share);
    }

    shares
}

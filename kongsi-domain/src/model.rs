use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::{error::SettleError, services};

/// A monetary amount in the bill's currency, at full decimal precision.
///
/// Intermediate settlement math never leaves `Decimal`; values are only
/// quantized to the currency's minor unit when they are placed into a
/// [`BillSettlement`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Builds a money value from a mantissa and a decimal scale,
    /// e.g. `Money::new(1250, 2)` is 12.50.
    pub fn new(num: i64, scale: u32) -> Self {
        Self(Decimal::new(num, scale))
    }

    pub fn from_i64(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Money {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, value| acc + value)
    }
}

/// One person's claim on a line item.
///
/// `weight` is a relative, non-negative weight; owners without an
/// explicit weight count as weight 1 when any sibling carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub name: String,
    pub weight: Option<Decimal>,
}

impl Owner {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: None,
        }
    }

    pub fn weighted(name: impl Into<String>, weight: Decimal) -> Self {
        Self {
            name: name.into(),
            weight: Some(weight),
        }
    }
}

/// A priced entry on the bill, owned by one or more persons.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub price: Money,
    pub owners: Vec<Owner>,
}

/// How a shared charge or discount is allocated across persons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdjustmentKind {
    /// Tax/VAT, allocated in proportion to each person's item total.
    ProportionalTax,
    /// Service charge or other fee, split equally among all persons.
    FlatFee,
    /// A discount with a stated rate, allocated proportionally.
    RatedDiscount,
    /// A rate-less discount (e.g. a shipping discount), split equally.
    FlatDiscount,
}

impl AdjustmentKind {
    /// Discounts reduce what a person owes.
    pub fn is_discount(self) -> bool {
        matches!(self, Self::RatedDiscount | Self::FlatDiscount)
    }
}

/// A shared charge or discount attached to the whole bill.
///
/// `amount` is the pre-computed total magnitude of the adjustment.
/// Proportional kinds may instead carry only a `rate`, in which case
/// the amount is derived from the item base at settlement time. When
/// both are present, `amount` wins and `rate` is supporting metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub amount: Option<Money>,
    pub rate: Option<Decimal>,
}

impl Adjustment {
    pub fn with_amount(kind: AdjustmentKind, amount: Money) -> Self {
        Self {
            kind,
            amount: Some(amount),
            rate: None,
        }
    }

    pub fn with_rate(kind: AdjustmentKind, rate: Decimal) -> Self {
        Self {
            kind,
            amount: None,
            rate: Some(rate),
        }
    }
}

/// A structured bill, ready for settlement.
///
/// The person set is derived from the union of item owners, in first
/// appearance order; it is never declared separately.
#[derive(Debug, Clone, PartialEq)]
pub struct Bill {
    pub currency: String,
    pub items: Vec<LineItem>,
    pub adjustments: Vec<Adjustment>,
}

impl Bill {
    /// Settles the bill under the default context (2 decimal places,
    /// half-up rounding).
    pub fn settle(&self) -> Result<BillSettlement, SettleError> {
        services::settle(self, services::SettlementContext::default())
    }
}

/// A person's rounded share of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemShare {
    pub description: String,
    pub amount: Money,
}

/// A person's signed, rounded share of one adjustment. Discount shares
/// are negative.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentShare {
    /// Index into `Bill::adjustments`.
    pub index: usize,
    pub kind: AdjustmentKind,
    pub amount: Money,
}

/// Per-person output of a settlement. All amounts are quantized to the
/// settlement context's minor unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonSettlement {
    /// Item shares rounded independently of each other, so their sum can
    /// differ from `individual_total` by up to one minor unit.
    /// `individual_total` is the reconciled figure.
    pub items: Vec<ItemShare>,
    pub individual_total: Money,
    pub adjustment_shares: Vec<AdjustmentShare>,
    pub final_total: Money,
}

impl PersonSettlement {
    /// Sum of this person's signed shares of adjustments with the given
    /// kind.
    pub fn share_of(&self, kind: AdjustmentKind) -> Money {
        self.adjustment_shares
            .iter()
            .filter(|share| share.kind == kind)
            .map(|share| share.amount)
            .sum()
    }
}

/// Whole-bill output of a settlement.
///
/// Invariant: the per-person final totals sum exactly to `total_bill`
/// (the engine repairs rounding residue before returning).
#[derive(Debug, Clone, PartialEq)]
pub struct BillSettlement {
    pub currency: String,
    pub total_bill: Money,
    pub total_tax: Money,
    pub total_fees: Money,
    /// Positive magnitude of all discounts combined.
    pub total_discount: Money,
    pub per_person: IndexMap<String, PersonSettlement>,
}

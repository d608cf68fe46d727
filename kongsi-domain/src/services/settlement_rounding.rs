//! Output-boundary quantization with residue repair.
//!
//! The engine does all allocation math at full decimal precision and
//! only rounds when values are placed into the settlement output. Each
//! allocation column (item base, then one column per adjustment) is
//! rounded entry by entry; the residue between the rounded column total
//! and the sum of rounded entries is then repaired one minor unit at a
//! time, starting at the first entry (the designated person), so that
//! column totals reconcile exactly and no entry moves by more than one
//! unit in the common case.

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::model::Money;

/// Rounding mode for settlement quantization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundingMode {
    /// Round half away from zero (0.5 -> 1, -0.5 -> -1).
    HalfUp,
    /// Round half to nearest even (banker's rounding).
    HalfEven,
}

impl RoundingMode {
    pub(crate) fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

/// Context for settlement quantization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementContext {
    /// Decimal places of the currency's minor unit (2 for USD/IDR
    /// conventions used upstream, 0 for JPY).
    pub scale: u32,
    pub rounding_mode: RoundingMode,
}

impl Default for SettlementContext {
    fn default() -> Self {
        Self {
            scale: 2,
            rounding_mode: RoundingMode::HalfUp,
        }
    }
}

impl SettlementContext {
    /// One minor unit under this context.
    pub fn atomic_unit(self) -> Decimal {
        Decimal::new(1, self.scale)
    }
}

/// Rounds a single value to the context's minor unit.
pub fn quantize(value: Money, context: SettlementContext) -> Money {
    Money::from_decimal(
        value
            .as_decimal()
            .round_dp_with_strategy(context.scale, context.rounding_mode.strategy()),
    )
}

/// An allocation column after quantization. `entries` sum to `total`
/// exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedColumn {
    pub entries: Vec<Money>,
    pub total: Money,
}

/// Quantizes a column of exact per-person values whose exact sum is
/// `exact_total`, repairing any rounding residue so the rounded entries
/// sum to the rounded total.
///
/// Repair applies the residue one atomic unit per entry in person
/// order from the first (designated) entry. Nearest rounding bounds the
/// residue by half a unit per entry, so no entry ever moves by more
/// than one unit.
pub fn quantize_column(
    entries: &[Money],
    exact_total: Money,
    context: SettlementContext,
) -> QuantizedColumn {
    let total = quantize(exact_total, context);
    let mut rounded: Vec<Money> = entries
        .iter()
        .map(|value| quantize(*value, context))
        .collect();

    let allocated: Money = rounded.iter().copied().sum();
    let residual = total - allocated;
    if !residual.is_zero() && !rounded.is_empty() {
        let unit = context.atomic_unit();
        let step = if residual.is_negative() {
            Money::from_decimal(-unit)
        } else {
            Money::from_decimal(unit)
        };
        let steps = residual_steps(residual, unit);
        tracing::debug!(
            residual = %residual,
            steps,
            entry_count = entries.len(),
            "repairing rounding residue from the designated entry"
        );
        if steps as usize > entries.len().div_ceil(2) {
            tracing::warn!(
                residual = %residual,
                steps,
                entry_count = entries.len(),
                atomic_unit = %unit,
                "rounding residue exceeds the nearest-rounding bound"
            );
        }
        match steps {
            0 => {
                // Residue was not a whole number of units; quantized
                // inputs make this unreachable, repaired wholesale.
                rounded[0] += residual;
            }
            steps => {
                let len = rounded.len();
                for idx in 0..steps {
                    rounded[idx as usize % len] += step;
                }
            }
        }
    }

    QuantizedColumn {
        entries: rounded,
        total,
    }
}

/// Number of whole atomic units in the residue, or 0 when the residue
/// is not unit-aligned.
fn residual_steps(residual: Money, unit: Decimal) -> u64 {
    let units = residual.abs().as_decimal() / unit;
    match units.to_u64() {
        Some(steps) if Decimal::from(steps) == units => steps,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn ctx(scale: u32, rounding_mode: RoundingMode) -> SettlementContext {
        SettlementContext {
            scale,
            rounding_mode,
        }
    }

    #[rstest]
    #[case::half_up_rounds_away(Money::new(125, 3), 2, RoundingMode::HalfUp, Money::new(13, 2))]
    #[case::half_even_rounds_to_even(Money::new(125, 3), 2, RoundingMode::HalfEven, Money::new(12, 2))]
    #[case::negative_half_up(Money::new(-125, 3), 2, RoundingMode::HalfUp, Money::new(-13, 2))]
    #[case::integer_scale(Money::new(105, 1), 0, RoundingMode::HalfUp, Money::from_i64(11))]
    #[case::already_exact(Money::new(1250, 2), 2, RoundingMode::HalfUp, Money::new(1250, 2))]
    fn quantize_follows_mode_and_scale(
        #[case] value: Money,
        #[case] scale: u32,
        #[case] mode: RoundingMode,
        #[case] expected: Money,
    ) {
        assert_eq!(quantize(value, ctx(scale, mode)), expected);
    }

    #[test]
    fn single_unit_residue_lands_on_first_entry() {
        // 100 / 3: each entry rounds to 33.33, leaving 0.01 unallocated.
        let third = Money::from_decimal(Decimal::from(100) / Decimal::from(3));
        let column = quantize_column(
            &[third, third, Money::from_i64(100) - third - third],
            Money::from_i64(100),
            SettlementContext::default(),
        );

        assert_eq!(column.total, Money::from_i64(100));
        assert_eq!(column.entries[0], Money::new(3334, 2));
        assert_eq!(column.entries[1], Money::new(3333, 2));
        assert_eq!(column.entries[2], Money::new(3333, 2));
        let sum: Money = column.entries.iter().copied().sum();
        assert_eq!(sum, column.total);
    }

    #[test]
    fn multi_unit_residue_spreads_one_unit_per_entry() {
        // 0.13 split five ways is 0.026 each; all round up to 0.03,
        // overshooting by 0.02. The first two entries each give back a
        // cent, keeping every entry within one unit of its exact share.
        let share = Money::from_decimal(Decimal::new(13, 2) / Decimal::from(5));
        let column = quantize_column(
            &[share; 5],
            Money::new(13, 2),
            SettlementContext::default(),
        );

        assert_eq!(column.total, Money::new(13, 2));
        assert_eq!(
            column.entries,
            vec![
                Money::new(2, 2),
                Money::new(2, 2),
                Money::new(3, 2),
                Money::new(3, 2),
                Money::new(3, 2),
            ]
        );
    }

    #[test]
    fn exact_column_needs_no_repair() {
        let entries = [Money::new(6000, 2), Money::new(4000, 2)];
        let column = quantize_column(&entries, Money::from_i64(100), SettlementContext::default());
        assert_eq!(column.entries, entries);
        assert_eq!(column.total, Money::from_i64(100));
    }

    proptest! {
        #[test]
        fn quantized_columns_always_reconcile(
            cents in prop::collection::vec(-1_000_000i64..=1_000_000, 1..=10),
        ) {
            // Exact thirds stress the repair path.
            let entries: Vec<Money> = cents
                .iter()
                .map(|c| Money::from_decimal(Decimal::new(*c, 2) / Decimal::from(3)))
                .collect();
            let exact_total: Money = entries.iter().copied().sum();

            let column = quantize_column(&entries, exact_total, SettlementContext::default());
            let sum: Money = column.entries.iter().copied().sum();

            prop_assert_eq!(sum, column.total);
            prop_assert_eq!(column.total, quantize(exact_total, SettlementContext::default()));
        }

        #[test]
        fn repaired_entries_stay_within_one_unit(
            cents in prop::collection::vec(0i64..=1_000_000, 1..=8),
            divisor in 1i64..=9,
        ) {
            let entries: Vec<Money> = cents
                .iter()
                .map(|c| Money::from_decimal(Decimal::new(*c, 2) / Decimal::from(divisor)))
                .collect();
            let exact_total: Money = entries.iter().copied().sum();
            let context = SettlementContext::default();

            let column = quantize_column(&entries, exact_total, context);
            for (exact, repaired) in entries.iter().zip(&column.entries) {
                let drift = (*repaired - *exact).abs();
                prop_assert!(drift.as_decimal() <= context.atomic_unit() + context.atomic_unit() / Decimal::from(2));
            }
        }
    }
}

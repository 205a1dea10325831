//! Stacking
//!
//! Sequential application of eligible discounts in fixed tier order. Each
//! tier's deduction compounds on the running prices the previous tier left
//! behind, so a later percentage is always a percentage of the already
//! discounted amount. All arithmetic is on minor units.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::Money;
use smallvec::SmallVec;
use tracing::debug;

use crate::{
    calculation::{AppliedDiscount, CalculationError, CalculationResult},
    cart::OrderContext,
    catalog::UsageLedger,
    discounts::{Discount, DiscountKey, DiscountKind, Magnitude},
    eligibility::in_scope,
};

/// Tier application order: brand, then category, then voucher, then bank.
const KIND_ORDER: [DiscountKind; 4] = [
    DiscountKind::Brand,
    DiscountKind::Category,
    DiscountKind::Voucher,
    DiscountKind::Bank,
];

/// Apply `eligible` discounts to the order and produce the audit trail.
///
/// At most one discount per kind is applied; within a kind the discount whose
/// computed deduction (against the current running prices) is largest wins,
/// with the earliest candidate breaking ties. Each application is committed
/// through the ledger first; a refused consumption falls through to the next
/// best candidate of the same kind.
///
/// # Errors
///
/// Returns [`CalculationError::EmptyOrder`] for an order with no line items,
/// or [`CalculationError::PercentConversion`] if a percentage deduction
/// cannot be represented in minor units.
pub fn apply<'a, L: UsageLedger>(
    eligible: &[(DiscountKey, &Discount<'a>)],
    ctx: &OrderContext<'a>,
    ledger: &L,
) -> Result<CalculationResult<'a>, CalculationError> {
    if ctx.is_empty() {
        return Err(CalculationError::EmptyOrder);
    }

    // Per-line running prices, reduced in place as tiers apply.
    let mut running: Vec<i64> = ctx
        .iter()
        .map(|item| item.total_minor().unwrap_or(i64::MAX))
        .collect();

    let original_minor: i64 = running.iter().fold(0i64, |acc, price| {
        acc.saturating_add(*price)
    });

    let mut applied: SmallVec<[AppliedDiscount<'a>; 4]> = SmallVec::new();

    for kind in KIND_ORDER {
        let mut contenders: Vec<(DiscountKey, &Discount<'a>, i64)> = eligible
            .iter()
            .filter(|(_, discount)| discount.kind() == kind)
            .filter_map(|(key, discount)| {
                deduction_for(discount, ctx, &running)
                    .map(|amount| amount.map(|amount| (*key, *discount, amount)))
                    .transpose()
            })
            .collect::<Result<_, _>>()?;

        // Stable sort keeps the earliest candidate first among equal amounts.
        contenders.sort_by(|a, b| b.2.cmp(&a.2));

        for (key, discount, amount) in contenders {
            if !ledger.try_consume(key) {
                debug!(name = discount.name(), "usage limit exhausted, skipping");
                continue;
            }

            distribute(amount, discount, ctx, &mut running);

            let running_minor: i64 = running.iter().sum();

            debug!(
                name = discount.name(),
                ?kind,
                amount,
                running_total = running_minor,
                "applied discount"
            );

            applied.push(AppliedDiscount {
                key,
                kind,
                name: discount.name().to_string(),
                amount: Money::from_minor(amount, ctx.currency()),
                running_total: Money::from_minor(running_minor, ctx.currency()),
            });

            break;
        }
    }

    let final_minor: i64 = running.iter().sum();

    Ok(CalculationResult::new(
        Money::from_minor(original_minor, ctx.currency()),
        Money::from_minor(final_minor, ctx.currency()),
        applied,
    ))
}

/// Deduction the discount would make against the current running prices, or
/// `None` when nothing remains to deduct.
fn deduction_for(
    discount: &Discount<'_>,
    ctx: &OrderContext<'_>,
    running: &[i64],
) -> Result<Option<i64>, CalculationError> {
    let applicable: i64 = ctx
        .iter()
        .zip(running)
        .filter(|(item, _)| in_scope(discount, item))
        .map(|(_, price)| *price)
        .fold(0i64, i64::saturating_add);

    if applicable <= 0 {
        return Ok(None);
    }

    let raw = match discount.magnitude() {
        Magnitude::Percent(percent) => percent_of_minor(*percent, applicable)?,
        Magnitude::Amount(amount) => amount.to_minor_units(),
    };

    let capped = discount
        .cap()
        .map_or(raw, |cap| raw.min(cap.to_minor_units()));
    let amount = capped.min(applicable).max(0);

    Ok((amount > 0).then_some(amount))
}

/// Percentage of a minor-unit amount, rounded half away from zero.
fn percent_of_minor(percent: Percentage, minor: i64) -> Result<i64, CalculationError> {
    (percent * Decimal::from(minor))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(CalculationError::PercentConversion)
}

/// Spread `amount` across the in-scope lines, proportionally to their current
/// running prices, using largest-remainder allocation so the shares sum to
/// exactly `amount`.
fn distribute(amount: i64, discount: &Discount<'_>, ctx: &OrderContext<'_>, running: &mut [i64]) {
    let weights: Vec<(usize, i64)> = ctx
        .iter()
        .zip(running.iter())
        .enumerate()
        .filter(|(_, (item, _))| in_scope(discount, item))
        .map(|(i, (_, price))| (i, *price))
        .collect();

    let total: i128 = weights.iter().map(|(_, weight)| i128::from(*weight)).sum();

    if total <= 0 {
        return;
    }

    let mut shares: Vec<(usize, i64, i128)> = weights
        .iter()
        .map(|(i, weight)| {
            let scaled = i128::from(amount) * i128::from(*weight);
            let base = (scaled / total) as i64;
            (*i, base, scaled % total)
        })
        .collect();

    let assigned: i64 = shares.iter().map(|(_, base, _)| base).sum();
    let mut leftover = amount - assigned;

    // Largest remainder first; ties go to the earlier line.
    shares.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    for (_, base, _) in &mut shares {
        if leftover == 0 {
            break;
        }

        *base += 1;
        leftover -= 1;
    }

    for (i, share, _) in shares {
        if let Some(price) = running.get_mut(i) {
            *price -= share;
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::INR;
    use testresult::TestResult;

    use crate::{
        cart::{CartError, LineItem},
        catalog::DryRun,
        discounts::Offer,
    };

    use super::*;

    fn brand(name: &str, brand: &str, points: i64) -> Discount<'static> {
        Discount::new(
            name,
            Offer::Brand {
                brand: brand.to_string(),
            },
            Magnitude::percent(points),
        )
    }

    fn category(name: &str, category: &str, points: i64) -> Discount<'static> {
        Discount::new(
            name,
            Offer::Category {
                category: category.to_string(),
            },
            Magnitude::percent(points),
        )
    }

    fn bank(name: &str, bank: &str, points: i64) -> Discount<'static> {
        Discount::new(
            name,
            Offer::Bank {
                bank: bank.to_string(),
            },
            Magnitude::percent(points),
        )
    }

    fn puma_tee_order() -> Result<OrderContext<'static>, CartError> {
        OrderContext::with_items(
            [LineItem::new(
                "prod-001",
                "PUMA",
                "T-shirts",
                Money::from_minor(100_000, INR),
                2,
            )],
            "regular",
            INR,
        )
    }

    struct Refuses(DiscountKey);

    impl UsageLedger for Refuses {
        fn try_consume(&self, key: DiscountKey) -> bool {
            key != self.0
        }
    }

    #[test]
    fn percent_rounds_midpoint_away_from_zero() -> TestResult {
        let five_percent = Percentage::from(Decimal::new(5, 2));

        // 5% of 1050 is 52.5, which rounds up to 53.
        assert_eq!(percent_of_minor(five_percent, 1050)?, 53);
        assert_eq!(percent_of_minor(five_percent, 1000)?, 50);

        Ok(())
    }

    #[test]
    fn tiers_compound_on_the_running_price() -> TestResult {
        let puma = brand("PUMA 40%", "PUMA", 40);
        let tees = category("T-shirts 10%", "T-shirts", 10);
        let icici = bank("ICICI 10%", "ICICI", 10);

        let ctx = puma_tee_order()?;
        let eligible = [
            (DiscountKey::default(), &icici),
            (DiscountKey::default(), &tees),
            (DiscountKey::default(), &puma),
        ];

        let result = apply(&eligible, &ctx, &DryRun)?;

        // 200000 -40% -> 120000 -10% -> 108000 -10% -> 97200.
        assert_eq!(result.original_total(), Money::from_minor(200_000, INR));
        assert_eq!(result.final_total(), Money::from_minor(97_200, INR));

        let amounts: Vec<i64> = result
            .applied_discounts()
            .iter()
            .map(|step| step.amount.to_minor_units())
            .collect();
        assert_eq!(amounts, vec![80_000, 12_000, 10_800]);

        let kinds: Vec<DiscountKind> = result
            .applied_discounts()
            .iter()
            .map(|step| step.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![DiscountKind::Brand, DiscountKind::Category, DiscountKind::Bank]
        );

        Ok(())
    }

    #[test]
    fn empty_order_is_an_error() -> TestResult {
        let ctx = OrderContext::with_items([], "regular", INR)?;

        assert_eq!(
            apply(&[], &ctx, &DryRun).err(),
            Some(CalculationError::EmptyOrder)
        );

        Ok(())
    }

    #[test]
    fn no_eligible_discounts_leaves_the_total_untouched() -> TestResult {
        let ctx = puma_tee_order()?;
        let result = apply(&[], &ctx, &DryRun)?;

        assert_eq!(result.final_total(), result.original_total());
        assert!(result.applied_discounts().is_empty());

        Ok(())
    }

    #[test]
    fn cap_clamps_the_deduction() -> TestResult {
        let puma = brand("PUMA 40%", "PUMA", 40).with_cap(Money::from_minor(50_000, INR));
        let ctx = puma_tee_order()?;
        let eligible = [(DiscountKey::default(), &puma)];

        let result = apply(&eligible, &ctx, &DryRun)?;

        // 40% of 200000 is 80000, clamped to the 50000 cap.
        assert_eq!(result.final_total(), Money::from_minor(150_000, INR));

        Ok(())
    }

    #[test]
    fn fixed_amount_never_deducts_below_zero() -> TestResult {
        let voucher = Discount::new(
            "FLAT5000",
            Offer::Voucher {
                code: "FLAT5000".to_string(),
            },
            Magnitude::Amount(Money::from_minor(500_000, INR)),
        );
        let ctx = puma_tee_order()?;
        let eligible = [(DiscountKey::default(), &voucher)];

        let result = apply(&eligible, &ctx, &DryRun)?;

        // The flat amount exceeds the subtotal, so the order bottoms out at zero.
        assert_eq!(result.final_total(), Money::from_minor(0, INR));
        assert_eq!(
            result.applied_discounts()[0].amount,
            Money::from_minor(200_000, INR)
        );

        Ok(())
    }

    #[test]
    fn largest_deduction_wins_within_a_kind() -> TestResult {
        let small = brand("PUMA 10%", "PUMA", 10);
        let large = brand("PUMA 40%", "PUMA", 40);
        let ctx = puma_tee_order()?;
        let eligible = [
            (DiscountKey::default(), &small),
            (DiscountKey::default(), &large),
        ];

        let result = apply(&eligible, &ctx, &DryRun)?;

        assert_eq!(result.applied_discounts().len(), 1);
        assert_eq!(result.applied_discounts()[0].name, "PUMA 40%");

        Ok(())
    }

    #[test]
    fn refused_consumption_falls_through_to_the_next_candidate() -> TestResult {
        let mut keys = slotmap::SlotMap::<DiscountKey, ()>::with_key();
        let winner = keys.insert(());
        let runner_up = keys.insert(());

        let small = brand("PUMA 10%", "PUMA", 10);
        let large = brand("PUMA 40%", "PUMA", 40);
        let ctx = puma_tee_order()?;
        let eligible = [(runner_up, &small), (winner, &large)];

        let result = apply(&eligible, &ctx, &Refuses(winner))?;

        assert_eq!(result.applied_discounts().len(), 1);
        assert_eq!(result.applied_discounts()[0].name, "PUMA 10%");

        Ok(())
    }

    #[test]
    fn scoped_deduction_only_reduces_in_scope_lines() -> TestResult {
        let ctx = OrderContext::with_items(
            [
                LineItem::new(
                    "prod-001",
                    "PUMA",
                    "T-shirts",
                    Money::from_minor(100_000, INR),
                    1,
                ),
                LineItem::new(
                    "prod-004",
                    "Zara",
                    "Jeans",
                    Money::from_minor(100_000, INR),
                    1,
                ),
            ],
            "regular",
            INR,
        )?;

        let puma = brand("PUMA 50%", "PUMA", 50);
        let jeans = category("Jeans 10%", "Jeans", 10);
        let eligible = [
            (DiscountKey::default(), &puma),
            (DiscountKey::default(), &jeans),
        ];

        let result = apply(&eligible, &ctx, &DryRun)?;

        // The brand discount halves only the PUMA line; the category discount
        // then sees the untouched Zara jeans line.
        assert_eq!(result.applied_discounts()[0].amount, Money::from_minor(50_000, INR));
        assert_eq!(result.applied_discounts()[1].amount, Money::from_minor(10_000, INR));
        assert_eq!(result.final_total(), Money::from_minor(140_000, INR));

        Ok(())
    }

    #[test]
    fn distribution_shares_sum_to_the_exact_deduction() -> TestResult {
        // Three odd-priced lines under a cart-wide voucher force remainders.
        let ctx = OrderContext::with_items(
            [
                LineItem::new("prod-001", "PUMA", "T-shirts", Money::from_minor(333, INR), 1),
                LineItem::new("prod-002", "Nike", "Shoes", Money::from_minor(333, INR), 1),
                LineItem::new("prod-003", "Zara", "Jeans", Money::from_minor(334, INR), 1),
            ],
            "regular",
            INR,
        )?;

        let voucher = Discount::new(
            "THIRD",
            Offer::Voucher {
                code: "THIRD".to_string(),
            },
            Magnitude::percent(33),
        );
        let eligible = [(DiscountKey::default(), &voucher)];

        let result = apply(&eligible, &ctx, &DryRun)?;

        // 33% of 1000 is 330; the final total must account for every unit.
        assert_eq!(result.applied_discounts()[0].amount, Money::from_minor(330, INR));
        assert_eq!(result.final_total(), Money::from_minor(670, INR));

        Ok(())
    }
}

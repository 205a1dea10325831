//! Eligibility
//!
//! Pure applicability rules for one candidate discount against one order.
//! Absence of eligibility is a boolean, not a failure; nothing here mutates
//! state or touches the clock.

use jiff::Timestamp;

use crate::{
    cart::{LineItem, OrderContext},
    discounts::{Discount, Offer},
};

/// Decide whether `discount` applies to `ctx` at instant `now`.
///
/// `remaining_uses` is the catalog's current counter for the discount
/// (`None` for unlimited); callers without a catalog can pass
/// `discount.usage_limit()`.
///
/// Rules are evaluated in a fixed order and short-circuit on the first
/// failure:
///
/// 1. the validity window contains `now`,
/// 2. remaining uses are greater than zero (if limited),
/// 3. the customer tier is in the eligible set (or the set is empty),
/// 4. the applicable subtotal meets the minimum order amount,
/// 5. at least one line item remains in scope after exclusions.
#[must_use]
pub fn is_eligible(
    discount: &Discount<'_>,
    remaining_uses: Option<u32>,
    ctx: &OrderContext<'_>,
    now: Timestamp,
) -> bool {
    if !discount.window().contains(now) {
        return false;
    }

    if matches!(remaining_uses.or(discount.usage_limit()), Some(0)) {
        return false;
    }

    if !discount.tiers().is_empty() && !discount.tiers().contains(ctx.customer_tier()) {
        return false;
    }

    if let Some(minimum) = discount.minimum_order() {
        if applicable_subtotal_minor(discount, ctx) < minimum.to_minor_units() {
            return false;
        }
    }

    ctx.iter().any(|item| in_scope(discount, item))
}

/// Returns whether a line item falls inside the discount's scope.
///
/// Brand and category discounts match their named scope exactly; vouchers
/// and bank offers are cart-wide. Excluded products never match.
pub(crate) fn in_scope(discount: &Discount<'_>, item: &LineItem<'_>) -> bool {
    if discount.excluded_products().contains(item.product()) {
        return false;
    }

    match discount.offer() {
        Offer::Brand { brand } => item.brand() == brand,
        Offer::Category { category } => item.category() == category,
        Offer::Voucher { .. } | Offer::Bank { .. } => true,
    }
}

/// Sum of original line totals inside the discount's scope, in minor units.
pub(crate) fn applicable_subtotal_minor(discount: &Discount<'_>, ctx: &OrderContext<'_>) -> i64 {
    ctx.iter()
        .filter(|item| in_scope(discount, item))
        .map(|item| item.total_minor().unwrap_or(i64::MAX))
        .fold(0i64, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::INR};
    use testresult::TestResult;

    use crate::{
        cart::CartError,
        discounts::{Magnitude, ValidityWindow},
    };

    use super::*;

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

    fn puma_brand_discount() -> Discount<'static> {
        Discount::new(
            "PUMA 40%",
            Offer::Brand {
                brand: "PUMA".to_string(),
            },
            Magnitude::percent(40),
        )
    }

    fn noon() -> Timestamp {
        "2026-08-01T12:00:00Z".parse().unwrap_or_default()
    }

    #[test]
    fn eligible_when_all_rules_pass() -> TestResult {
        let ctx = puma_tee_order()?;

        assert!(is_eligible(&puma_brand_discount(), None, &ctx, noon()));

        Ok(())
    }

    #[test]
    fn expired_window_fails_first() -> TestResult {
        let ctx = puma_tee_order()?;
        let window = ValidityWindow::new(
            "2026-01-01T00:00:00Z".parse()?,
            "2026-02-01T00:00:00Z".parse()?,
        );
        let discount = puma_brand_discount().with_window(window);

        assert!(!is_eligible(&discount, None, &ctx, noon()));

        Ok(())
    }

    #[test]
    fn zero_remaining_uses_fails() -> TestResult {
        let ctx = puma_tee_order()?;
        let discount = puma_brand_discount().with_usage_limit(5);

        assert!(!is_eligible(&discount, Some(0), &ctx, noon()));
        assert!(is_eligible(&discount, Some(1), &ctx, noon()));

        Ok(())
    }

    #[test]
    fn usage_limit_of_zero_is_never_eligible() -> TestResult {
        let ctx = puma_tee_order()?;
        let discount = puma_brand_discount().with_usage_limit(0);

        assert!(!is_eligible(&discount, None, &ctx, noon()));

        Ok(())
    }

    #[test]
    fn tier_restriction_excludes_other_tiers() -> TestResult {
        let ctx = puma_tee_order()?;
        let discount = puma_brand_discount().with_tiers(["premium"]);

        assert!(!is_eligible(&discount, None, &ctx, noon()));

        Ok(())
    }

    #[test]
    fn empty_tier_set_means_all_tiers() -> TestResult {
        let ctx = puma_tee_order()?;

        assert!(is_eligible(
            &puma_brand_discount().with_tiers(Vec::<&str>::new()),
            None,
            &ctx,
            noon()
        ));

        Ok(())
    }

    #[test]
    fn minimum_is_checked_against_the_applicable_subtotal() -> TestResult {
        // Order total is ₹2500, but only ₹2000 of it is PUMA.
        let ctx = OrderContext::with_items(
            [
                LineItem::new(
                    "prod-001",
                    "PUMA",
                    "T-shirts",
                    Money::from_minor(100_000, INR),
                    2,
                ),
                LineItem::new("prod-004", "Zara", "Jeans", Money::from_minor(50_000, INR), 1),
            ],
            "regular",
            INR,
        )?;

        let just_met = puma_brand_discount().with_minimum_order(Money::from_minor(200_000, INR));
        let unmet = puma_brand_discount().with_minimum_order(Money::from_minor(200_001, INR));

        assert!(is_eligible(&just_met, None, &ctx, noon()));
        assert!(!is_eligible(&unmet, None, &ctx, noon()));

        Ok(())
    }

    #[test]
    fn exclusions_can_empty_the_scope() -> TestResult {
        let ctx = puma_tee_order()?;
        let discount = puma_brand_discount().with_excluded_products(["prod-001"]);

        assert!(!is_eligible(&discount, None, &ctx, noon()));

        Ok(())
    }

    #[test]
    fn voucher_scope_is_cart_wide_minus_exclusions() -> TestResult {
        let ctx = puma_tee_order()?;
        let voucher = Discount::new(
            "SUPER69",
            Offer::Voucher {
                code: "SUPER69".to_string(),
            },
            Magnitude::percent(69),
        );

        assert_eq!(applicable_subtotal_minor(&voucher, &ctx), 200_000);

        let excluded = voucher.with_excluded_products(["prod-001"]);
        assert_eq!(applicable_subtotal_minor(&excluded, &ctx), 0);

        Ok(())
    }

    #[test]
    fn no_matching_brand_means_not_eligible() -> TestResult {
        let ctx = puma_tee_order()?;
        let discount = Discount::new(
            "Nike 30%",
            Offer::Brand {
                brand: "Nike".to_string(),
            },
            Magnitude::percent(30),
        );

        assert!(!is_eligible(&discount, None, &ctx, noon()));

        Ok(())
    }
}

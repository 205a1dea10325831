//! Engine
//!
//! Entry point tying the catalog, eligibility rules and stacking calculator
//! together. `calculate` consumes usage; `quote` runs the same pipeline
//! against a no-op ledger so previews never spend a limited discount.

use jiff::Timestamp;
use tracing::{debug, instrument};

use crate::{
    calculation::{CalculationError, CalculationResult},
    cart::OrderContext,
    catalog::{Catalog, DryRun},
    discounts::{Discount, DiscountKey},
    eligibility::is_eligible,
    stacking,
};

/// Discount calculation engine over one catalog.
#[derive(Debug, Clone, Copy)]
pub struct DiscountEngine<'a> {
    catalog: &'a Catalog<'a>,
}

impl<'a> DiscountEngine<'a> {
    /// Create an engine over the given catalog.
    #[must_use]
    pub fn new(catalog: &'a Catalog<'a>) -> Self {
        Self { catalog }
    }

    /// Returns the catalog the engine calculates against.
    #[must_use]
    pub fn catalog(&self) -> &'a Catalog<'a> {
        self.catalog
    }

    /// Calculate the order's final price, consuming usage for every applied
    /// discount.
    ///
    /// # Errors
    ///
    /// Returns a [`CalculationError`] for an empty order or a failed
    /// minor-unit conversion.
    pub fn calculate(
        &self,
        ctx: &OrderContext<'a>,
    ) -> Result<CalculationResult<'a>, CalculationError> {
        self.calculate_at(ctx, Timestamp::now())
    }

    /// [`Self::calculate`] at an explicit instant, for deterministic tests
    /// and replays.
    ///
    /// # Errors
    ///
    /// Returns a [`CalculationError`] for an empty order or a failed
    /// minor-unit conversion.
    #[instrument(skip_all, fields(lines = ctx.len(), tier = %ctx.customer_tier().0))]
    pub fn calculate_at(
        &self,
        ctx: &OrderContext<'a>,
        now: Timestamp,
    ) -> Result<CalculationResult<'a>, CalculationError> {
        let eligible = self.eligible(ctx, now)?;

        stacking::apply(&eligible, ctx, self.catalog)
    }

    /// Preview the order's final price without consuming any usage.
    ///
    /// # Errors
    ///
    /// Returns a [`CalculationError`] for an empty order or a failed
    /// minor-unit conversion.
    pub fn quote(&self, ctx: &OrderContext<'a>) -> Result<CalculationResult<'a>, CalculationError> {
        self.quote_at(ctx, Timestamp::now())
    }

    /// [`Self::quote`] at an explicit instant.
    ///
    /// # Errors
    ///
    /// Returns a [`CalculationError`] for an empty order or a failed
    /// minor-unit conversion.
    #[instrument(skip_all, fields(lines = ctx.len(), tier = %ctx.customer_tier().0))]
    pub fn quote_at(
        &self,
        ctx: &OrderContext<'a>,
        now: Timestamp,
    ) -> Result<CalculationResult<'a>, CalculationError> {
        let eligible = self.eligible(ctx, now)?;

        stacking::apply(&eligible, ctx, &DryRun)
    }

    /// Check whether a voucher code exists and is currently eligible for the
    /// order, without calculating anything.
    ///
    /// The order's own voucher code is ignored; only `code` is looked up.
    #[must_use]
    pub fn validate_code(&self, code: &str, ctx: &OrderContext<'a>, now: Timestamp) -> bool {
        self.catalog
            .voucher_by_code(code)
            .is_some_and(|(key, discount)| {
                is_eligible(discount, self.catalog.remaining_uses(key), ctx, now)
            })
    }

    fn eligible(
        &self,
        ctx: &OrderContext<'a>,
        now: Timestamp,
    ) -> Result<Vec<(DiscountKey, &'a Discount<'a>)>, CalculationError> {
        if ctx.is_empty() {
            return Err(CalculationError::EmptyOrder);
        }

        let candidates = self.catalog.candidates(ctx);
        let candidate_count = candidates.len();

        let eligible: Vec<(DiscountKey, &'a Discount<'a>)> = candidates
            .into_iter()
            .filter(|(key, discount)| {
                is_eligible(discount, self.catalog.remaining_uses(*key), ctx, now)
            })
            .collect();

        debug!(
            candidates = candidate_count,
            eligible = eligible.len(),
            "filtered catalog"
        );

        Ok(eligible)
    }
}

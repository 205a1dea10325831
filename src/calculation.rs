//! Calculation results
//!
//! The audit trail handed back to callers: one entry per applied discount
//! plus the order's original and final totals. This is the only structure a
//! presentation layer may consume.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::discounts::{DiscountKey, DiscountKind};

/// Errors that can occur while running a calculation.
#[derive(Debug, Error, PartialEq)]
pub enum CalculationError {
    /// The order has no line items.
    #[error("order has no line items")]
    EmptyOrder,

    /// A percentage amount could not be represented in minor units.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// One step of the audit trail: which discount ran, what it deducted, and
/// the running total it left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDiscount<'a> {
    /// Key of the applied discount.
    pub key: DiscountKey,

    /// Kind of the applied discount.
    pub kind: DiscountKind,

    /// Display name of the applied discount.
    pub name: String,

    /// Amount deducted by this step.
    pub amount: Money<'a, Currency>,

    /// Running order total after this step.
    pub running_total: Money<'a, Currency>,
}

/// Final outcome of one calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResult<'a> {
    original_total: Money<'a, Currency>,
    final_total: Money<'a, Currency>,
    applied: SmallVec<[AppliedDiscount<'a>; 4]>,
}

impl<'a> CalculationResult<'a> {
    /// Create a result from totals and the ordered applied-discount trail.
    #[must_use]
    pub fn new(
        original_total: Money<'a, Currency>,
        final_total: Money<'a, Currency>,
        applied: SmallVec<[AppliedDiscount<'a>; 4]>,
    ) -> Self {
        Self {
            original_total,
            final_total,
            applied,
        }
    }

    /// Order total before any discounts.
    #[must_use]
    pub fn original_total(&self) -> Money<'a, Currency> {
        self.original_total
    }

    /// Order total after all discounts.
    #[must_use]
    pub fn final_total(&self) -> Money<'a, Currency> {
        self.final_total
    }

    /// Applied discounts in application order.
    #[must_use]
    pub fn applied_discounts(&self) -> &[AppliedDiscount<'a>] {
        &self.applied
    }

    /// Total savings across all applied discounts.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction fails.
    pub fn savings(&self) -> Result<Money<'a, Currency>, MoneyError> {
        self.original_total.sub(self.final_total)
    }

    /// Savings as a fraction of the original total.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction fails.
    pub fn savings_percent(&self) -> Result<Percentage, MoneyError> {
        let savings = self.savings()?;

        // Relative to the original (pre-discount) total; done in decimal
        // space to avoid integer division truncation.
        let savings_minor = savings.to_minor_units();
        let original_minor = self.original_total.to_minor_units();

        if original_minor == 0 {
            return Ok(Percentage::from(0.0));
        }

        let savings_dec = Decimal::from_i64(savings_minor).unwrap_or(Decimal::ZERO);
        let original_dec = Decimal::from_i64(original_minor).unwrap_or(Decimal::ZERO);

        Ok(Percentage::from(savings_dec / original_dec))
    }
}

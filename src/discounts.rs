//! Discounts
//!
//! Offer definitions: what a discount is scoped to, how big it is, and when
//! and for whom it applies. Validation here is load-time only; a discount
//! that passes [`Discount::validate`] can never fail mid-calculation.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

use crate::cart::{CustomerTier, ProductId};

new_key_type! {
    /// Discount Key
    pub struct DiscountKey;
}

/// Discount kind, in tier application order.
///
/// Brand and category discounts form Tier 1 (brand applied first), vouchers
/// Tier 2, bank offers Tier 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountKind {
    /// Discount scoped to one brand's line items.
    Brand,

    /// Discount scoped to one category's line items.
    Category,

    /// Customer-entered voucher code, applied cart-wide.
    Voucher,

    /// Bank offer gated on the payment card's issuing bank, applied cart-wide.
    Bank,
}

/// What a discount is scoped to.
///
/// The variant determines the kind; scope fields that do not belong to a kind
/// are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer {
    /// Applies to line items of this brand.
    Brand {
        /// Brand name, matched exactly against line items.
        brand: String,
    },

    /// Applies to line items of this category.
    Category {
        /// Category name, matched exactly against line items.
        category: String,
    },

    /// Applies cart-wide when the customer supplies this code.
    Voucher {
        /// Voucher code; matching is case-sensitive and exact.
        code: String,
    },

    /// Applies cart-wide when paying by card issued by this bank.
    Bank {
        /// Issuing bank identifier.
        bank: String,
    },
}

impl Offer {
    /// The kind this scope belongs to.
    #[must_use]
    pub fn kind(&self) -> DiscountKind {
        match self {
            Offer::Brand { .. } => DiscountKind::Brand,
            Offer::Category { .. } => DiscountKind::Category,
            Offer::Voucher { .. } => DiscountKind::Voucher,
            Offer::Bank { .. } => DiscountKind::Bank,
        }
    }

    fn scope_value(&self) -> &str {
        match self {
            Offer::Brand { brand } => brand,
            Offer::Category { category } => category,
            Offer::Voucher { code } => code,
            Offer::Bank { bank } => bank,
        }
    }
}

/// Size of a discount: a percentage of the applicable subtotal or a fixed
/// amount off it, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Magnitude<'a> {
    /// Percentage of the applicable subtotal, stored as a decimal fraction.
    Percent(Percentage),

    /// Fixed amount off the applicable subtotal.
    Amount(Money<'a, Currency>),
}

impl Magnitude<'_> {
    /// Percentage magnitude from percent points (e.g. `40` for 40% off).
    #[must_use]
    pub fn percent(points: impl Into<Decimal>) -> Self {
        Magnitude::Percent(Percentage::from(points.into() / Decimal::ONE_HUNDRED))
    }
}

/// Half-open validity window `[starts_at, ends_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    starts_at: Timestamp,
    ends_at: Timestamp,
}

impl ValidityWindow {
    /// Create a window from start and end timestamps.
    #[must_use]
    pub fn new(starts_at: Timestamp, ends_at: Timestamp) -> Self {
        Self { starts_at, ends_at }
    }

    /// Window spanning all representable time.
    #[must_use]
    pub fn always() -> Self {
        Self {
            starts_at: Timestamp::MIN,
            ends_at: Timestamp::MAX,
        }
    }

    /// Returns whether `now` falls inside the window.
    #[must_use]
    pub fn contains(&self, now: Timestamp) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Window start.
    #[must_use]
    pub fn starts_at(&self) -> Timestamp {
        self.starts_at
    }

    /// Window end (exclusive).
    #[must_use]
    pub fn ends_at(&self) -> Timestamp {
        self.ends_at
    }
}

/// Errors raised while validating a stored discount at catalog-load time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountConfigError {
    /// Percentage magnitude outside the [0, 100] percent-point range.
    #[error("percentage magnitude must be within 0-100 percent points")]
    PercentOutOfRange,

    /// Fixed magnitude amount is negative.
    #[error("fixed magnitude amount must not be negative")]
    NegativeAmount,

    /// Cap amount is negative.
    #[error("cap must not be negative")]
    NegativeCap,

    /// Minimum order amount is negative.
    #[error("minimum order amount must not be negative")]
    NegativeMinimum,

    /// Validity window ends on or before it starts.
    #[error("validity window ends on or before it starts")]
    InvertedWindow,

    /// A scope field (brand, category, code or bank) is empty.
    #[error("{0} scope must not be empty")]
    EmptyScope(&'static str),

    /// A money field's currency differs from the catalog currency (field currency, catalog currency).
    #[error("discount money field has currency {0}, but the catalog has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),
}

/// A stored discount definition.
///
/// Read-only configuration for the duration of a calculation; only the
/// catalog's usage counter ever changes after load.
#[derive(Debug, Clone)]
pub struct Discount<'a> {
    name: String,
    offer: Offer,
    magnitude: Magnitude<'a>,
    cap: Option<Money<'a, Currency>>,
    minimum_order: Option<Money<'a, Currency>>,
    window: ValidityWindow,
    usage_limit: Option<u32>,
    tiers: FxHashSet<CustomerTier>,
    excluded_products: FxHashSet<ProductId>,
}

impl<'a> Discount<'a> {
    /// Create a discount with no cap, minimum, usage limit or tier/product
    /// restrictions, valid forever.
    #[must_use]
    pub fn new(name: impl Into<String>, offer: Offer, magnitude: Magnitude<'a>) -> Self {
        Self {
            name: name.into(),
            offer,
            magnitude,
            cap: None,
            minimum_order: None,
            window: ValidityWindow::always(),
            usage_limit: None,
            tiers: FxHashSet::default(),
            excluded_products: FxHashSet::default(),
        }
    }

    /// Cap the maximum amount this discount may deduct.
    #[must_use]
    pub fn with_cap(mut self, cap: Money<'a, Currency>) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Require a minimum applicable subtotal before the discount applies.
    #[must_use]
    pub fn with_minimum_order(mut self, minimum: Money<'a, Currency>) -> Self {
        self.minimum_order = Some(minimum);
        self
    }

    /// Restrict the discount to a validity window.
    #[must_use]
    pub fn with_window(mut self, window: ValidityWindow) -> Self {
        self.window = window;
        self
    }

    /// Limit the number of redemptions.
    #[must_use]
    pub fn with_usage_limit(mut self, limit: u32) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    /// Restrict the discount to the given customer tiers.
    ///
    /// An empty set means all tiers are eligible.
    #[must_use]
    pub fn with_tiers<T: Into<CustomerTier>>(mut self, tiers: impl IntoIterator<Item = T>) -> Self {
        self.tiers = tiers.into_iter().map(Into::into).collect();
        self
    }

    /// Exclude the given product ids from the discount's scope.
    #[must_use]
    pub fn with_excluded_products<P: Into<ProductId>>(
        mut self,
        products: impl IntoIterator<Item = P>,
    ) -> Self {
        self.excluded_products = products.into_iter().map(Into::into).collect();
        self
    }

    /// Discount display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scope of the discount.
    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    /// The kind of the discount, derived from its scope.
    #[must_use]
    pub fn kind(&self) -> DiscountKind {
        self.offer.kind()
    }

    /// Size of the discount.
    pub fn magnitude(&self) -> &Magnitude<'a> {
        &self.magnitude
    }

    /// Maximum amount the magnitude may yield, if capped.
    pub fn cap(&self) -> Option<&Money<'a, Currency>> {
        self.cap.as_ref()
    }

    /// Minimum applicable subtotal, if any.
    pub fn minimum_order(&self) -> Option<&Money<'a, Currency>> {
        self.minimum_order.as_ref()
    }

    /// Validity window of the discount.
    #[must_use]
    pub fn window(&self) -> ValidityWindow {
        self.window
    }

    /// Maximum number of redemptions, if limited.
    #[must_use]
    pub fn usage_limit(&self) -> Option<u32> {
        self.usage_limit
    }

    /// Eligible customer tiers; empty means all tiers.
    pub fn tiers(&self) -> &FxHashSet<CustomerTier> {
        &self.tiers
    }

    /// Product ids the discount never applies to.
    pub fn excluded_products(&self) -> &FxHashSet<ProductId> {
        &self.excluded_products
    }

    /// Validate internal consistency against the owning catalog's currency.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountConfigError`] for an out-of-range percentage, a
    /// negative money field, an inverted validity window, an empty scope
    /// field, or a money field in the wrong currency.
    pub fn validate(&self, currency: &'static Currency) -> Result<(), DiscountConfigError> {
        if self.offer.scope_value().is_empty() {
            return Err(DiscountConfigError::EmptyScope(match self.offer {
                Offer::Brand { .. } => "brand",
                Offer::Category { .. } => "category",
                Offer::Voucher { .. } => "voucher code",
                Offer::Bank { .. } => "bank",
            }));
        }

        match &self.magnitude {
            Magnitude::Percent(percent) => {
                let fraction = *percent * Decimal::ONE;

                if fraction < Decimal::ZERO || fraction > Decimal::ONE {
                    return Err(DiscountConfigError::PercentOutOfRange);
                }
            }
            Magnitude::Amount(amount) => {
                check_currency(amount, currency)?;

                if amount.to_minor_units() < 0 {
                    return Err(DiscountConfigError::NegativeAmount);
                }
            }
        }

        if let Some(cap) = &self.cap {
            check_currency(cap, currency)?;

            if cap.to_minor_units() < 0 {
                return Err(DiscountConfigError::NegativeCap);
            }
        }

        if let Some(minimum) = &self.minimum_order {
            check_currency(minimum, currency)?;

            if minimum.to_minor_units() < 0 {
                return Err(DiscountConfigError::NegativeMinimum);
            }
        }

        if self.window.ends_at() <= self.window.starts_at() {
            return Err(DiscountConfigError::InvertedWindow);
        }

        Ok(())
    }
}

fn check_currency(
    money: &Money<'_, Currency>,
    currency: &'static Currency,
) -> Result<(), DiscountConfigError> {
    if money.currency() == currency {
        Ok(())
    } else {
        Err(DiscountConfigError::CurrencyMismatch(
            money.currency().iso_alpha_code,
            currency.iso_alpha_code,
        ))
    }
}

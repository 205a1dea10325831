//! Carts
//!
//! Line items and the per-request order context fed into a calculation.

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Customer tier identifier (for example `premium` or `regular`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerTier(pub String);

impl From<&str> for CustomerTier {
    fn from(tier: &str) -> Self {
        Self(tier.to_string())
    }
}

/// How the order is being paid for.
///
/// Bank offers only ever match a [`PaymentInstrument::Card`] whose bank
/// matches the offer's bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentInstrument {
    /// Card payment issued by the named bank.
    Card {
        /// Issuing bank identifier, e.g. `ICICI`.
        bank: String,
    },

    /// UPI transfer.
    Upi,

    /// Cash on delivery.
    Cash,
}

/// Errors raised while validating an order's line items.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// A line item has a quantity of zero (index).
    #[error("line item {0} has a quantity of zero")]
    ZeroQuantity(usize),

    /// A line item has a negative unit price (index).
    #[error("line item {0} has a negative unit price")]
    NegativePrice(usize),

    /// An item's currency differs from the order currency (index, item currency, order currency).
    #[error("line item {0} has currency {1}, but the order has currency {2}")]
    CurrencyMismatch(usize, &'static str, &'static str),

    /// A line total overflowed minor-unit arithmetic (index).
    #[error("line item {0} total overflows minor-unit arithmetic")]
    PriceOverflow(usize),
}

/// One cart line: a product, its brand/category scope, a unit price and a
/// quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem<'a> {
    product: ProductId,
    brand: String,
    category: String,
    unit_price: Money<'a, Currency>,
    quantity: u32,
}

impl<'a> LineItem<'a> {
    /// Creates a new line item.
    #[must_use]
    pub fn new(
        product: impl Into<ProductId>,
        brand: impl Into<String>,
        category: impl Into<String>,
        unit_price: Money<'a, Currency>,
        quantity: u32,
    ) -> Self {
        Self {
            product: product.into(),
            brand: brand.into(),
            category: category.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the product id of the line.
    pub fn product(&self) -> &ProductId {
        &self.product
    }

    /// Returns the brand of the line.
    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Returns the category of the line.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the unit price of the line.
    pub fn unit_price(&self) -> &Money<'a, Currency> {
        &self.unit_price
    }

    /// Returns the quantity of the line.
    #[must_use]
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Line total (unit price × quantity) in minor units.
    pub(crate) fn total_minor(&self) -> Option<i64> {
        self.unit_price
            .to_minor_units()
            .checked_mul(i64::from(self.quantity))
    }
}

/// One calculation request: validated line items plus the customer, payment
/// and voucher context that discounts are matched against.
#[derive(Debug, Clone)]
pub struct OrderContext<'a> {
    items: Vec<LineItem<'a>>,
    customer_tier: CustomerTier,
    payment: Option<PaymentInstrument>,
    voucher_code: Option<String>,
    currency: &'static Currency,
}

impl<'a> OrderContext<'a> {
    /// Create an order context with the given items.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if any line item has a zero quantity, a
    /// negative unit price, a currency other than `currency`, or a line total
    /// that overflows minor-unit arithmetic.
    pub fn with_items(
        items: impl Into<Vec<LineItem<'a>>>,
        customer_tier: impl Into<CustomerTier>,
        currency: &'static Currency,
    ) -> Result<Self, CartError> {
        let items = items.into();

        items.iter().enumerate().try_for_each(|(i, item)| {
            let item_currency = item.unit_price().currency();

            if item_currency != currency {
                return Err(CartError::CurrencyMismatch(
                    i,
                    item_currency.iso_alpha_code,
                    currency.iso_alpha_code,
                ));
            }

            if item.quantity() == 0 {
                return Err(CartError::ZeroQuantity(i));
            }

            if item.unit_price().to_minor_units() < 0 {
                return Err(CartError::NegativePrice(i));
            }

            item.total_minor()
                .map(|_| ())
                .ok_or(CartError::PriceOverflow(i))
        })?;

        Ok(Self {
            items,
            customer_tier: customer_tier.into(),
            payment: None,
            voucher_code: None,
            currency,
        })
    }

    /// Attach a payment instrument to the order.
    #[must_use]
    pub fn with_payment(mut self, payment: PaymentInstrument) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Attach a customer-supplied voucher code to the order.
    #[must_use]
    pub fn with_voucher_code(mut self, code: impl Into<String>) -> Self {
        self.voucher_code = Some(code.into());
        self
    }

    /// Iterate over the line items in the order.
    pub fn iter(&self) -> impl Iterator<Item = &LineItem<'a>> {
        self.items.iter()
    }

    /// Returns the line items in the order.
    pub fn items(&self) -> &[LineItem<'a>] {
        &self.items
    }

    /// Returns the number of line items in the order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the order has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the customer tier on the order.
    pub fn customer_tier(&self) -> &CustomerTier {
        &self.customer_tier
    }

    /// Returns the payment instrument on the order, if any.
    pub fn payment(&self) -> Option<&PaymentInstrument> {
        self.payment.as_ref()
    }

    /// Returns the voucher code supplied by the customer, if any.
    pub fn voucher_code(&self) -> Option<&str> {
        self.voucher_code.as_deref()
    }

    /// Returns the currency of the order.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Order subtotal (sum of line totals) before any discounts.
    #[must_use]
    pub fn subtotal(&self) -> Money<'a, Currency> {
        Money::from_minor(self.subtotal_minor(), self.currency)
    }

    /// Order subtotal in minor units.
    ///
    /// Line totals were overflow-checked at construction, so the saturating
    /// fold never engages for a context built through [`Self::with_items`].
    pub(crate) fn subtotal_minor(&self) -> i64 {
        self.items
            .iter()
            .map(|item| item.total_minor().unwrap_or(i64::MAX))
            .fold(0i64, i64::saturating_add)
    }
}

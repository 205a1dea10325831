//! Catalog
//!
//! Owned store of discount definitions plus the usage counters they share.
//! The catalog is the only component with mutable state; candidate lookup is
//! read-only and usage consumption is an atomic check-and-decrement so that
//! concurrent calculations can never double-spend a limited discount.

use std::sync::atomic::{AtomicU32, Ordering};

use rusty_money::iso::Currency;
use slotmap::{SecondaryMap, SlotMap};

use crate::{
    cart::{OrderContext, PaymentInstrument},
    discounts::{Discount, DiscountConfigError, DiscountKey, Offer},
};

/// Mutation hook through which the calculator commits a discount application.
///
/// [`Catalog`] implements this with a real counter; [`DryRun`] consumes
/// nothing and is used for quotes.
pub trait UsageLedger {
    /// Attempt to consume one use of the discount.
    ///
    /// Returns `false` when the limit is exhausted; the caller must then skip
    /// the discount. Implementations must never let a counter go negative
    /// under concurrent calls.
    fn try_consume(&self, key: DiscountKey) -> bool;
}

/// Ledger that consumes nothing; every application is allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRun;

impl UsageLedger for DryRun {
    fn try_consume(&self, _key: DiscountKey) -> bool {
        true
    }
}

/// The set of currently defined discounts for one currency.
#[derive(Debug)]
pub struct Catalog<'a> {
    currency: &'static Currency,
    discounts: SlotMap<DiscountKey, Discount<'a>>,
    // Present only for discounts with a usage limit; absent means unlimited.
    usage: SecondaryMap<DiscountKey, AtomicU32>,
}

impl<'a> Catalog<'a> {
    /// Create an empty catalog for the given currency.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            currency,
            discounts: SlotMap::with_key(),
            usage: SecondaryMap::new(),
        }
    }

    /// Returns the currency every stored discount is denominated in.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Store a discount, validating it first.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountConfigError`] if the discount is internally
    /// inconsistent or denominated in a currency other than the catalog's.
    /// A rejected discount is never stored, so configuration problems
    /// surface at load time and not during a calculation.
    pub fn insert(&mut self, discount: Discount<'a>) -> Result<DiscountKey, DiscountConfigError> {
        discount.validate(self.currency)?;

        let limit = discount.usage_limit();
        let key = self.discounts.insert(discount);

        if let Some(limit) = limit {
            self.usage.insert(key, AtomicU32::new(limit));
        }

        Ok(key)
    }

    /// Look up a discount by key.
    pub fn get(&self, key: DiscountKey) -> Option<&Discount<'a>> {
        self.discounts.get(key)
    }

    /// Remove a discount and its usage counter.
    pub fn remove(&mut self, key: DiscountKey) -> Option<Discount<'a>> {
        self.usage.remove(key);
        self.discounts.remove(key)
    }

    /// Iterate over all stored discounts.
    pub fn iter(&self) -> impl Iterator<Item = (DiscountKey, &Discount<'a>)> {
        self.discounts.iter()
    }

    /// Number of stored discounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.discounts.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.discounts.is_empty()
    }

    /// Remaining redemptions for a discount; `None` means unlimited.
    #[must_use]
    pub fn remaining_uses(&self, key: DiscountKey) -> Option<u32> {
        self.usage.get(key).map(|uses| uses.load(Ordering::Acquire))
    }

    /// Look up a stored voucher discount by its exact code.
    pub fn voucher_by_code(&self, code: &str) -> Option<(DiscountKey, &Discount<'a>)> {
        self.iter().find(|(_, discount)| {
            matches!(discount.offer(), Offer::Voucher { code: stored } if stored == code)
        })
    }

    /// Every stored discount whose kind-specific scope could plausibly match
    /// the order.
    ///
    /// This is a coarse pre-filter: it checks that a brand or category
    /// appears among the line items, that a voucher code equals the supplied
    /// code (case-sensitive), and that a bank offer matches the card's bank.
    /// Time windows, usage limits, tiers and minimums are the validator's
    /// job. Read-only; no matches yields an empty vector, not a failure.
    pub fn candidates(&self, ctx: &OrderContext<'_>) -> Vec<(DiscountKey, &Discount<'a>)> {
        self.iter()
            .filter(|(_, discount)| scope_could_match(discount.offer(), ctx))
            .collect()
    }
}

impl UsageLedger for Catalog<'_> {
    fn try_consume(&self, key: DiscountKey) -> bool {
        let Some(uses) = self.usage.get(key) else {
            // No counter: the discount is unlimited (or unknown, in which
            // case the caller's candidate lookup has already failed).
            return true;
        };

        uses.fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
            remaining.checked_sub(1)
        })
        .is_ok()
    }
}

fn scope_could_match(offer: &Offer, ctx: &OrderContext<'_>) -> bool {
    match offer {
        Offer::Brand { brand } => ctx.iter().any(|item| item.brand() == brand),
        Offer::Category { category } => ctx.iter().any(|item| item.category() == category),
        Offer::Voucher { code } => ctx.voucher_code() == Some(code.as_str()),
        Offer::Bank { bank } => matches!(
            ctx.payment(),
            Some(PaymentInstrument::Card { bank: card_bank }) if card_bank == bank
        ),
    }
}

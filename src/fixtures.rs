//! Fixtures
//!
//! A small seeded catalog and a couple of ready-made orders, shared by the
//! integration tests and usable as demo data. Prices are INR minor units
//! (paise).

use rusty_money::{Money, iso::INR};

use crate::{
    cart::{CartError, LineItem, OrderContext, PaymentInstrument},
    catalog::Catalog,
    discounts::{Discount, DiscountConfigError, Magnitude, Offer},
};

/// Build the sample catalog: two brand discounts, a capped category discount,
/// a premium-only voucher and a card-gated bank offer.
///
/// # Errors
///
/// Returns a [`DiscountConfigError`] if any seeded discount fails validation;
/// this indicates a bug in the fixture itself.
pub fn sample_catalog() -> Result<Catalog<'static>, DiscountConfigError> {
    let mut catalog = Catalog::new(INR);

    catalog.insert(
        Discount::new(
            "PUMA Brand Discount",
            Offer::Brand {
                brand: "PUMA".to_string(),
            },
            Magnitude::percent(40),
        )
        .with_minimum_order(Money::from_minor(50_000, INR)),
    )?;

    catalog.insert(Discount::new(
        "Nike Brand Discount",
        Offer::Brand {
            brand: "Nike".to_string(),
        },
        Magnitude::percent(30),
    ))?;

    catalog.insert(
        Discount::new(
            "T-shirts Category Discount",
            Offer::Category {
                category: "T-shirts".to_string(),
            },
            Magnitude::percent(10),
        )
        .with_cap(Money::from_minor(20_000, INR)),
    )?;

    catalog.insert(
        Discount::new(
            "SUPER69 Voucher",
            Offer::Voucher {
                code: "SUPER69".to_string(),
            },
            Magnitude::percent(69),
        )
        .with_minimum_order(Money::from_minor(200_000, INR))
        .with_cap(Money::from_minor(100_000, INR))
        .with_tiers(["premium"])
        .with_usage_limit(100),
    )?;

    catalog.insert(
        Discount::new(
            "ICICI Bank Offer",
            Offer::Bank {
                bank: "ICICI".to_string(),
            },
            Magnitude::percent(10),
        )
        .with_minimum_order(Money::from_minor(100_000, INR))
        .with_cap(Money::from_minor(50_000, INR)),
    )?;

    Ok(catalog)
}

/// Two PUMA T-shirts at ₹1000 each, paid with an ICICI card.
///
/// # Errors
///
/// Returns a [`CartError`] if the fixture lines fail validation.
pub fn puma_tee_order() -> Result<OrderContext<'static>, CartError> {
    Ok(OrderContext::with_items(
        [LineItem::new(
            "prod-001",
            "PUMA",
            "T-shirts",
            Money::from_minor(100_000, INR),
            2,
        )],
        "regular",
        INR,
    )?
    .with_payment(PaymentInstrument::Card {
        bank: "ICICI".to_string(),
    }))
}

/// A mixed-brand order: PUMA tee, Nike shoes and Zara jeans.
///
/// # Errors
///
/// Returns a [`CartError`] if the fixture lines fail validation.
pub fn mixed_order() -> Result<OrderContext<'static>, CartError> {
    OrderContext::with_items(
        [
            LineItem::new(
                "prod-001",
                "PUMA",
                "T-shirts",
                Money::from_minor(100_000, INR),
                1,
            ),
            LineItem::new(
                "prod-002",
                "Nike",
                "Shoes",
                Money::from_minor(250_000, INR),
                1,
            ),
            LineItem::new(
                "prod-004",
                "Zara",
                "Jeans",
                Money::from_minor(150_000, INR),
                1,
            ),
        ],
        "regular",
        INR,
    )
}

//! Strata
//!
//! Strata is a tiered discount stacking and calculation engine: brand,
//! category, voucher and bank discounts are applied to an order in a fixed
//! priority order, each compounding sequentially on the running price left by
//! the previous step.

pub mod calculation;
pub mod cart;
pub mod catalog;
pub mod discounts;
pub mod eligibility;
pub mod engine;
pub mod fixtures;
pub mod stacking;

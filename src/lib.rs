//! Tally
//!
//! Tally is a cart pricing and state engine for plan-based storefronts: line items, discounts,
//! coupons, persistence and checkout sessions.

pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod currency;
pub mod discounts;
pub mod items;
pub mod logging;
pub mod prelude;
pub mod pricing;
pub mod receipt;
pub mod service;
pub mod storage;

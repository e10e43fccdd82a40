//! Coupons
//!
//! Cart-level discounts looked up by code.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discounts::{DiscountError, percent_from_points, percent_of_minor};

/// Reasons a coupon cannot be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    /// No coupon with this code exists.
    #[error("Unknown coupon code: {0}")]
    Unknown(String),

    /// The coupon has been switched off.
    #[error("Coupon {0} is inactive")]
    Inactive(String),

    /// The current time is outside the validity window.
    #[error("Coupon {0} is not valid at this time")]
    Expired(String),

    /// Every permitted use has been taken.
    #[error("Coupon {0} has reached its usage limit")]
    UsageExhausted(String),

    /// The cart subtotal is below the coupon minimum.
    #[error("Coupon {code} needs a subtotal of at least {minimum}, cart has {subtotal}")]
    MinimumNotMet {
        /// Coupon code
        code: String,
        /// Required subtotal in minor units
        minimum: i64,
        /// Current subtotal in minor units
        subtotal: i64,
    },

    /// The coupon value cannot be used to compute a discount.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// How a coupon reduces the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponKind {
    /// Percent points of the eligible subtotal.
    Percentage(Decimal),

    /// Minor units off the cart.
    Fixed(i64),
}

/// A cart-level discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Code customers type in; matched case-insensitively
    pub code: String,

    /// Discount applied by the coupon
    #[serde(flatten)]
    pub kind: CouponKind,

    /// Minimum cart subtotal in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<i64>,

    /// Cap on a percentage discount, in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<i64>,

    /// Start of the validity window
    pub valid_from: Timestamp,

    /// End of the validity window
    pub valid_to: Timestamp,

    /// Total number of permitted uses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,

    /// Uses so far
    #[serde(default)]
    pub used_count: u32,

    /// Switched on
    #[serde(default = "active_by_default")]
    pub is_active: bool,

    /// Plans the coupon is restricted to; empty means every plan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applicable_plans: Vec<String>,

    /// Human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn active_by_default() -> bool {
    true
}

impl Coupon {
    /// Whether the coupon covers lines for `plan_id`.
    pub fn applies_to(&self, plan_id: &str) -> bool {
        self.applicable_plans.is_empty() || self.applicable_plans.iter().any(|p| p == plan_id)
    }

    /// Checks the coupon can be used on a cart with `subtotal` at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] naming the first failed check.
    pub fn check(&self, subtotal: i64, now: Timestamp) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive(self.code.clone()));
        }

        if now < self.valid_from || now > self.valid_to {
            return Err(CouponError::Expired(self.code.clone()));
        }

        if self
            .usage_limit
            .is_some_and(|limit| self.used_count >= limit)
        {
            return Err(CouponError::UsageExhausted(self.code.clone()));
        }

        match self.min_amount {
            Some(minimum) if subtotal < minimum => Err(CouponError::MinimumNotMet {
                code: self.code.clone(),
                minimum,
                subtotal,
            }),
            _ => Ok(()),
        }
    }

    /// Discount in minor units given the subtotal of the lines the coupon covers.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountError`] if the percentage cannot be computed.
    pub fn discount_on(&self, eligible_subtotal: i64) -> Result<i64, DiscountError> {
        match &self.kind {
            CouponKind::Percentage(points) => {
                let amount = percent_of_minor(&percent_from_points(*points)?, eligible_subtotal)?;

                Ok(self.max_discount.map_or(amount, |cap| amount.min(cap)))
            }
            CouponKind::Fixed(value) => Ok(*value),
        }
    }
}

/// Coupons available to customers, keyed by upper-cased code.
#[derive(Debug, Clone, Default)]
pub struct CouponBook {
    coupons: FxHashMap<String, Coupon>,
}

impl CouponBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a coupon.
    pub fn insert(&mut self, coupon: Coupon) {
        self.coupons.insert(coupon.code.to_uppercase(), coupon);
    }

    /// Look up a coupon by code, ignoring case.
    pub fn get(&self, code: &str) -> Option<&Coupon> {
        self.coupons.get(&code.trim().to_uppercase())
    }

    /// Look up a coupon and check it against the cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if the coupon is unknown or unusable.
    pub fn redeem(&self, code: &str, subtotal: i64, now: Timestamp) -> Result<&Coupon, CouponError> {
        let coupon = self
            .get(code)
            .ok_or_else(|| CouponError::Unknown(code.to_string()))?;

        coupon.check(subtotal, now)?;

        Ok(coupon)
    }

    /// Count one completed use of a coupon, returning its new use count.
    pub fn record_use(&mut self, code: &str) -> Option<u32> {
        let coupon = self.coupons.get_mut(&code.trim().to_uppercase())?;

        coupon.used_count = coupon.used_count.saturating_add(1);

        Some(coupon.used_count)
    }

    /// Use counts keyed by upper-cased code.
    pub fn usage(&self) -> FxHashMap<String, u32> {
        self.coupons
            .iter()
            .map(|(code, coupon)| (code.clone(), coupon.used_count))
            .collect()
    }

    /// Merge previously recorded use counts. Counts never go down, and codes
    /// not in the book are ignored.
    pub fn apply_usage(&mut self, usage: &FxHashMap<String, u32>) {
        for (code, used) in usage {
            if let Some(coupon) = self.coupons.get_mut(&code.trim().to_uppercase()) {
                coupon.used_count = coupon.used_count.max(*used);
            }
        }
    }

    /// Number of coupons.
    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    /// Whether the book has no coupons.
    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}

impl FromIterator<Coupon> for CouponBook {
    fn from_iter<I: IntoIterator<Item = Coupon>>(iter: I) -> Self {
        let mut book = CouponBook::new();

        for coupon in iter {
            book.insert(coupon);
        }

        book
    }
}

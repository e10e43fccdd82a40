//! Pricing
//!
//! Derives cart totals from line items and an optional coupon. Everything here is
//! a pure fold over its inputs, so the same cart always prices the same way.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    coupons::Coupon,
    currency::Currency,
    discounts::{DiscountError, percent_from_points, percent_of_minor},
    items::CartItem,
};

/// Errors that can occur while pricing a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// A sum or product left the `i64` range.
    #[error("cart totals overflowed")]
    Overflow,

    /// Wrapped discount calculation error.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// Derived totals for a cart. All amounts are minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    /// Total number of units across all lines
    pub item_count: u32,

    /// Sum of unit price times quantity
    pub subtotal: i64,

    /// Item discounts plus coupon discount
    pub discount: i64,

    /// Tax on the discounted subtotal
    pub tax: i64,

    /// Amount due, never negative
    pub total: i64,

    /// Currency of every amount
    pub currency: Currency,

    /// Amount saved; equal to `discount`
    pub savings: i64,
}

impl CartSummary {
    /// Summary of a cart with no lines.
    pub fn empty(currency: Currency) -> Self {
        Self {
            item_count: 0,
            subtotal: 0,
            discount: 0,
            tax: 0,
            total: 0,
            currency,
            savings: 0,
        }
    }
}

impl Default for CartSummary {
    fn default() -> Self {
        Self::empty(Currency::default())
    }
}

/// Prices a list of lines.
///
/// `tax_rate` is in percent points and applies to the subtotal after discounts.
/// The summary currency is the first line's currency, or the default currency
/// when `items` is empty.
///
/// # Errors
///
/// Returns a [`PricingError`] if any amount overflows or a discount cannot be
/// computed.
pub fn calculate_cart_totals(
    items: &[CartItem],
    coupon: Option<&Coupon>,
    tax_rate: Decimal,
) -> Result<CartSummary, PricingError> {
    let Some(first) = items.first() else {
        return Ok(CartSummary::default());
    };

    let subtotal = items.iter().try_fold(0_i64, |acc, item| {
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or(PricingError::Overflow)
    })?;

    let item_count = items.iter().try_fold(0_u32, |acc, item| {
        acc.checked_add(item.quantity).ok_or(PricingError::Overflow)
    })?;

    let item_discounts = items.iter().try_fold(0_i64, |acc, item| {
        acc.checked_add(item.line_discount()?)
            .ok_or(PricingError::Overflow)
    })?;

    let coupon_discount = coupon.map_or(Ok(0), |coupon| coupon_discount(items, coupon))?;

    let discount = item_discounts
        .checked_add(coupon_discount)
        .ok_or(PricingError::Overflow)?;

    let taxable = subtotal
        .checked_sub(discount)
        .ok_or(PricingError::Overflow)?
        .max(0);

    let tax = if tax_rate.is_zero() {
        0
    } else {
        percent_of_minor(&percent_from_points(tax_rate)?, taxable)?
    };

    let total = taxable.checked_add(tax).ok_or(PricingError::Overflow)?;

    Ok(CartSummary {
        item_count,
        subtotal,
        discount,
        tax,
        total,
        currency: first.currency,
        savings: discount,
    })
}

/// Coupon discount for the lines the coupon covers.
fn coupon_discount(items: &[CartItem], coupon: &Coupon) -> Result<i64, PricingError> {
    let mut eligible = items
        .iter()
        .filter(|item| coupon.applies_to(&item.plan_id))
        .peekable();

    if eligible.peek().is_none() {
        return Ok(0);
    }

    let eligible_subtotal = eligible.try_fold(0_i64, |acc, item| {
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or(PricingError::Overflow)
    })?;

    Ok(coupon.discount_on(eligible_subtotal)?)
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, ToSpan};
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use crate::{coupons::CouponKind, discounts::ItemDiscount};

    use super::*;

    fn essential() -> CartItem {
        CartItem::new("plan-1", "essential", "Essential Plan", 3_000, Currency::Brl)
    }

    fn start() -> CartItem {
        CartItem::new("plan-2", "start", "Start Plan", 1_500, Currency::Brl)
            .with_quantity(2)
            .with_discount(ItemDiscount::percentage(dec!(10)))
    }

    fn coupon(kind: CouponKind) -> TestResult<Coupon> {
        let now = Timestamp::now();

        Ok(Coupon {
            code: "TEST".to_string(),
            kind,
            min_amount: None,
            max_discount: None,
            valid_from: now.checked_sub(1.hour())?,
            valid_to: now.checked_add(1.hour())?,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            applicable_plans: Vec::new(),
            description: None,
        })
    }

    #[test]
    fn empty_list_prices_to_zero() -> TestResult {
        let summary = calculate_cart_totals(&[], None, Decimal::ZERO)?;

        assert_eq!(summary, CartSummary::empty(Currency::Brl));

        Ok(())
    }

    #[test]
    fn item_discounts_are_summed() -> TestResult {
        let summary = calculate_cart_totals(&[essential(), start()], None, Decimal::ZERO)?;

        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal, 6_000);
        assert_eq!(summary.discount, 300);
        assert_eq!(summary.total, 5_700);
        assert_eq!(summary.savings, 300);
        assert_eq!(summary.currency, Currency::Brl);

        Ok(())
    }

    #[test]
    fn fixed_item_discount_scales_with_quantity() -> TestResult {
        let item = essential()
            .with_quantity(2)
            .with_discount(ItemDiscount::fixed(500));

        let summary = calculate_cart_totals(&[item], None, Decimal::ZERO)?;

        assert_eq!(summary.discount, 1_000);
        assert_eq!(summary.total, 5_000);

        Ok(())
    }

    #[test]
    fn total_never_goes_negative() -> TestResult {
        let item = essential().with_discount(ItemDiscount::fixed(10_000));

        let coupon = coupon(CouponKind::Fixed(5_000))?;
        let summary = calculate_cart_totals(&[item], Some(&coupon), dec!(10))?;

        assert_eq!(summary.discount, 15_000);
        assert_eq!(summary.tax, 0);
        assert_eq!(summary.total, 0);

        Ok(())
    }

    #[test]
    fn percentage_coupon_applies_to_subtotal() -> TestResult {
        let summary = calculate_cart_totals(
            &[essential(), start()],
            Some(&coupon(CouponKind::Percentage(dec!(10)))?),
            Decimal::ZERO,
        )?;

        // 10% of 6000 from the coupon, 300 from the start plan line
        assert_eq!(summary.discount, 900);
        assert_eq!(summary.total, 5_100);

        Ok(())
    }

    #[test]
    fn restricted_coupon_only_counts_matching_lines() -> TestResult {
        let mut restricted = coupon(CouponKind::Percentage(dec!(50)))?;
        restricted.applicable_plans = vec!["essential".to_string()];

        let summary =
            calculate_cart_totals(&[essential(), start()], Some(&restricted), Decimal::ZERO)?;

        assert_eq!(summary.discount, 1_500 + 300);

        let summary = calculate_cart_totals(&[start()], Some(&restricted), Decimal::ZERO)?;

        assert_eq!(summary.discount, 300);

        Ok(())
    }

    #[test]
    fn tax_applies_after_discounts() -> TestResult {
        let summary = calculate_cart_totals(&[essential(), start()], None, dec!(5))?;

        // 5% of 5700
        assert_eq!(summary.tax, 285);
        assert_eq!(summary.total, 5_985);

        Ok(())
    }

    #[test]
    fn currency_comes_from_first_item() -> TestResult {
        let usd = CartItem::new("usd", "usd", "USD Plan", 100, Currency::Usd);

        let summary = calculate_cart_totals(&[usd, essential()], None, Decimal::ZERO)?;

        assert_eq!(summary.currency, Currency::Usd);

        Ok(())
    }

    #[test]
    fn overflow_is_reported() {
        let item = CartItem::new("big", "big", "Big", i64::MAX, Currency::Brl).with_quantity(2);

        assert_eq!(
            calculate_cart_totals(&[item], None, Decimal::ZERO),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn repeated_pricing_is_stable() -> TestResult {
        let items = [essential(), start()];
        let coupon = coupon(CouponKind::Fixed(100))?;

        let first = calculate_cart_totals(&items, Some(&coupon), dec!(3))?;
        let second = calculate_cart_totals(&items, Some(&coupon), dec!(3))?;

        assert_eq!(first, second);

        Ok(())
    }
}

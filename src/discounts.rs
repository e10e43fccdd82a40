//! Discounts
//!
//! Percentage and fixed-amount discounts, shared by line items and coupons.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Fixed discount arithmetic overflowed.
    #[error("discount amount overflowed")]
    Overflow,

    /// Percentage value outside `0..=100`.
    #[error("percentage must be between 0 and 100, got {0}")]
    PercentOutOfRange(Decimal),

    /// Fixed discount below zero.
    #[error("fixed discount must not be negative, got {0}")]
    NegativeAmount(i64),
}

/// A discount attached to a single cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemDiscount {
    /// Percent points off the line total (`10` is 10%).
    Percentage {
        /// Percent points
        value: Decimal,

        /// Promotional code the discount came from
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Minor units off each unit on the line.
    Fixed {
        /// Minor units per unit
        value: i64,

        /// Promotional code the discount came from
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ItemDiscount {
    /// Percentage discount without a code.
    pub fn percentage(value: Decimal) -> Self {
        ItemDiscount::Percentage { value, code: None }
    }

    /// Fixed discount without a code.
    pub fn fixed(value: i64) -> Self {
        ItemDiscount::Fixed { value, code: None }
    }

    /// Checks the discount value is usable.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountError`] when a percentage is outside `0..=100` or a
    /// fixed amount is negative.
    pub fn validate(&self) -> Result<(), DiscountError> {
        match self {
            ItemDiscount::Percentage { value, .. } => validate_percent_points(*value),
            ItemDiscount::Fixed { value, .. } if *value < 0 => {
                Err(DiscountError::NegativeAmount(*value))
            }
            ItemDiscount::Fixed { .. } => Ok(()),
        }
    }

    /// Discount on a line of `quantity` units priced at `unit_price` minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountError`] if the calculation overflows.
    pub fn amount_for_line(&self, unit_price: i64, quantity: u32) -> Result<i64, DiscountError> {
        let line_total = unit_price
            .checked_mul(i64::from(quantity))
            .ok_or(DiscountError::Overflow)?;

        match self {
            ItemDiscount::Percentage { value, .. } => {
                percent_of_minor(&percent_from_points(*value)?, line_total)
            }
            ItemDiscount::Fixed { value, .. } => value
                .checked_mul(i64::from(quantity))
                .ok_or(DiscountError::Overflow),
        }
    }
}

/// Validates a percent points value.
///
/// # Errors
///
/// Returns [`DiscountError::PercentOutOfRange`] outside `0..=100`.
pub fn validate_percent_points(points: Decimal) -> Result<(), DiscountError> {
    if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
        Err(DiscountError::PercentOutOfRange(points))
    } else {
        Ok(())
    }
}

/// Converts percent points (`10` for 10%) into a fractional [`Percentage`].
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the division overflows.
pub fn percent_from_points(points: Decimal) -> Result<Percentage, DiscountError> {
    points
        .checked_div(Decimal::ONE_HUNDRED)
        .map(Percentage::from)
        .ok_or(DiscountError::PercentConversion)
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the result cannot be represented.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn percentage_applies_to_whole_line() -> TestResult {
        let discount = ItemDiscount::percentage(dec!(10));

        assert_eq!(discount.amount_for_line(1_500, 2)?, 300);

        Ok(())
    }

    #[test]
    fn fixed_is_multiplied_by_quantity() -> TestResult {
        let discount = ItemDiscount::fixed(500);

        assert_eq!(discount.amount_for_line(3_000, 3)?, 1_500);

        Ok(())
    }

    #[test]
    fn percentage_rounds_half_away_from_zero() -> TestResult {
        let discount = ItemDiscount::percentage(dec!(12.5));

        // 12.5% of 1 * 3 = 0.375 -> 0, 12.5% of 4 = 0.5 -> 1
        assert_eq!(discount.amount_for_line(1, 3)?, 0);
        assert_eq!(discount.amount_for_line(4, 1)?, 1);

        Ok(())
    }

    #[test]
    fn line_overflow_returns_error() {
        let discount = ItemDiscount::fixed(1);

        assert_eq!(
            discount.amount_for_line(i64::MAX, 2),
            Err(DiscountError::Overflow)
        );
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() -> TestResult {
        let percent = percent_from_points(dec!(200))?;

        assert_eq!(
            percent_of_minor(&percent, i64::MAX),
            Err(DiscountError::PercentConversion)
        );

        Ok(())
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert_eq!(
            ItemDiscount::percentage(dec!(101)).validate(),
            Err(DiscountError::PercentOutOfRange(dec!(101)))
        );
        assert_eq!(
            ItemDiscount::fixed(-1).validate(),
            Err(DiscountError::NegativeAmount(-1))
        );
        assert_eq!(ItemDiscount::percentage(dec!(100)).validate(), Ok(()));
    }

    #[test]
    fn serializes_with_type_tag() -> TestResult {
        let json = serde_json::to_value(ItemDiscount::fixed(250))?;

        assert_eq!(json["type"], "fixed");
        assert_eq!(json["value"], 250);

        let parsed: ItemDiscount =
            serde_json::from_str(r#"{"type":"percentage","value":10,"code":"PROMO"}"#)?;

        assert_eq!(
            parsed,
            ItemDiscount::Percentage {
                value: dec!(10),
                code: Some("PROMO".to_string()),
            }
        );

        Ok(())
    }
}

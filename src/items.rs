//! Items

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    currency::Currency,
    discounts::{DiscountError, ItemDiscount},
};

/// Reasons an item is rejected before it reaches a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    /// The line identifier is blank.
    #[error("item id is required")]
    MissingId,

    /// The display name is blank.
    #[error("item name is required")]
    MissingName,

    /// The unit price is below zero.
    #[error("item price must not be negative, got {0}")]
    NegativePrice(i64),

    /// The quantity is outside `1..=max`.
    #[error("quantity must be between 1 and {max}, got {quantity}")]
    InvalidQuantity {
        /// Requested quantity
        quantity: u32,
        /// Per-line maximum
        max: u32,
    },

    /// The attached discount is not usable.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// A single line in a cart: one plan, bought `quantity` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line identifier
    pub id: String,

    /// Plan identifier; lines for the same plan are merged
    pub plan_id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Unit price in minor units
    pub price: i64,

    /// Currency the price is expressed in
    pub currency: Currency,

    /// Number of units
    pub quantity: u32,

    /// Plan length in months
    #[serde(default)]
    pub duration_months: u32,

    /// Feature bullet points
    #[serde(default)]
    pub features: Vec<String>,

    /// Highlighted in listings
    #[serde(default)]
    pub is_popular: bool,

    /// Line-level discount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<ItemDiscount>,

    /// Free-form annotations
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub metadata: FxHashMap<String, String>,
}

impl CartItem {
    /// Creates a single-unit item for a plan with no discount.
    pub fn new(
        id: impl Into<String>,
        plan_id: impl Into<String>,
        name: impl Into<String>,
        price: i64,
        currency: Currency,
    ) -> Self {
        Self {
            id: id.into(),
            plan_id: plan_id.into(),
            name: name.into(),
            description: String::new(),
            price,
            currency,
            quantity: 1,
            duration_months: 0,
            features: Vec::new(),
            is_popular: false,
            discount: None,
            metadata: FxHashMap::default(),
        }
    }

    /// Sets the quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Attaches a line discount.
    #[must_use]
    pub fn with_discount(mut self, discount: ItemDiscount) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Checks the item can be added to a cart allowing `max_quantity` per line.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemError`] describing the first problem found.
    pub fn validate(&self, max_quantity: u32) -> Result<(), ItemError> {
        if self.id.trim().is_empty() {
            return Err(ItemError::MissingId);
        }

        if self.name.trim().is_empty() {
            return Err(ItemError::MissingName);
        }

        if self.price < 0 {
            return Err(ItemError::NegativePrice(self.price));
        }

        if self.quantity == 0 || self.quantity > max_quantity {
            return Err(ItemError::InvalidQuantity {
                quantity: self.quantity,
                max: max_quantity,
            });
        }

        if let Some(discount) = &self.discount {
            discount.validate()?;
        }

        Ok(())
    }

    /// Price of the whole line before discounts, `None` on overflow.
    pub fn line_total(&self) -> Option<i64> {
        self.price.checked_mul(i64::from(self.quantity))
    }

    /// Discount on the whole line.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountError`] if the calculation overflows.
    pub fn line_discount(&self) -> Result<i64, DiscountError> {
        self.discount
            .as_ref()
            .map_or(Ok(0), |discount| {
                discount.amount_for_line(self.price, self.quantity)
            })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;

    fn essential() -> CartItem {
        CartItem::new("plan-1", "essential", "Essential Plan", 3_000, Currency::Brl)
    }

    #[test]
    fn valid_item_passes() {
        assert_eq!(essential().validate(10), Ok(()));
    }

    #[test]
    fn zero_price_is_allowed() {
        let item = CartItem::new("free", "free", "Free Plan", 0, Currency::Brl);

        assert_eq!(item.validate(10), Ok(()));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut item = essential();
        item.name = "  ".to_string();

        assert_eq!(item.validate(10), Err(ItemError::MissingName));
    }

    #[test]
    fn blank_id_is_rejected() {
        let mut item = essential();
        item.id = String::new();

        assert_eq!(item.validate(10), Err(ItemError::MissingId));
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut item = essential();
        item.price = -100;

        assert_eq!(item.validate(10), Err(ItemError::NegativePrice(-100)));
    }

    #[test]
    fn quantity_bounds_are_enforced() {
        assert_eq!(
            essential().with_quantity(0).validate(10),
            Err(ItemError::InvalidQuantity {
                quantity: 0,
                max: 10
            })
        );
        assert_eq!(
            essential().with_quantity(11).validate(10),
            Err(ItemError::InvalidQuantity {
                quantity: 11,
                max: 10
            })
        );
        assert_eq!(essential().with_quantity(10).validate(10), Ok(()));
    }

    #[test]
    fn invalid_discount_is_rejected() {
        let item = essential().with_discount(ItemDiscount::percentage(dec!(150)));

        assert_eq!(
            item.validate(10),
            Err(ItemError::Discount(DiscountError::PercentOutOfRange(dec!(
                150
            ))))
        );
    }

    #[test]
    fn line_totals_account_for_quantity() -> TestResult {
        let item = essential()
            .with_quantity(2)
            .with_discount(ItemDiscount::percentage(dec!(10)));

        assert_eq!(item.line_total(), Some(6_000));
        assert_eq!(item.line_discount()?, 600);

        Ok(())
    }

    #[test]
    fn deserializes_camel_case_fields() -> TestResult {
        let item: CartItem = serde_json::from_str(
            r#"{
                "id": "plan-2",
                "planId": "start",
                "name": "Start Plan",
                "price": 1500,
                "currency": "BRL",
                "quantity": 2,
                "durationMonths": 3,
                "isPopular": true
            }"#,
        )?;

        assert_eq!(item.plan_id, "start");
        assert_eq!(item.duration_months, 3);
        assert!(item.is_popular);
        assert!(item.features.is_empty());
        assert!(item.discount.is_none());

        Ok(())
    }
}

//! Cart
//!
//! The cart owns its lines and keeps its cached totals in step with them. Every
//! mutation is priced before it is committed, so a failed operation leaves the
//! cart exactly as it was.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    coupons::{Coupon, CouponBook, CouponError},
    currency::Currency,
    items::{CartItem, ItemError},
    pricing::{CartSummary, PricingError, calculate_cart_totals},
};

/// Errors raised by cart operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// There is no cart to operate on.
    #[error("Cart not found; create a cart first")]
    NotFound,

    /// No line with this id exists.
    #[error("Item {0} not found in cart")]
    ItemNotFound(String),

    /// The item failed validation.
    #[error(transparent)]
    InvalidItem(#[from] ItemError),

    /// The resulting quantity is above the per-line maximum.
    #[error("Quantity {quantity} exceeds the maximum of {max} per item")]
    QuantityExceeded {
        /// Requested quantity
        quantity: i64,
        /// Per-line maximum
        max: u32,
    },

    /// The cart already holds as many lines as allowed.
    #[error("Cart already holds the maximum of {0} items")]
    TooManyItems(usize),

    /// An item or requested currency disagrees with the cart.
    #[error("Currency {requested} does not match cart currency {cart}")]
    CurrencyMismatch {
        /// Currency asked for
        requested: Currency,
        /// Currency of the cart's lines
        cart: Currency,
    },

    /// The coupon cannot be applied.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// The cart could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Size limits enforced on every cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CartLimits {
    /// Units allowed on a single line
    pub max_quantity: u32,

    /// Lines allowed in a cart
    pub max_items: usize,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_quantity: 10,
            max_items: 50,
        }
    }
}

/// A shopping cart with cached totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,

    items: Vec<CartItem>,

    subtotal: i64,
    discount: i64,
    tax: i64,
    total: i64,

    currency: Currency,

    #[serde(default)]
    tax_rate: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    coupon: Option<Coupon>,

    created_at: Timestamp,
    updated_at: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    metadata: FxHashMap<String, String>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(currency: Currency, now: Timestamp) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: None,
            items: Vec::new(),
            subtotal: 0,
            discount: 0,
            tax: 0,
            total: 0,
            currency,
            tax_rate: Decimal::ZERO,
            coupon: None,
            created_at: now,
            updated_at: now,
            expires_at: None,
            metadata: FxHashMap::default(),
        }
    }

    /// Sets the tax rate in percent points.
    #[must_use]
    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Sets the time after which the cart is discarded.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Associates the cart with a user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Cart identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Owning user, if known.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Look up a line by id.
    pub fn get_item(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Whether the cart has any lines.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cart currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Tax rate in percent points.
    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Applied coupon, if any.
    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Cached subtotal in minor units.
    pub fn subtotal(&self) -> i64 {
        self.subtotal
    }

    /// Cached discount in minor units.
    pub fn discount(&self) -> i64 {
        self.discount
    }

    /// Cached tax in minor units.
    pub fn tax(&self) -> i64 {
        self.tax
    }

    /// Cached total in minor units.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the last successful mutation.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Expiry time, if set.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// Whether the cart has passed its expiry time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Free-form annotations.
    pub fn metadata(&self) -> &FxHashMap<String, String> {
        &self.metadata
    }

    /// Price the cart from scratch.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the cart cannot be priced.
    pub fn summary(&self) -> Result<CartSummary, PricingError> {
        let mut summary =
            calculate_cart_totals(&self.items, self.coupon.as_ref(), self.tax_rate)?;

        if self.items.is_empty() {
            summary.currency = self.currency;
        }

        Ok(summary)
    }

    /// Add an item, merging it into an existing line for the same plan.
    ///
    /// Returns the line that now holds the item.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the item is invalid, the merged quantity or line
    /// count would exceed `limits`, or the item currency differs from the cart's.
    pub fn add_item(
        &mut self,
        item: CartItem,
        limits: &CartLimits,
        now: Timestamp,
    ) -> Result<&CartItem, CartError> {
        item.validate(limits.max_quantity)?;

        if self.has_items() && item.currency != self.currency {
            return Err(CartError::CurrencyMismatch {
                requested: item.currency,
                cart: self.currency,
            });
        }

        let mut items = self.items.clone();

        let index = if let Some(index) = items
            .iter()
            .position(|existing| existing.plan_id == item.plan_id)
        {
            let line = items
                .get_mut(index)
                .ok_or_else(|| CartError::ItemNotFound(item.id.clone()))?;

            let quantity = line.quantity.saturating_add(item.quantity);

            if quantity > limits.max_quantity {
                return Err(CartError::QuantityExceeded {
                    quantity: i64::from(quantity),
                    max: limits.max_quantity,
                });
            }

            line.quantity = quantity;

            index
        } else {
            if items.len() >= limits.max_items {
                return Err(CartError::TooManyItems(limits.max_items));
            }

            items.push(item);

            items.len() - 1
        };

        let currency = items.first().map_or(self.currency, |first| first.currency);

        self.commit(items, self.coupon.clone(), now)?;
        self.currency = currency;

        self.items
            .get(index)
            .ok_or_else(|| CartError::ItemNotFound(String::new()))
    }

    /// Remove a line by id, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no line has this id.
    pub fn remove_item(&mut self, id: &str, now: Timestamp) -> Result<CartItem, CartError> {
        let index = self.position(id)?;

        let mut items = self.items.clone();
        let removed = items.remove(index);

        self.commit(items, self.coupon.clone(), now)?;

        Ok(removed)
    }

    /// Set the quantity of a line. A quantity of zero or less removes the line.
    ///
    /// Returns the updated line, or `None` when the line was removed.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if no line has this id or the quantity is above the
    /// per-line maximum.
    pub fn update_quantity(
        &mut self,
        id: &str,
        quantity: i64,
        limits: &CartLimits,
        now: Timestamp,
    ) -> Result<Option<&CartItem>, CartError> {
        let index = self.position(id)?;

        if quantity <= 0 {
            self.remove_item(id, now)?;
            return Ok(None);
        }

        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|quantity| *quantity <= limits.max_quantity)
            .ok_or(CartError::QuantityExceeded {
                quantity,
                max: limits.max_quantity,
            })?;

        let mut items = self.items.clone();

        if let Some(line) = items.get_mut(index) {
            line.quantity = quantity;
        }

        self.commit(items, self.coupon.clone(), now)?;

        Ok(self.items.get(index))
    }

    /// Look up a coupon and apply it to the cart, replacing any previous coupon.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Coupon`] if the coupon is unknown or unusable.
    pub fn apply_coupon(
        &mut self,
        code: &str,
        book: &CouponBook,
        now: Timestamp,
    ) -> Result<&Coupon, CartError> {
        let coupon = book.redeem(code, self.subtotal, now)?.clone();

        self.commit(self.items.clone(), Some(coupon), now)?;

        self.coupon
            .as_ref()
            .ok_or_else(|| CartError::Coupon(CouponError::Unknown(code.to_string())))
    }

    /// Remove the applied coupon, returning it.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Pricing`] if the cart cannot be priced.
    pub fn remove_coupon(&mut self, now: Timestamp) -> Result<Option<Coupon>, CartError> {
        let previous = self.coupon.clone();

        self.commit(self.items.clone(), None, now)?;

        Ok(previous)
    }

    /// Change the cart currency. Amounts are not converted.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::CurrencyMismatch`] if any line is priced in another currency.
    pub fn set_currency(&mut self, currency: Currency, now: Timestamp) -> Result<(), CartError> {
        if let Some(line) = self.items.iter().find(|item| item.currency != currency) {
            return Err(CartError::CurrencyMismatch {
                requested: currency,
                cart: line.currency,
            });
        }

        self.currency = currency;
        self.updated_at = now;

        Ok(())
    }

    /// Drop every line and the coupon, keeping the cart identity.
    pub fn clear(&mut self, now: Timestamp) {
        let summary = CartSummary::empty(self.currency);

        self.items.clear();
        self.coupon = None;
        self.apply_summary(&summary);
        self.updated_at = now;
    }

    /// Recompute cached totals, as after loading a stored cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Pricing`] if the cart cannot be priced.
    pub fn refresh(&mut self) -> Result<(), CartError> {
        let summary = self.summary()?;

        self.apply_summary(&summary);

        Ok(())
    }

    /// Re-price a stored cart under the current tax rate and coupon book.
    ///
    /// The applied coupon is replaced by the book's copy of it. A coupon the
    /// book no longer holds, or holds as inactive, is dropped and returned.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Pricing`] if the cart cannot be priced.
    pub fn reconcile(
        &mut self,
        tax_rate: Decimal,
        book: &CouponBook,
    ) -> Result<Option<Coupon>, CartError> {
        self.tax_rate = tax_rate;

        let mut dropped = None;

        if let Some(stored) = self.coupon.take() {
            match book.get(&stored.code).filter(|coupon| coupon.is_active) {
                Some(current) => self.coupon = Some(current.clone()),
                None => dropped = Some(stored),
            }
        }

        self.refresh()?;

        Ok(dropped)
    }

    /// Check the cart respects `limits` and its currency rule.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as a [`CartError`].
    pub fn check_limits(&self, limits: &CartLimits) -> Result<(), CartError> {
        if self.items.len() > limits.max_items {
            return Err(CartError::TooManyItems(limits.max_items));
        }

        for item in &self.items {
            item.validate(limits.max_quantity)?;

            if item.currency != self.currency {
                return Err(CartError::CurrencyMismatch {
                    requested: item.currency,
                    cart: self.currency,
                });
            }
        }

        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, CartError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CartError::ItemNotFound(id.to_string()))
    }

    fn commit(
        &mut self,
        items: Vec<CartItem>,
        coupon: Option<Coupon>,
        now: Timestamp,
    ) -> Result<(), CartError> {
        let mut summary = calculate_cart_totals(&items, coupon.as_ref(), self.tax_rate)?;

        if items.is_empty() {
            summary.currency = self.currency;
        }

        self.items = items;
        self.coupon = coupon;
        self.apply_summary(&summary);
        self.updated_at = now;

        Ok(())
    }

    fn apply_summary(&mut self, summary: &CartSummary) {
        self.subtotal = summary.subtotal;
        self.discount = summary.discount;
        self.tax = summary.tax;
        self.total = summary.total;
    }
}

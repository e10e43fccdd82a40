//! Tally prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, CartLimits},
    checkout::{
        Address, CheckoutError, CheckoutSession, CheckoutStatus, CustomerInfo, DocumentType,
        PaymentMethod,
    },
    config::{CartConfig, ConfigError},
    coupons::{Coupon, CouponBook, CouponError, CouponKind},
    currency::{Currency, CurrencyError},
    discounts::{DiscountError, ItemDiscount},
    items::{CartItem, ItemError},
    pricing::{CartSummary, PricingError, calculate_cart_totals},
    receipt::{Receipt, ReceiptError},
    service::{CartService, Clock, SystemClock},
    storage::{CartStore, FileStore, MemoryStore, StorageError},
};

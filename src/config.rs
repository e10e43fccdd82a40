//! Configuration
//!
//! Cart settings are read from YAML. Every field has a default, so an empty
//! document is a valid configuration.

use std::{fs, path::Path};

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::CartLimits,
    coupons::{Coupon, CouponBook, CouponKind},
    currency::Currency,
    discounts::validate_percent_points,
    service::COUPON_USAGE_KEY,
    storage::is_valid_key,
};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A value was parsed but is not usable
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Cart engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CartConfig {
    /// Store key the cart blob lives under
    pub storage_key: String,

    /// Currency for new carts
    pub default_currency: Currency,

    /// Quantity and line limits
    pub limits: CartLimits,

    /// Minutes a checkout session stays payable
    pub checkout_ttl_minutes: u32,

    /// Hours after creation a cart is discarded; never when unset
    pub cart_ttl_hours: Option<u32>,

    /// Tax in percent points on the discounted subtotal
    pub tax_rate: Decimal,

    /// Coupons customers can redeem
    pub coupons: Vec<Coupon>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: "xperience_cart".to_string(),
            default_currency: Currency::Brl,
            limits: CartLimits::default(),
            checkout_ttl_minutes: 30,
            cart_ttl_hours: None,
            tax_rate: Decimal::ZERO,
            coupons: default_coupons(),
        }
    }
}

fn default_coupons() -> Vec<Coupon> {
    let valid_from = Timestamp::constant(1_704_067_200, 0);
    let valid_to = Timestamp::constant(1_924_991_999, 0);

    vec![
        Coupon {
            code: "WELCOME10".to_string(),
            kind: CouponKind::Percentage(Decimal::TEN),
            min_amount: None,
            max_discount: None,
            valid_from,
            valid_to,
            usage_limit: Some(1_000),
            used_count: 0,
            is_active: true,
            applicable_plans: Vec::new(),
            description: Some("10% off for new customers".to_string()),
        },
        Coupon {
            code: "SAVE50".to_string(),
            kind: CouponKind::Fixed(5_000),
            min_amount: None,
            max_discount: None,
            valid_from,
            valid_to,
            usage_limit: Some(500),
            used_count: 0,
            is_active: true,
            applicable_plans: Vec::new(),
            description: Some("50 off the cart".to_string()),
        },
    ]
}

impl CartConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or validated.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: CartConfig = if yaml.trim().is_empty() {
            CartConfig::default()
        } else {
            serde_norway::from_str(yaml)?
        };

        config.validate()?;

        Ok(config)
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_key(&self.storage_key) {
            return Err(ConfigError::Invalid(format!(
                "storage_key {:?} must be ASCII letters, digits, '-' or '_'",
                self.storage_key
            )));
        }

        if self.storage_key == COUPON_USAGE_KEY || self.storage_key.starts_with("checkout_") {
            return Err(ConfigError::Invalid(format!(
                "storage_key {:?} is reserved",
                self.storage_key
            )));
        }

        if self.limits.max_quantity == 0 || self.limits.max_items == 0 {
            return Err(ConfigError::Invalid(
                "limits must allow at least one item".to_string(),
            ));
        }

        validate_percent_points(self.tax_rate)
            .map_err(|err| ConfigError::Invalid(format!("tax_rate: {err}")))?;

        for coupon in &self.coupons {
            let valid = match coupon.kind {
                CouponKind::Percentage(points) => validate_percent_points(points).is_ok(),
                CouponKind::Fixed(value) => value >= 0,
            };

            if !valid || coupon.valid_from > coupon.valid_to {
                return Err(ConfigError::Invalid(format!("coupon {}", coupon.code)));
            }
        }

        Ok(())
    }

    /// Coupons indexed for lookup by code.
    pub fn coupon_book(&self) -> CouponBook {
        self.coupons.iter().cloned().collect()
    }

    /// How long a checkout session stays payable.
    pub fn checkout_ttl(&self) -> SignedDuration {
        SignedDuration::from_mins(i64::from(self.checkout_ttl_minutes))
    }

    /// How long a cart lives after creation, if it expires at all.
    pub fn cart_ttl(&self) -> Option<SignedDuration> {
        self.cart_ttl_hours
            .map(|hours| SignedDuration::from_hours(i64::from(hours)))
    }
}

//! Checkout
//!
//! A checkout session freezes a cart's total for a limited time while the
//! customer pays through an external provider.

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{cart::Cart, currency::Currency, storage::StorageError};

/// Errors raised while opening or settling a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// There is nothing to pay for.
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// Customer details are incomplete.
    #[error("invalid customer info: {0}")]
    InvalidCustomer(&'static str),

    /// No session with this id is stored.
    #[error("checkout session {0} not found")]
    NotFound(Uuid),

    /// The session passed its payment window.
    #[error("checkout session {0} has expired")]
    Expired(Uuid),

    /// The session is not in a state that allows the change.
    #[error("checkout session cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: CheckoutStatus,
        /// Requested status
        to: CheckoutStatus,
    },

    /// The expiry time is out of range.
    #[error("checkout expiry out of range: {0}")]
    Time(#[from] jiff::Error),

    /// The session could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The stored session could not be encoded or decoded.
    #[error("checkout session JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Brazilian instant payment
    Pix,
    /// On-chain bitcoin
    Bitcoin,
    /// Tether stablecoin
    Usdt,
    /// GitHub sponsorship
    Github,
}

/// Lifecycle of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    /// Awaiting payment
    Pending,
    /// Payment seen, not yet confirmed
    Processing,
    /// Paid
    Completed,
    /// Payment rejected
    Failed,
    /// Payment window closed
    Expired,
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutStatus::Pending => "pending",
            CheckoutStatus::Processing => "processing",
            CheckoutStatus::Completed => "completed",
            CheckoutStatus::Failed => "failed",
            CheckoutStatus::Expired => "expired",
        };

        f.write_str(name)
    }
}

/// Brazilian taxpayer document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Individual
    Cpf,
    /// Company
    Cnpj,
}

/// Who is paying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    /// Full name
    pub name: String,

    /// Contact email
    pub email: String,

    /// Contact phone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Taxpayer document number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    /// Kind of taxpayer document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
}

impl CustomerInfo {
    /// Customer with just a name and email.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
            document: None,
            document_type: None,
        }
    }

    /// Checks the details are complete enough to bill.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidCustomer`] naming the missing detail.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.name.trim().is_empty() {
            return Err(CheckoutError::InvalidCustomer("name is required"));
        }

        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));

        if !well_formed {
            return Err(CheckoutError::InvalidCustomer("email is malformed"));
        }

        if self.document.is_some() != self.document_type.is_some() {
            return Err(CheckoutError::InvalidCustomer(
                "document and document type go together",
            ));
        }

        Ok(())
    }
}

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Street name
    pub street: String,
    /// House or building number
    pub number: String,
    /// Apartment, suite or floor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    /// Neighbourhood
    pub neighborhood: String,
    /// City
    pub city: String,
    /// State or province
    pub state: String,
    /// Postal code
    pub zip_code: String,
    /// Country
    pub country: String,
}

/// A cart frozen for payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Session identifier
    pub id: Uuid,

    /// Cart being paid for
    pub cart_id: Uuid,

    /// Paying user, `anonymous` when not signed in
    pub user_id: String,

    /// Current lifecycle state
    pub status: CheckoutStatus,

    /// Chosen payment method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,

    /// Who is paying
    pub customer_info: CustomerInfo,

    /// Billing address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,

    /// Amount due in minor units
    pub total: i64,

    /// Currency of `total`
    pub currency: Currency,

    /// Coupon applied to the cart, counted against its usage limit on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,

    /// Creation time
    pub created_at: Timestamp,

    /// Time of the last status change
    pub updated_at: Timestamp,

    /// End of the payment window
    pub expires_at: Timestamp,
}

impl CheckoutSession {
    /// Open a pending session for `cart`, payable for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the cart is empty, the customer details are
    /// incomplete, or the expiry time is out of range.
    pub fn open(
        cart: &Cart,
        customer_info: CustomerInfo,
        billing_address: Option<Address>,
        payment_method: Option<PaymentMethod>,
        ttl: SignedDuration,
        now: Timestamp,
    ) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        customer_info.validate()?;

        Ok(Self {
            id: Uuid::now_v7(),
            cart_id: cart.id(),
            user_id: cart.user_id().unwrap_or("anonymous").to_string(),
            status: CheckoutStatus::Pending,
            payment_method,
            customer_info,
            billing_address,
            total: cart.total(),
            currency: cart.currency(),
            coupon_code: cart.coupon().map(|coupon| coupon.code.clone()),
            created_at: now,
            updated_at: now,
            expires_at: now.checked_add(ttl)?,
        })
    }

    /// Store key for a session id.
    pub fn storage_key_for(id: Uuid) -> String {
        format!("checkout_{}", id.simple())
    }

    /// Store key for this session.
    pub fn storage_key(&self) -> String {
        Self::storage_key_for(self.id)
    }

    /// Whether the payment window has closed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Mark the session paid.
    ///
    /// An open session past its window moves to `expired` and fails.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Expired`] or [`CheckoutError::InvalidTransition`].
    pub fn complete(&mut self, now: Timestamp) -> Result<(), CheckoutError> {
        self.transition(CheckoutStatus::Completed, now)
    }

    /// Mark the payment as seen but unconfirmed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Expired`] or [`CheckoutError::InvalidTransition`].
    pub fn begin_processing(&mut self, now: Timestamp) -> Result<(), CheckoutError> {
        self.transition(CheckoutStatus::Processing, now)
    }

    /// Mark the payment rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidTransition`] unless the session is open.
    pub fn fail(&mut self, now: Timestamp) -> Result<(), CheckoutError> {
        self.transition(CheckoutStatus::Failed, now)
    }

    fn transition(&mut self, to: CheckoutStatus, now: Timestamp) -> Result<(), CheckoutError> {
        let open = matches!(
            self.status,
            CheckoutStatus::Pending | CheckoutStatus::Processing
        );

        if !open || (self.status == CheckoutStatus::Processing && to == CheckoutStatus::Processing)
        {
            return Err(CheckoutError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        if to != CheckoutStatus::Failed && self.is_expired(now) {
            self.status = CheckoutStatus::Expired;
            self.updated_at = now;

            return Err(CheckoutError::Expired(self.id));
        }

        self.status = to;
        self.updated_at = now;

        Ok(())
    }
}

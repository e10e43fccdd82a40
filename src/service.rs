//! Cart service
//!
//! Owns the current cart, persists it after every successful mutation and
//! recovers it on start-up. Storage failures while saving are logged and never
//! fail the mutation that triggered them.

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use crate::{
    cart::{Cart, CartError},
    checkout::{Address, CheckoutError, CheckoutSession, CustomerInfo, PaymentMethod},
    config::CartConfig,
    coupons::{Coupon, CouponBook},
    currency::Currency,
    items::CartItem,
    pricing::{CartSummary, PricingError},
    storage::CartStore,
};

/// Store key of the coupon usage ledger.
pub const COUPON_USAGE_KEY: &str = "coupon_usage";

/// Source of the current time.
pub trait Clock {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Cart state backed by a [`CartStore`].
#[derive(Debug)]
pub struct CartService<S: CartStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    config: CartConfig,
    coupons: CouponBook,
    cart: Option<Cart>,
}

impl<S: CartStore> CartService<S> {
    /// Create a service on the wall clock and load any stored cart.
    pub fn new(store: S, config: CartConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: CartStore, C: Clock> CartService<S, C> {
    /// Create a service with an explicit clock and load any stored cart.
    ///
    /// Coupon use counts recorded by earlier completed checkouts are merged into
    /// the configured coupons first, so the stored cart is priced against them.
    pub fn with_clock(store: S, config: CartConfig, clock: C) -> Self {
        let coupons = config.coupon_book();

        let mut service = Self {
            store,
            clock,
            config,
            coupons,
            cart: None,
        };

        if let Some(usage) = service.load_usage() {
            service.coupons.apply_usage(&usage);
        }

        service.cart = service.load_cart();

        service
    }

    /// Coupons available to this service, with their recorded use counts.
    pub fn coupons(&self) -> &CouponBook {
        &self.coupons
    }

    /// Configuration in use.
    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the service, returning the backing store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// The current cart, if one exists.
    pub fn current_cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// Start a fresh cart, replacing any current one.
    pub fn create_cart(&mut self) -> &Cart {
        let cart = self.new_cart(self.clock.now());

        info!(cart_id = %cart.id(), "created cart");

        let cart = self.cart.insert(cart);
        persist(&mut self.store, &self.config.storage_key, cart);

        cart
    }

    /// Drop the current cart and its stored blob.
    pub fn clear_cart(&mut self) {
        if let Some(cart) = self.cart.take() {
            debug!(cart_id = %cart.id(), "cleared cart");
        }

        if let Err(err) = self.store.remove(&self.config.storage_key) {
            error!(error = %err, "failed to remove stored cart");
        }
    }

    /// Add an item, creating a cart first if there is none.
    ///
    /// Returns a copy of the line now holding the item. A rejected item never
    /// leaves a new empty cart behind.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart rejects the item.
    #[tracing::instrument(skip_all, fields(plan_id = %item.plan_id, quantity = item.quantity))]
    pub fn add_item(&mut self, item: CartItem) -> Result<CartItem, CartError> {
        if self.cart.is_some() {
            return self.mutate(|cart, config, now| {
                cart.add_item(item, &config.limits, now).cloned()
            });
        }

        let now = self.clock.now();
        let mut cart = self.new_cart(now);

        let line = cart.add_item(item, &self.config.limits, now)?.clone();

        info!(cart_id = %cart.id(), "created cart");

        let cart = self.cart.insert(cart);
        persist(&mut self.store, &self.config.storage_key, cart);

        Ok(line)
    }

    /// Remove a line by id.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] without a cart, or
    /// [`CartError::ItemNotFound`] if no line has this id.
    #[tracing::instrument(skip(self))]
    pub fn remove_item(&mut self, id: &str) -> Result<CartItem, CartError> {
        self.mutate(|cart, _, now| cart.remove_item(id, now))
    }

    /// Set a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if there is no cart, no such line, or the quantity
    /// is above the limit.
    #[tracing::instrument(skip(self))]
    pub fn update_quantity(
        &mut self,
        id: &str,
        quantity: i64,
    ) -> Result<Option<CartItem>, CartError> {
        self.mutate(|cart, config, now| {
            cart.update_quantity(id, quantity, &config.limits, now)
                .map(Option::<&CartItem>::cloned)
        })
    }

    /// Look up a line by id.
    pub fn get_item(&self, id: &str) -> Option<&CartItem> {
        self.cart.as_ref().and_then(|cart| cart.get_item(id))
    }

    /// Apply a coupon by code.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] without a cart, or a coupon error.
    #[tracing::instrument(skip(self))]
    pub fn apply_coupon(&mut self, code: &str) -> Result<Coupon, CartError> {
        let now = self.clock.now();
        let cart = self.cart.as_mut().ok_or(CartError::NotFound)?;

        let coupon = cart.apply_coupon(code, &self.coupons, now)?.clone();

        debug!(code = %coupon.code, discount = cart.discount(), "applied coupon");
        persist(&mut self.store, &self.config.storage_key, cart);

        Ok(coupon)
    }

    /// Remove the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] without a cart.
    pub fn remove_coupon(&mut self) -> Result<Option<Coupon>, CartError> {
        self.mutate(|cart, _, now| cart.remove_coupon(now))
    }

    /// Change the cart currency, creating a cart first if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::CurrencyMismatch`] if lines are priced in another currency.
    #[tracing::instrument(skip(self))]
    pub fn set_currency(&mut self, currency: Currency) -> Result<(), CartError> {
        if self.cart.is_none() {
            self.create_cart();
        }

        self.mutate(|cart, _, now| cart.set_currency(currency, now))
    }

    /// Totals for the current cart, or an empty summary without one.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the cart cannot be priced.
    pub fn summary(&self) -> Result<CartSummary, PricingError> {
        self.cart.as_ref().map_or_else(
            || Ok(CartSummary::empty(self.config.default_currency)),
            Cart::summary,
        )
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, Cart::item_count)
    }

    /// Whether a cart exists and has lines.
    pub fn has_items(&self) -> bool {
        self.cart.as_ref().is_some_and(Cart::has_items)
    }

    /// Freeze the current cart into a pending checkout session and store it.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the cart is missing or empty, the customer
    /// details are incomplete, or the session cannot be stored.
    #[tracing::instrument(skip_all)]
    pub fn create_checkout_session(
        &mut self,
        customer_info: CustomerInfo,
        billing_address: Option<Address>,
        payment_method: Option<PaymentMethod>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let cart = self.cart.as_ref().ok_or(CheckoutError::EmptyCart)?;

        let session = CheckoutSession::open(
            cart,
            customer_info,
            billing_address,
            payment_method,
            self.config.checkout_ttl(),
            self.clock.now(),
        )?;

        self.save_session(&session)?;

        info!(
            session_id = %session.id,
            cart_id = %session.cart_id,
            total = session.total,
            currency = %session.currency,
            "opened checkout session"
        );

        Ok(session)
    }

    /// Fetch a stored checkout session.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotFound`] if no session is stored under `id`.
    pub fn checkout_session(&self, id: uuid::Uuid) -> Result<CheckoutSession, CheckoutError> {
        let blob = self
            .store
            .load(&CheckoutSession::storage_key_for(id))?
            .ok_or(CheckoutError::NotFound(id))?;

        Ok(serde_json::from_str(&blob)?)
    }

    /// Mark a session paid, count its coupon as used and clear the cart it was
    /// opened for.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the session is missing, expired or already
    /// settled, or cannot be stored.
    #[tracing::instrument(skip(self))]
    pub fn complete_checkout(&mut self, id: uuid::Uuid) -> Result<CheckoutSession, CheckoutError> {
        let mut session = self.checkout_session(id)?;

        if let Err(err) = session.complete(self.clock.now()) {
            if matches!(err, CheckoutError::Expired(_)) {
                warn!(session_id = %id, "checkout session expired before completion");
                self.save_session(&session)?;
            }

            return Err(err);
        }

        self.save_session(&session)?;

        if let Some(code) = session.coupon_code.as_deref() {
            self.record_coupon_use(code);
        }

        if self
            .cart
            .as_ref()
            .is_some_and(|cart| cart.id() == session.cart_id)
        {
            self.clear_cart();
        }

        info!(session_id = %id, "completed checkout");

        Ok(session)
    }

    fn new_cart(&self, now: Timestamp) -> Cart {
        let cart = Cart::new(self.config.default_currency, now).with_tax_rate(self.config.tax_rate);

        match self
            .config
            .cart_ttl()
            .and_then(|ttl| now.checked_add(ttl).ok())
        {
            Some(expires_at) => cart.with_expiry(expires_at),
            None => cart,
        }
    }

    fn record_coupon_use(&mut self, code: &str) {
        let Some(used) = self.coupons.record_use(code) else {
            warn!(%code, "completed checkout names a coupon that is no longer configured");
            return;
        };

        debug!(%code, used, "recorded coupon use");

        let result = serde_json::to_string(&self.coupons.usage())
            .map_err(|err| err.to_string())
            .and_then(|blob| {
                self.store
                    .save(COUPON_USAGE_KEY, &blob)
                    .map_err(|err| err.to_string())
            });

        if let Err(reason) = result {
            error!(%code, %reason, "failed to persist coupon usage");
        }
    }

    fn load_usage(&self) -> Option<FxHashMap<String, u32>> {
        let blob = match self.store.load(COUPON_USAGE_KEY) {
            Ok(blob) => blob?,
            Err(err) => {
                error!(error = %err, "failed to read coupon usage");
                return None;
            }
        };

        match serde_json::from_str(&blob) {
            Ok(usage) => Some(usage),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable coupon usage");
                None
            }
        }
    }

    fn save_session(&mut self, session: &CheckoutSession) -> Result<(), CheckoutError> {
        let blob = serde_json::to_string(session)?;

        self.store.save(&session.storage_key(), &blob)?;

        Ok(())
    }

    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Cart, &CartConfig, Timestamp) -> Result<T, CartError>,
    ) -> Result<T, CartError> {
        let now = self.clock.now();
        let cart = self.cart.as_mut().ok_or(CartError::NotFound)?;

        let result = op(cart, &self.config, now)?;

        debug!(
            cart_id = %cart.id(),
            lines = cart.len(),
            total = cart.total(),
            "cart updated"
        );

        persist(&mut self.store, &self.config.storage_key, cart);

        Ok(result)
    }

    /// Recover the stored cart, discarding anything unusable.
    fn load_cart(&mut self) -> Option<Cart> {
        let key = self.config.storage_key.clone();

        let blob = match self.store.load(&key) {
            Ok(blob) => blob?,
            Err(err) => {
                error!(error = %err, "failed to read stored cart");
                return None;
            }
        };

        match self.restore(&blob) {
            Ok(cart) => {
                debug!(cart_id = %cart.id(), lines = cart.len(), "restored cart");
                Some(cart)
            }
            Err(reason) => {
                warn!(%reason, "discarding stored cart");

                if let Err(err) = self.store.remove(&key) {
                    error!(error = %err, "failed to remove stored cart");
                }

                None
            }
        }
    }

    fn restore(&self, blob: &str) -> Result<Cart, String> {
        let mut cart: Cart = serde_json::from_str(blob).map_err(|err| err.to_string())?;

        cart.check_limits(&self.config.limits)
            .map_err(|err| err.to_string())?;

        if cart.is_expired(self.clock.now()) {
            return Err("cart expired".to_string());
        }

        let dropped = cart
            .reconcile(self.config.tax_rate, &self.coupons)
            .map_err(|err| err.to_string())?;

        if let Some(coupon) = dropped {
            warn!(code = %coupon.code, "dropped coupon that is no longer available");
        }

        Ok(cart)
    }
}

/// Write the cart blob, logging rather than surfacing failures.
fn persist<S: CartStore>(store: &mut S, key: &str, cart: &Cart) {
    let result = serde_json::to_string(cart)
        .map_err(|err| err.to_string())
        .and_then(|blob| store.save(key, &blob).map_err(|err| err.to_string()));

    if let Err(reason) = result {
        error!(cart_id = %cart.id(), %reason, "failed to persist cart");
    }
}

//! Storefront context shared by every view.

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use tracing::{info, instrument};

use shopfront_core::{Email, OrderEstimate, OrderId, ShippingPolicy};

use crate::api::{ApiClient, ApiError, CheckoutRequest, CouponApplication, Order, User};
use crate::cart::{CartSnapshot, CartStore};
use crate::catalog::Catalog;
use crate::checkout::{self, Checkout, CheckoutEntry, CheckoutError};
use crate::config::ClientConfig;
use crate::error::AppError;
use crate::session::{FileTokenStore, SessionError, SessionStore, TokenStore};

/// Session, cart and catalog for one storefront.
///
/// Cheaply cloneable via `Arc`. The cart follows the session: every call
/// here that changes the user also tells the cart about it.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    api: ApiClient,
    session: SessionStore,
    cart: CartStore,
    catalog: Catalog,
    shipping: ShippingPolicy,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("session", &self.inner.session)
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Create a storefront whose token lives at `config.token_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be read or the HTTP client
    /// cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self, AppError> {
        let tokens = FileTokenStore::open(&config.token_path).map_err(SessionError::from)?;
        Ok(Self::with_token_store(config, Arc::new(tokens))?)
    }

    /// Create a storefront with an explicit token store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_token_store(
        config: ClientConfig,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config, tokens)?;
        let session = SessionStore::new(api.clone());
        let cart = CartStore::new(api.clone(), session.subscribe());
        let catalog = Catalog::new(api.clone(), config.page_size);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                session,
                cart,
                catalog,
                shipping: ShippingPolicy::default(),
            }),
        })
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the REST client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Shipping rule used for pre-checkout estimates.
    #[must_use]
    pub fn shipping_policy(&self) -> &ShippingPolicy {
        &self.inner.shipping
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Restore a saved session and load its cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile or cart cannot be fetched.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<Option<User>, AppError> {
        let user = self.session().restore().await?;
        self.cart().on_session_changed(user.as_ref()).await?;
        Ok(user)
    }

    /// Log in and load the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` with the message to show when the login is
    /// refused, or an error if the cart cannot be fetched.
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<User, AppError> {
        let user = self.session().login(email, password).await?;
        self.cart().on_session_changed(Some(&user)).await?;
        Ok(user)
    }

    /// Log out and drop the local cart. Makes no network call.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be removed; the user and
    /// cart are cleared regardless.
    pub async fn logout(&self) -> Result<(), AppError> {
        let result = self.session().logout();
        self.cart().on_session_changed(None).await?;
        info!("Session ended");
        result.map_err(Into::into)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Pre-checkout totals for the current cart.
    #[must_use]
    pub fn estimate(&self, coupon: Option<&CouponApplication>, has_address: bool) -> OrderEstimate {
        let subtotal = self
            .cart()
            .snapshot()
            .cart
            .as_ref()
            .map_or(Decimal::ZERO, |cart| cart.subtotal());
        let discount = coupon.map_or(Decimal::ZERO, |c| c.discount_amount);
        OrderEstimate::new(subtotal, discount, &self.inner.shipping, has_address)
    }

    /// Validate a coupon against the current cart subtotal.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` without a request when the cart is
    /// empty, or an error if the code is refused.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<CouponApplication, AppError> {
        let snapshot: CartSnapshot = self.cart().snapshot();
        let Some(cart) = snapshot.cart.as_ref().filter(|cart| !cart.is_empty()) else {
            return Err(CheckoutError::EmptyCart.into());
        };
        Ok(self.api().apply_coupon(code, cart.subtotal()).await?)
    }

    /// Turn the cart into an order.
    ///
    /// # Errors
    ///
    /// See [`checkout::place_order`].
    pub async fn place_order(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        checkout::place_order(self.api(), self.cart(), request).await
    }

    /// Enter the payment step for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be loaded.
    pub async fn checkout(&self, order_id: Option<OrderId>) -> Result<CheckoutEntry, CheckoutError> {
        Checkout::enter(self.api(), order_id).await
    }
}

//! Cart state mirrored from the server.
//!
//! The server owns the cart. [`CartStore`] holds the last authoritative
//! snapshot and publishes it on a `watch` channel. Every mutation waits for
//! the server's confirmation, replaces the snapshot with what the mutation
//! itself returned, and publishes exactly once. Nothing is applied
//! optimistically and no mutation triggers a second fetch.
//!
//! Mutations are serialized through an async mutex, so two rapid changes from
//! different controls reach the server in order and each publishes its own
//! revision. A mutation publishes only if the user who started it is still
//! logged in when the server answers.

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument};

use shopfront_core::{CartItemId, ProductId, Quantity, QuantityChange, UserId};

use crate::api::{ApiClient, ApiError, Cart, CartItem, Product, User};
use crate::error::add_breadcrumb;

/// Errors that can occur when changing the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// No user is logged in. Nothing was sent.
    #[error("Log in to manage your cart")]
    AuthenticationRequired,

    /// The session ended while the request was in flight. The server may
    /// have applied it; the local cart was left alone.
    #[error("Your session ended before the cart was updated")]
    SessionEnded,

    /// The line is not in the current snapshot.
    #[error("Item {0} is not in your cart")]
    NotInCart(CartItemId),

    /// Not enough stock to add the requested units.
    #[error("Only {available} more of this product can be added")]
    OutOfStock {
        product_id: ProductId,
        available: u32,
    },

    /// API request failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// The underlying API error, if any.
    #[must_use]
    pub const fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the user has to log in before retrying.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired | Self::SessionEnded | Self::Api(ApiError::Unauthorized(_))
        )
    }
}

/// A published cart state.
///
/// `revision` increases by one with every publish, so subscribers can tell
/// two identical carts apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSnapshot {
    pub revision: u64,
    pub cart: Option<Cart>,
}

impl CartSnapshot {
    /// Cart lines, empty when there is no cart.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.cart
            .as_ref()
            .map(|cart| cart.items.as_slice())
            .unwrap_or_default()
    }

    /// Whether there is nothing to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, Cart::item_count)
    }

    /// Units of a product in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.cart
            .as_ref()
            .map_or(0, |cart| cart.quantity_of(product_id))
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.cart.as_ref().and_then(|cart| cart.item(id))
    }
}

/// The cart after a confirmed removal.
///
/// A returned cart body is authoritative. An empty `204` confirms that
/// exactly this line is gone, so it is dropped from the previous snapshot.
fn after_removal(previous: Option<Cart>, item_id: CartItemId, response: Option<Cart>) -> Option<Cart> {
    match response {
        Some(cart) => Some(cart),
        None => previous.map(|cart| cart.without_item(item_id)),
    }
}

/// Client-side mirror of the server cart.
pub struct CartStore {
    api: ApiClient,
    session: watch::Receiver<Option<User>>,
    snapshot: watch::Sender<CartSnapshot>,
    mutation: Mutex<()>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty cart store that checks `session` before mutating.
    #[must_use]
    pub fn new(api: ApiClient, session: watch::Receiver<Option<User>>) -> Self {
        let (snapshot, _) = watch::channel(CartSnapshot::default());
        Self {
            api,
            session,
            snapshot,
            mutation: Mutex::new(()),
        }
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshot.subscribe()
    }

    fn publish(&self, cart: Option<Cart>) -> CartSnapshot {
        self.snapshot.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.cart = cart;
        });
        let snapshot = self.snapshot();
        debug!(
            revision = snapshot.revision,
            items = snapshot.items().len(),
            "Published cart"
        );
        snapshot
    }

    fn require_session(&self) -> Result<UserId, CartError> {
        self.session
            .borrow()
            .as_ref()
            .map(|user| user.id)
            .ok_or(CartError::AuthenticationRequired)
    }

    /// Publish the result of a request started by `user`, unless the
    /// session has moved on since.
    fn publish_for(&self, user: UserId, cart: Option<Cart>) -> Result<CartSnapshot, CartError> {
        let current = self.session.borrow().as_ref().map(|u| u.id);
        if current != Some(user) {
            debug!(user_id = %user, "Session changed during cart request; dropping response");
            return Err(CartError::SessionEnded);
        }
        Ok(self.publish(cart))
    }

    /// React to the session user appearing or disappearing.
    ///
    /// With no user the cart is dropped locally; with a user it is reloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the reload fails.
    pub async fn on_session_changed(&self, user: Option<&User>) -> Result<CartSnapshot, CartError> {
        match user {
            Some(_) => self.fetch().await,
            None => Ok(self.reset().await),
        }
    }

    /// Drop local cart state without touching the server.
    ///
    /// Waits for a mutation in flight, so its response cannot land after
    /// the reset.
    pub async fn reset(&self) -> CartSnapshot {
        let _guard = self.mutation.lock().await;
        self.publish(None)
    }

    /// Pull the authoritative cart. A user without a cart gets `None`.
    ///
    /// Without a session nothing is fetched and the current snapshot is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<CartSnapshot, CartError> {
        let Ok(user) = self.require_session() else {
            return Ok(self.snapshot());
        };

        let _guard = self.mutation.lock().await;
        let cart = self.api.get_cart().await?;
        self.publish_for(user, cart)
    }

    /// Add units of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AuthenticationRequired` without sending anything
    /// when no user is logged in, or an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, CartError> {
        let user = self.require_session()?;

        let _guard = self.mutation.lock().await;
        let cart = self.api.add_cart_item(product_id, quantity).await?;
        let product = product_id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product.as_str())]));
        self.publish_for(user, Some(cart))
    }

    /// Add units of a product after checking advertised stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::OutOfStock` when the product cannot take the
    /// extra units, plus everything [`Self::add_to_cart`] returns.
    pub async fn add_product(
        &self,
        product: &Product,
        quantity: Quantity,
    ) -> Result<CartSnapshot, CartError> {
        self.require_session()?;

        let available = product.addable(self.snapshot().quantity_of(product.id));
        if quantity.get() > available {
            return Err(CartError::OutOfStock {
                product_id: product.id,
                available,
            });
        }
        self.add_to_cart(product.id, quantity).await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AuthenticationRequired` when no user is logged
    /// in, or an error if the API request fails.
    #[instrument(skip(self), fields(item_id = %item_id, quantity = %quantity))]
    pub async fn update_quantity(
        &self,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, CartError> {
        let user = self.require_session()?;

        let _guard = self.mutation.lock().await;
        let cart = self.api.update_cart_item(item_id, quantity).await?;
        self.publish_for(user, Some(cart))
    }

    /// Apply a requested quantity: at or below zero removes the line.
    ///
    /// # Errors
    ///
    /// See [`Self::update_quantity`] and [`Self::remove`].
    pub async fn change_quantity(
        &self,
        item_id: CartItemId,
        requested: i64,
    ) -> Result<CartSnapshot, CartError> {
        match QuantityChange::from_requested(requested) {
            QuantityChange::Update(quantity) => self.update_quantity(item_id, quantity).await,
            QuantityChange::Remove => self.remove(item_id).await,
        }
    }

    /// The "+" control.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the line is not in the snapshot,
    /// plus everything [`Self::update_quantity`] returns.
    pub async fn increment(&self, item_id: CartItemId) -> Result<CartSnapshot, CartError> {
        let current = self.current_quantity(item_id)?;
        self.update_quantity(item_id, current.increment()).await
    }

    /// The "−" control. Decrementing a single unit removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the line is not in the snapshot,
    /// plus everything [`Self::change_quantity`] returns.
    pub async fn decrement(&self, item_id: CartItemId) -> Result<CartSnapshot, CartError> {
        let current = self.current_quantity(item_id)?;
        match current.decrement() {
            QuantityChange::Update(quantity) => self.update_quantity(item_id, quantity).await,
            QuantityChange::Remove => self.remove(item_id).await,
        }
    }

    fn current_quantity(&self, item_id: CartItemId) -> Result<Quantity, CartError> {
        self.snapshot
            .borrow()
            .item(item_id)
            .map(|item| item.quantity)
            .ok_or(CartError::NotInCart(item_id))
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AuthenticationRequired` when no user is logged
    /// in, or an error if the API request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: CartItemId) -> Result<CartSnapshot, CartError> {
        let user = self.require_session()?;

        let _guard = self.mutation.lock().await;
        let response = self.api.remove_cart_item(item_id).await?;
        let cart = after_removal(self.snapshot().cart, item_id, response);
        let item = item_id.to_string();
        add_breadcrumb("cart", "Removed from cart", Some(&[("item_id", item.as_str())]));
        self.publish_for(user, cart)
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AuthenticationRequired` when no user is logged
    /// in, or an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<CartSnapshot, CartError> {
        let user = self.require_session()?;

        let _guard = self.mutation.lock().await;
        self.api.clear_cart().await?;
        add_breadcrumb("cart", "Cleared cart", None);
        self.publish_for(user, None)
    }
}

//! Storefront REST API client.
//!
//! A thin wrapper binding each logical operation to its endpoint. Every
//! request carries `Authorization: Bearer <token>` when the token store holds
//! one. Non-success responses are classified into [`ApiError`] using the
//! server's `detail` message. Categories and products are cached using `moka`.

mod cache;
pub mod types;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use shopfront_core::{AddressId, CartItemId, Email, OrderId, ProductId, Quantity};

use crate::config::ClientConfig;
use crate::session::TokenStore;

use cache::{CacheKey, CacheValue, CatalogExpiry};
pub use types::*;

// =============================================================================
// ApiError
// =============================================================================

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An endpoint URL could not be built from the configured base.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// 401: bad credentials, or a missing, expired or revoked token.
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// 403: authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other 4xx, carrying the server's `detail` message.
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 5xx.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// The server-supplied message, for errors that carry one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Rejected { message, .. }
            | Self::Server { message, .. } => Some(message),
            Self::Http(_) | Self::Url(_) | Self::Parse(_) => None,
        }
    }

    /// HTTP status that produced this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Rejected { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Url(_) | Self::Parse(_) => None,
        }
    }

    /// Whether this failure points at a bug or an outage rather than a user
    /// mistake. Only these are reported to Sentry.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Url(_) | Self::Server { .. } | Self::Parse(_)
        )
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let message = detail_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            s if s.is_client_error() => Self::Rejected {
                status: s.as_u16(),
                message,
            },
            s => Self::Server {
                status: s.as_u16(),
                message,
            },
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The API reports failures as `{"detail": "..."}`; request validation
/// failures carry a list of `{"msg": "..."}` objects instead.
fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(serde_json::Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST API.
///
/// Cheap to clone; all clones share the HTTP connection pool, token store and
/// catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base: Url,
    tokens: Arc<dyn TokenStore>,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .expire_after(CatalogExpiry {
                category_ttl: config.category_ttl,
            })
            .build();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        // Relative joins replace the last path segment unless the base ends
        // with a slash.
        let mut base = config.api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client: builder.build()?,
                base,
                tokens,
                cache,
            }),
        })
    }

    /// The normalized API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// The token store requests are authorized from.
    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Drop all cached catalog data.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base.join(path.trim_start_matches('/'))?)
    }

    /// Attach the bearer token, send, and classify the status.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.inner.tokens.token() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ApiError::from_status(status, &body);
        if error.is_unexpected() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "API returned server error"
            );
        } else {
            debug!(status = %status, error = %error, "API rejected request");
        }
        Err(error)
    }

    /// Decode a JSON body, logging the raw text when it does not parse.
    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let response = self.send(self.inner.client.get(url)).await?;
        Self::json(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self.send(self.inner.client.post(url).json(body)).await?;
        Self::json(response).await
    }

    async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        let url = self.url(path)?;
        self.send(self.inner.client.delete(url)).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List one page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(skip = query.skip, limit = query.limit))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, ApiError> {
        let url = self.url("products/")?;
        let response = self.send(self.inner.client.get(url).query(query)).await?;
        Self::json(response).await
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown products, or an error if the
    /// API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.get(&format!("products/{id}")).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List all product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.get("products/categories").await?;

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Get the current user's cart. A 404 means the user has no cart yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails for any other reason.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Option<Cart>, ApiError> {
        match self.get("cart/").await {
            Ok(cart) => Ok(Some(cart)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    pub async fn add_cart_item(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, ApiError> {
        self.post(
            "cart/items",
            &AddCartItem {
                product_id,
                quantity,
            },
        )
        .await
    }

    /// Set a cart line's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(item_id = %item_id, quantity = %quantity))]
    pub async fn update_cart_item(
        &self,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<Cart, ApiError> {
        let url = self.url(&format!("cart/items/{item_id}"))?;
        let request = self
            .inner
            .client
            .put(url)
            .query(&[("quantity", quantity.get())]);
        let response = self.send(request).await?;
        Self::json(response).await
    }

    /// Delete a cart line.
    ///
    /// Returns the updated cart when the server sends one back, or `None` for
    /// an empty `204` confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_cart_item(&self, item_id: CartItemId) -> Result<Option<Cart>, ApiError> {
        let response = self.delete(&format!("cart/items/{item_id}")).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Delete every line in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), ApiError> {
        self.delete("cart/").await?;
        Ok(())
    }

    // =========================================================================
    // Auth & Users
    // =========================================================================

    /// Exchange credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials, or an error if
    /// the API request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<TokenResponse, ApiError> {
        let url = self.url("auth/login")?;
        let form = LoginForm {
            username: email.as_str(),
            password: password.expose_secret(),
        };
        let response = self.send(self.inner.client.post(url).form(&form)).await?;
        Self::json(response).await
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the registration,
    /// or an error if the API request fails.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, ApiError> {
        self.post("auth/register", registration).await
    }

    /// Fetch the profile the current token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for a stale token, or an error if the
    /// API request fails.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("users/me").await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create an order from the current cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` when the server refuses the checkout
    /// (empty cart, stock, coupon), or an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Order, ApiError> {
        self.post("orders/checkout", request).await
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ApiError> {
        self.get(&format!("orders/{id}")).await
    }

    /// List the current user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get("orders/").await
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Ask the server to open a gateway order for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_payment_order(&self, order_id: OrderId) -> Result<PaymentOrder, ApiError> {
        self.post(&format!("payments/order/{order_id}"), &serde_json::json!({}))
            .await
    }

    /// Forward a gateway confirmation for signature verification.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` when verification fails, or an error if
    /// the API request fails.
    #[instrument(skip(self, confirmation), fields(gateway_order_id = %confirmation.gateway_order_id))]
    pub async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<PaymentVerification, ApiError> {
        self.post("payments/verify", confirmation).await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// List saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self) -> Result<Vec<Address>, ApiError> {
        self.get("address/").await
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, address))]
    pub async fn create_address(&self, address: &NewAddress) -> Result<Address, ApiError> {
        self.post("address/", address).await
    }

    /// Delete a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: AddressId) -> Result<(), ApiError> {
        self.delete(&format!("address/{id}")).await?;
        Ok(())
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Validate a coupon code against a cart subtotal.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` or `ApiError::Rejected` for unknown or
    /// ineligible codes, or an error if the API request fails.
    #[instrument(skip(self), fields(code = %code, cart_total = %cart_total))]
    pub async fn apply_coupon(
        &self,
        code: &str,
        cart_total: Decimal,
    ) -> Result<CouponApplication, ApiError> {
        let mut url = self.url("offers/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(code.trim())
            .push("apply");

        let request = self
            .inner
            .client
            .post(url)
            .json(&CouponRequest { cart_total });
        let response = self.send(request).await?;
        Self::json(response).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig::new(Url::parse(base).unwrap());
        ApiClient::new(&config, Arc::new(MemoryTokenStore::default())).unwrap()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let api = client("http://127.0.0.1:8000/api/v1");
        assert_eq!(api.base_url().as_str(), "http://127.0.0.1:8000/api/v1/");
        assert_eq!(
            api.url("/products/").unwrap().as_str(),
            "http://127.0.0.1:8000/api/v1/products/"
        );
        assert_eq!(
            api.url("cart/items/4").unwrap().as_str(),
            "http://127.0.0.1:8000/api/v1/cart/items/4"
        );
    }

    #[test]
    fn test_detail_message_string() {
        assert_eq!(
            detail_message(r#"{"detail":"Not enough stock"}"#).as_deref(),
            Some("Not enough stock")
        );
    }

    #[test]
    fn test_detail_message_validation_list() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email"}]}"#;
        assert_eq!(
            detail_message(body).as_deref(),
            Some("value is not a valid email")
        );
        assert_eq!(detail_message("<html>oops</html>"), None);
    }

    #[test]
    fn test_status_classification() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":"Cart is empty"}"#);
        assert_eq!(err.detail(), Some("Cart is empty"));
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_unexpected());

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "");
        assert!(err.is_unexpected());
        assert_eq!(err.detail(), Some("Bad Gateway"));
    }
}

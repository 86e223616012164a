//! Wire types for the storefront REST API.
//!
//! These mirror the JSON the API produces and accepts. Amounts arrive as JSON
//! numbers and are decoded straight into [`Decimal`]; fields the client does
//! not use (timestamps on products, audit columns) are ignored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use shopfront_core::{
    AddressId, CartId, CartItemId, CategoryId, Email, OrderId, OrderItemId, OrderStatus,
    PaymentStatus, Price, ProductId, Quantity, ShipmentId, ShipmentStatus, UserId,
};

// =============================================================================
// Catalog
// =============================================================================

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// Read-only product projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category: Option<Category>,
}

impl Product {
    /// Unit price in the store currency.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::inr(self.price)
    }

    /// Whether any stock is left.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// How many more units can be added on top of `in_cart`.
    ///
    /// Stock is advisory: the server has the final word at checkout.
    #[must_use]
    pub fn addable(&self, in_cart: u32) -> u32 {
        let remaining = self.stock_quantity - i64::from(in_cart);
        u32::try_from(remaining.max(0)).unwrap_or(u32::MAX)
    }
}

/// Query parameters for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductQuery {
    pub skip: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

// =============================================================================
// Cart
// =============================================================================

/// A cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub product: Product,
}

impl CartItem {
    /// `unit price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity.get())
    }
}

/// Server-owned cart snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity.get()))
    }

    /// Sum of line totals, as shown before checkout.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Look up a line by its ID.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Look up the line holding a product.
    #[must_use]
    pub fn item_for_product(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.product_id == product_id || item.product.id == product_id)
    }

    /// Units of a product currently in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.item_for_product(product_id)
            .map_or(0, |item| item.quantity.get())
    }

    /// This snapshot with one line dropped.
    #[must_use]
    pub fn without_item(mut self, id: CartItemId) -> Self {
        self.items.retain(|item| item.id != id);
        self
    }
}

/// Body of `POST /cart/items`.
#[derive(Debug, Clone, Serialize)]
pub struct AddCartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

// =============================================================================
// Users & Auth
// =============================================================================

/// Authenticated user's profile (`GET /users/me`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl User {
    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: Email,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
    pub full_name: String,
}

/// Form body of `POST /auth/login`.
#[derive(Debug, Serialize)]
pub(crate) struct LoginForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

// =============================================================================
// Orders
// =============================================================================

/// Body of `POST /orders/checkout`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address_id: Option<AddressId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// A purchased line, priced at the time of purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price_at_purchase: Decimal,
    #[serde(default)]
    pub product: Option<Product>,
}

/// Shipment tracking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    #[serde(default)]
    pub courier_name: Option<String>,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub status: Option<ShipmentStatus>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// An order as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub shipping_address_id: Option<AddressId>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    /// Not part of the stock order response; read when a deployment adds it.
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub shipment: Option<Shipment>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Payments
// =============================================================================

/// Response of `POST /payments/order/{order_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: OrderId,
    #[serde(rename = "razorpay_order_id")]
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub key_id: Option<String>,
}

impl PaymentOrder {
    /// Key prefix the server uses when no real gateway is configured.
    pub const MOCK_KEY_PREFIX: &'static str = "mock_";

    /// Whether the server issued a mock gateway key.
    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.key_id
            .as_deref()
            .is_some_and(|key| key.starts_with(Self::MOCK_KEY_PREFIX))
    }
}

/// Signed confirmation returned by the gateway, forwarded for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(rename = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

/// Response of `POST /payments/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVerification {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Addresses
// =============================================================================

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone_number: String,
    pub start_line: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Body of `POST /address/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub full_name: String,
    pub phone_number: String,
    pub start_line: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

// =============================================================================
// Coupons
// =============================================================================

/// Body of `POST /offers/{code}/apply`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CouponRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub cart_total: Decimal,
}

/// Server-validated coupon discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponApplication {
    pub code: String,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
}

// =============================================================================
// Helpers
// =============================================================================

const fn default_true() -> bool {
    true
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn default_country() -> String {
    "India".to_string()
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cart_json() -> serde_json::Value {
        serde_json::json!({
            "id": 1,
            "user_id": 7,
            "items": [
                {
                    "id": 11,
                    "product_id": 3,
                    "quantity": 2,
                    "product": {
                        "id": 3,
                        "name": "Brass Lamp",
                        "description": null,
                        "price": 149.5,
                        "image_url": null,
                        "stock_quantity": 4,
                        "is_active": true,
                        "category_id": 2,
                        "created_at": "2024-05-01T10:00:00+00:00",
                        "updated_at": null,
                        "category": {"id": 2, "name": "Home", "slug": "home"}
                    }
                }
            ]
        })
    }

    #[test]
    fn test_cart_decodes_float_prices() {
        let cart: Cart = serde_json::from_value(cart_json()).unwrap();
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.subtotal(), Decimal::from(299));
        assert_eq!(cart.quantity_of(ProductId::new(3)), 2);
        assert_eq!(
            cart.items[0].product.category.as_ref().unwrap().slug,
            "home"
        );
    }

    #[test]
    fn test_without_item() {
        let cart: Cart = serde_json::from_value(cart_json()).unwrap();
        let cart = cart.without_item(CartItemId::new(11));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_product_addable_respects_stock() {
        let cart: Cart = serde_json::from_value(cart_json()).unwrap();
        let product = &cart.items[0].product;
        assert_eq!(product.addable(2), 2);
        assert_eq!(product.addable(9), 0);
    }

    #[test]
    fn test_payment_order_mock_detection() {
        let payment: PaymentOrder = serde_json::from_value(serde_json::json!({
            "order_id": 9,
            "razorpay_order_id": "order_mock_ab12cd34",
            "amount": 250.0,
            "currency": "INR",
            "key_id": "mock_key"
        }))
        .unwrap();
        assert!(payment.is_mock());
        assert_eq!(payment.gateway_order_id, "order_mock_ab12cd34");
    }

    #[test]
    fn test_confirmation_uses_gateway_field_names() {
        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        let json = serde_json::to_value(&confirmation).unwrap();
        assert_eq!(json["razorpay_order_id"], "order_1");
        assert_eq!(json["razorpay_payment_id"], "pay_1");
        assert_eq!(json["razorpay_signature"], "sig");
    }

    #[test]
    fn test_coupon_request_sends_number() {
        let body = CouponRequest {
            cart_total: Decimal::new(3995, 1),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["cart_total"].is_number());
    }

    #[test]
    fn test_registration_exposes_password_only_on_the_wire() {
        let registration = Registration {
            email: Email::parse("new@shop.in").unwrap(),
            password: SecretString::from("hunter22"),
            full_name: "New Buyer".to_string(),
        };
        assert!(!format!("{registration:?}").contains("hunter22"));
        let json = serde_json::to_value(&registration).unwrap();
        assert_eq!(json["password"], "hunter22");
    }
}

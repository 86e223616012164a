//! Integration tests for Shopfront.
//!
//! [`FakeApi`] serves the storefront REST API from memory on an ephemeral
//! port, so the real client can be driven end to end without a backend.
//! Every request is counted by method and route template, which is how the
//! tests prove that an operation made no network call.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Behavior
//!
//! The fake follows the real backend where the client can observe it:
//! - tokens are `token-<user id>` and every protected route answers `401`
//!   once [`FakeApi::revoke_tokens`] has been called
//! - checkout empties the server cart and charges ₹50 shipping below a ₹500
//!   subtotal when an address is given
//! - orders start `pending`; a verified payment moves them to `confirmed`
//!   and opens a `ready_to_ship` shipment, unless shipments are switched off
//!   with [`FakeApi::set_skip_shipments`]
//! - order responses carry no payment status field
//! - payment orders use the `mock_key` key and `mock_signature` verifies
//! - `SAVE50` takes ₹50 off

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Form, MatchedPath, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use shopfront_client::session::{MemoryTokenStore, TokenStore};
use shopfront_client::{ClientConfig, Storefront};
use shopfront_core::{Email, ProductId};

/// Seeded account.
pub const SHOPPER_EMAIL: &str = "shopper@example.com";
/// Password of the seeded account.
pub const SHOPPER_PASSWORD: &str = "correct-horse";
/// The one coupon the fake accepts.
pub const COUPON_CODE: &str = "SAVE50";
/// Signature the fake verifies.
pub const MOCK_SIGNATURE: &str = "mock_signature";

const API_PREFIX: &str = "/api/v1";
const FREE_SHIPPING_FROM: i64 = 500;
const FLAT_SHIPPING: i64 = 50;
const COUPON_DISCOUNT: i64 = 50;

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Debug, Clone)]
struct UserRecord {
    id: i64,
    email: String,
    password: String,
    full_name: Option<String>,
}

#[derive(Debug, Clone)]
struct ProductRecord {
    id: i64,
    name: String,
    price: Decimal,
    stock: i64,
    category_id: i64,
}

#[derive(Debug, Clone)]
struct LineRecord {
    id: i64,
    product_id: i64,
    quantity: i64,
}

#[derive(Debug, Clone)]
struct CartRecord {
    id: i64,
    lines: Vec<LineRecord>,
}

#[derive(Debug, Clone)]
struct OrderLine {
    id: i64,
    product_id: i64,
    quantity: i64,
    price: Decimal,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    id: i64,
    user_id: i64,
    shipping_address_id: Option<i64>,
    subtotal: Decimal,
    shipping: Decimal,
    discount: Decimal,
    coupon: Option<String>,
    total: Decimal,
    status: &'static str,
    shipment_id: Option<i64>,
    created_at: DateTime<Utc>,
    lines: Vec<OrderLine>,
}

#[derive(Debug, Clone)]
struct AddressRecord {
    id: i64,
    user_id: i64,
    fields: Value,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    users: Vec<UserRecord>,
    categories: Vec<(i64, String, String)>,
    products: Vec<ProductRecord>,
    carts: HashMap<i64, CartRecord>,
    orders: Vec<OrderRecord>,
    gateway_orders: HashMap<String, i64>,
    addresses: Vec<AddressRecord>,
    revoked: bool,
    remove_returns_cart: bool,
    live_gateway: bool,
    skip_shipments: bool,
    add_delay: Option<std::time::Duration>,
    hits: HashMap<String, usize>,
}

type Shared = Arc<Mutex<Store>>;

fn lock(state: &Shared) -> MutexGuard<'_, Store> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn amount(value: Decimal) -> Value {
    json!(value.to_f64().unwrap_or_default())
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product(&self, id: i64) -> Option<&ProductRecord> {
        self.products.iter().find(|p| p.id == id)
    }

    fn user_json(user: &UserRecord) -> Value {
        json!({
            "id": user.id,
            "email": user.email,
            "full_name": user.full_name,
            "is_active": true,
        })
    }

    fn product_json(&self, product: &ProductRecord) -> Value {
        let category = self
            .categories
            .iter()
            .find(|(id, _, _)| *id == product.category_id)
            .map(|(id, name, slug)| json!({ "id": id, "name": name, "slug": slug }));
        json!({
            "id": product.id,
            "name": product.name,
            "description": format!("A fine {}", product.name.to_lowercase()),
            "price": amount(product.price),
            "image_url": null,
            "stock_quantity": product.stock,
            "is_active": true,
            "category_id": product.category_id,
            "category": category,
        })
    }

    fn cart_json(&self, user_id: i64, cart: &CartRecord) -> Value {
        let items: Vec<Value> = cart
            .lines
            .iter()
            .filter_map(|line| {
                let product = self.product(line.product_id)?;
                Some(json!({
                    "id": line.id,
                    "product_id": line.product_id,
                    "quantity": line.quantity,
                    "product": self.product_json(product),
                }))
            })
            .collect();
        json!({ "id": cart.id, "user_id": user_id, "items": items })
    }

    fn order_json(&self, order: &OrderRecord) -> Value {
        let items: Vec<Value> = order
            .lines
            .iter()
            .map(|line| {
                json!({
                    "id": line.id,
                    "product_id": line.product_id,
                    "quantity": line.quantity,
                    "price_at_purchase": amount(line.price),
                    "product": self.product(line.product_id).map(|p| self.product_json(p)),
                })
            })
            .collect();
        let shipment = order.shipment_id.map(|id| {
            json!({
                "id": id,
                "order_id": order.id,
                "courier_name": "Delhivery",
                "tracking_id": format!("TRK{:06}", order.id),
                "status": "ready_to_ship",
                "estimated_delivery": (order.created_at + Duration::days(5)).to_rfc3339(),
            })
        });
        json!({
            "id": order.id,
            "user_id": order.user_id,
            "shipping_address_id": order.shipping_address_id,
            "subtotal": amount(order.subtotal),
            "shipping_cost": amount(order.shipping),
            "discount_amount": amount(order.discount),
            "coupon_code": order.coupon,
            "total_amount": amount(order.total),
            "status": order.status,
            "shipment": shipment,
            "created_at": order.created_at.to_rfc3339(),
            "items": items,
        })
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<i64, Failure> {
        let unauthorized = || Failure(StatusCode::UNAUTHORIZED, "Could not validate credentials".into());
        if self.revoked {
            return Err(unauthorized());
        }
        let user_id = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer token-"))
            .and_then(|id| id.parse::<i64>().ok())
            .ok_or_else(unauthorized)?;
        if self.users.iter().any(|u| u.id == user_id) {
            Ok(user_id)
        } else {
            Err(unauthorized())
        }
    }
}

/// Error reply in the backend's `{"detail": ...}` shape.
struct Failure(StatusCode, String);

impl Failure {
    fn not_found(what: &str) -> Self {
        Self(StatusCode::NOT_FOUND, format!("{what} not found"))
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

type Reply = Result<Json<Value>, Failure>;

// =============================================================================
// Handlers
// =============================================================================

async fn count_hits(
    State(state): State<Shared>,
    matched: MatchedPath,
    request: Request,
    next: Next,
) -> Response {
    let route = matched.as_str();
    let route = route.strip_prefix(API_PREFIX).unwrap_or(route);
    let key = format!("{} {route}", request.method());
    *lock(&state).hits.entry(key).or_default() += 1;
    next.run(request).await
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    skip: Option<usize>,
    limit: Option<usize>,
    search: Option<String>,
    category_id: Option<i64>,
}

async fn list_products(State(state): State<Shared>, Query(query): Query<ListQuery>) -> Json<Value> {
    let store = lock(&state);
    let search = query.search.map(|s| s.to_lowercase());
    let products: Vec<Value> = store
        .products
        .iter()
        .filter(|p| search.as_ref().is_none_or(|s| p.name.to_lowercase().contains(s)))
        .filter(|p| query.category_id.is_none_or(|c| p.category_id == c))
        .skip(query.skip.unwrap_or(0))
        .take(query.limit.unwrap_or(100))
        .map(|p| store.product_json(p))
        .collect();
    Json(Value::Array(products))
}

async fn list_categories(State(state): State<Shared>) -> Json<Value> {
    let store = lock(&state);
    let categories: Vec<Value> = store
        .categories
        .iter()
        .map(|(id, name, slug)| json!({ "id": id, "name": name, "slug": slug }))
        .collect();
    Json(Value::Array(categories))
}

async fn get_product(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    let store = lock(&state);
    let product = store.product(id).ok_or_else(|| Failure::not_found("Product"))?;
    Ok(Json(store.product_json(product)))
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let cart = store.carts.get(&user_id).ok_or_else(|| Failure::not_found("Cart"))?;
    Ok(Json(store.cart_json(user_id, cart)))
}

#[derive(Debug, Deserialize)]
struct AddItem {
    product_id: i64,
    quantity: i64,
}

async fn add_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<AddItem>,
) -> Reply {
    let delay = lock(&state).add_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    if body.quantity < 1 {
        return Err(Failure::bad_request("Quantity must be at least 1"));
    }
    let stock = store
        .product(body.product_id)
        .map(|p| p.stock)
        .ok_or_else(|| Failure::not_found("Product"))?;

    let cart_id = store.next_id();
    let line_id = store.next_id();
    let cart = store.carts.entry(user_id).or_insert_with(|| CartRecord {
        id: cart_id,
        lines: Vec::new(),
    });
    let existing = cart
        .lines
        .iter()
        .find(|l| l.product_id == body.product_id)
        .map_or(0, |l| l.quantity);
    if existing + body.quantity > stock {
        return Err(Failure::bad_request("Not enough stock"));
    }
    match cart.lines.iter_mut().find(|l| l.product_id == body.product_id) {
        Some(line) => line.quantity += body.quantity,
        None => cart.lines.push(LineRecord {
            id: line_id,
            product_id: body.product_id,
            quantity: body.quantity,
        }),
    }

    let cart = cart.clone();
    Ok(Json(store.cart_json(user_id, &cart)))
}

#[derive(Debug, Deserialize)]
struct QuantityQuery {
    quantity: i64,
}

async fn update_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
    Query(query): Query<QuantityQuery>,
) -> Reply {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    if query.quantity < 1 {
        return Err(Failure::bad_request("Quantity must be at least 1"));
    }

    let product_id = store
        .carts
        .get(&user_id)
        .and_then(|cart| cart.lines.iter().find(|l| l.id == item_id))
        .map(|line| line.product_id)
        .ok_or_else(|| Failure::not_found("Item"))?;
    let stock = store.product(product_id).map_or(0, |p| p.stock);
    if query.quantity > stock {
        return Err(Failure::bad_request("Not enough stock"));
    }

    let cart = store
        .carts
        .get_mut(&user_id)
        .ok_or_else(|| Failure::not_found("Cart"))?;
    if let Some(line) = cart.lines.iter_mut().find(|l| l.id == item_id) {
        line.quantity = query.quantity;
    }
    let cart = cart.clone();
    Ok(Json(store.cart_json(user_id, &cart)))
}

async fn remove_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
) -> Result<Response, Failure> {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let cart = store
        .carts
        .get_mut(&user_id)
        .ok_or_else(|| Failure::not_found("Item"))?;
    let before = cart.lines.len();
    cart.lines.retain(|l| l.id != item_id);
    if cart.lines.len() == before {
        return Err(Failure::not_found("Item"));
    }

    if store.remove_returns_cart {
        let cart = store.carts.get(&user_id).cloned().ok_or_else(|| Failure::not_found("Cart"))?;
        Ok(Json(store.cart_json(user_id, &cart)).into_response())
    } else {
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Result<StatusCode, Failure> {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    if let Some(cart) = store.carts.get_mut(&user_id) {
        cart.lines.clear();
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(state): State<Shared>, Form(form): Form<LoginForm>) -> Reply {
    let store = lock(&state);
    let user = store
        .users
        .iter()
        .find(|u| u.email == form.username && u.password == form.password)
        .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Incorrect email or password".into()))?;
    Ok(Json(json!({
        "access_token": format!("token-{}", user.id),
        "token_type": "bearer",
    })))
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
    full_name: Option<String>,
}

async fn register(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Reply {
    let mut store = lock(&state);
    if store.users.iter().any(|u| u.email == body.email) {
        return Err(Failure::bad_request("Email already registered"));
    }
    let user = UserRecord {
        id: store.next_id(),
        email: body.email,
        password: body.password,
        full_name: body.full_name,
    };
    let json = Store::user_json(&user);
    store.users.push(user);
    Ok(Json(json))
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let user = store
        .users
        .iter()
        .find(|u| u.id == user_id)
        .ok_or_else(|| Failure::not_found("User"))?;
    Ok(Json(Store::user_json(user)))
}

#[derive(Debug, Deserialize)]
struct CheckoutBody {
    shipping_address_id: Option<i64>,
    coupon_code: Option<String>,
}

async fn checkout(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Reply {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let lines = store
        .carts
        .get(&user_id)
        .map(|cart| cart.lines.clone())
        .unwrap_or_default();
    if lines.is_empty() {
        return Err(Failure::bad_request("Cart is empty"));
    }

    let mut order_lines = Vec::new();
    let mut subtotal = Decimal::ZERO;
    for line in &lines {
        let product = store
            .product(line.product_id)
            .ok_or_else(|| Failure::not_found("Product"))?;
        if product.stock < line.quantity {
            return Err(Failure::bad_request(format!("Not enough stock for {}", product.name)));
        }
        subtotal += product.price * Decimal::from(line.quantity);
        order_lines.push(OrderLine {
            id: 0,
            product_id: line.product_id,
            quantity: line.quantity,
            price: product.price,
        });
    }

    let discount = match body.coupon_code.as_deref() {
        None => Decimal::ZERO,
        Some(COUPON_CODE) => Decimal::from(COUPON_DISCOUNT).min(subtotal),
        Some(_) => return Err(Failure::bad_request("Invalid coupon code")),
    };
    let shipping = if body.shipping_address_id.is_some() && subtotal < Decimal::from(FREE_SHIPPING_FROM) {
        Decimal::from(FLAT_SHIPPING)
    } else {
        Decimal::ZERO
    };

    for line in &mut order_lines {
        line.id = store.next_id();
        if let Some(product) = store.products.iter_mut().find(|p| p.id == line.product_id) {
            product.stock -= line.quantity;
        }
    }
    if let Some(cart) = store.carts.get_mut(&user_id) {
        cart.lines.clear();
    }

    let id = store.next_id();
    let order = OrderRecord {
        id,
        user_id,
        shipping_address_id: body.shipping_address_id,
        subtotal,
        shipping,
        discount,
        coupon: body.coupon_code.filter(|_| !discount.is_zero()),
        total: subtotal - discount + shipping,
        status: "pending",
        shipment_id: None,
        created_at: Utc::now() + Duration::seconds(id),
        lines: order_lines,
    };
    let json = store.order_json(&order);
    store.orders.push(order);
    Ok(Json(json))
}

fn find_order(store: &Store, user_id: i64, order_id: i64) -> Result<OrderRecord, Failure> {
    store
        .orders
        .iter()
        .find(|o| o.id == order_id && o.user_id == user_id)
        .cloned()
        .ok_or_else(|| Failure::not_found("Order"))
}

async fn get_order(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let order = find_order(&store, user_id, id)?;
    Ok(Json(store.order_json(&order)))
}

async fn list_orders(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let orders: Vec<Value> = store
        .orders
        .iter()
        .filter(|o| o.user_id == user_id)
        .map(|o| store.order_json(o))
        .collect();
    Ok(Json(Value::Array(orders)))
}

async fn create_payment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Reply {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let order = find_order(&store, user_id, order_id)?;
    if order.status != "pending" {
        return Err(Failure::bad_request("Order is already paid"));
    }

    let gateway_order_id = format!("order_mock_{:08x}", store.next_id());
    store.gateway_orders.insert(gateway_order_id.clone(), order_id);
    let key_id = if store.live_gateway {
        "rzp_test_live"
    } else {
        "mock_key"
    };
    Ok(Json(json!({
        "order_id": order_id,
        "razorpay_order_id": gateway_order_id,
        "amount": amount(order.total),
        "currency": "INR",
        "key_id": key_id,
    })))
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    razorpay_order_id: String,
    razorpay_payment_id: String,
    razorpay_signature: String,
}

async fn verify_payment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<VerifyBody>,
) -> Reply {
    let mut store = lock(&state);
    store.authenticate(&headers)?;
    let order_id = *store
        .gateway_orders
        .get(&body.razorpay_order_id)
        .ok_or_else(|| Failure::not_found("Payment order"))?;

    let valid =
        body.razorpay_signature == MOCK_SIGNATURE && body.razorpay_payment_id.starts_with("pay_");
    if !valid {
        return Err(Failure::bad_request("Invalid Payment Signature"));
    }

    let shipment_id = (!store.skip_shipments).then(|| store.next_id());
    let order = store
        .orders
        .iter_mut()
        .find(|o| o.id == order_id)
        .ok_or_else(|| Failure::not_found("Order"))?;
    order.status = "confirmed";
    if order.shipment_id.is_none() {
        order.shipment_id = shipment_id;
    }
    Ok(Json(json!({ "status": "success", "message": "Payment verified" })))
}

async fn list_addresses(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let addresses: Vec<Value> = store
        .addresses
        .iter()
        .filter(|a| a.user_id == user_id)
        .map(address_json)
        .collect();
    Ok(Json(Value::Array(addresses)))
}

fn address_json(address: &AddressRecord) -> Value {
    let mut json = address.fields.clone();
    if let Value::Object(map) = &mut json {
        map.insert("id".to_string(), json!(address.id));
        map.insert("user_id".to_string(), json!(address.user_id));
    }
    json
}

async fn create_address(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(fields): Json<Value>,
) -> Reply {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let address = AddressRecord {
        id: store.next_id(),
        user_id,
        fields,
    };
    let json = address_json(&address);
    store.addresses.push(address);
    Ok(Json(json))
}

async fn delete_address(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, Failure> {
    let mut store = lock(&state);
    let user_id = store.authenticate(&headers)?;
    let before = store.addresses.len();
    store.addresses.retain(|a| !(a.id == id && a.user_id == user_id));
    if store.addresses.len() == before {
        return Err(Failure::not_found("Address"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CouponBody {
    cart_total: f64,
}

async fn apply_coupon(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Json(body): Json<CouponBody>,
) -> Reply {
    let store = lock(&state);
    store.authenticate(&headers)?;
    if code != COUPON_CODE {
        return Err(Failure::not_found("Coupon"));
    }
    let total = Decimal::try_from(body.cart_total).unwrap_or_default();
    let discount = Decimal::from(COUPON_DISCOUNT).min(total);
    Ok(Json(json!({
        "code": code,
        "discount_amount": amount(discount),
        "final_total": amount(total - discount),
    })))
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/v1/products/", get(list_products))
        .route("/api/v1/products/categories", get(list_categories))
        .route("/api/v1/products/{id}", get(get_product))
        .route("/api/v1/cart/", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_item))
        .route("/api/v1/cart/items/{id}", put(update_item).delete(remove_item))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/orders/", get(list_orders))
        .route("/api/v1/orders/checkout", post(checkout))
        .route("/api/v1/orders/{id}", get(get_order))
        .route("/api/v1/payments/order/{id}", post(create_payment))
        .route("/api/v1/payments/verify", post(verify_payment))
        .route("/api/v1/address/", get(list_addresses).post(create_address))
        .route("/api/v1/address/{id}", delete(delete_address))
        .route("/api/v1/offers/{code}/apply", post(apply_coupon))
        .route_layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .with_state(state)
}

// =============================================================================
// FakeApi
// =============================================================================

/// A running fake of the storefront API.
pub struct FakeApi {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl FakeApi {
    /// Start a fake with the seeded shopper and one category.
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        {
            let mut store = lock(&state);
            let user_id = store.next_id();
            store.users.push(UserRecord {
                id: user_id,
                email: SHOPPER_EMAIL.to_string(),
                password: SHOPPER_PASSWORD.to_string(),
                full_name: Some("Asha Shopper".to_string()),
            });
            let category_id = store.next_id();
            store
                .categories
                .push((category_id, "Lighting".to_string(), "lighting".to_string()));
        }

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake API listener");
        let addr = listener.local_addr().expect("fake API address");
        let app = router(Arc::clone(&state));
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// API base URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}{API_PREFIX}", self.addr)).expect("fake API URL")
    }

    /// Client configuration pointing at this fake.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url())
    }

    /// A logged-out storefront with an in-memory token store.
    #[must_use]
    pub fn storefront(&self) -> Storefront {
        self.storefront_with_tokens(Arc::new(MemoryTokenStore::default()))
    }

    /// A storefront with the given token store.
    #[must_use]
    pub fn storefront_with_tokens(&self, tokens: Arc<dyn TokenStore>) -> Storefront {
        Storefront::with_token_store(self.config(), tokens).expect("build storefront")
    }

    /// A storefront logged in as the seeded shopper.
    pub async fn logged_in(&self) -> Storefront {
        let store = self.storefront();
        let email = Email::parse(SHOPPER_EMAIL).expect("seeded email");
        store
            .login(&email, &secrecy::SecretString::from(SHOPPER_PASSWORD))
            .await
            .expect("seeded shopper logs in");
        store
    }

    /// A token the fake accepts for the seeded shopper.
    #[must_use]
    pub fn shopper_token(&self) -> String {
        let store = lock(&self.state);
        let id = store
            .users
            .iter()
            .find(|u| u.email == SHOPPER_EMAIL)
            .map_or(0, |u| u.id);
        format!("token-{id}")
    }

    /// Add a product in the seeded category.
    pub fn add_product(&self, name: &str, price: i64, stock: i64) -> ProductId {
        let mut store = lock(&self.state);
        let id = store.next_id();
        let category_id = store.categories.first().map_or(0, |(id, _, _)| *id);
        store.products.push(ProductRecord {
            id,
            name: name.to_string(),
            price: Decimal::from(price),
            stock,
            category_id,
        });
        ProductId::new(id)
    }

    /// Stock left for a product.
    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> i64 {
        lock(&self.state).product(id.as_i64()).map_or(0, |p| p.stock)
    }

    /// `(product id, quantity)` pairs in the server cart of the seeded shopper.
    #[must_use]
    pub fn server_cart(&self) -> Vec<(i64, i64)> {
        let store = lock(&self.state);
        let Some(user) = store.users.iter().find(|u| u.email == SHOPPER_EMAIL) else {
            return Vec::new();
        };
        store
            .carts
            .get(&user.id)
            .map(|cart| cart.lines.iter().map(|l| (l.product_id, l.quantity)).collect())
            .unwrap_or_default()
    }

    /// Reject every token from now on.
    pub fn revoke_tokens(&self) {
        lock(&self.state).revoked = true;
    }

    /// Answer line removals with the full cart instead of `204`.
    pub fn set_remove_returns_cart(&self, enabled: bool) {
        lock(&self.state).remove_returns_cart = enabled;
    }

    /// Hand out a live gateway key instead of `mock_key`.
    pub fn set_live_gateway(&self, enabled: bool) {
        lock(&self.state).live_gateway = enabled;
    }

    /// Confirm payments without opening a shipment.
    pub fn set_skip_shipments(&self, enabled: bool) {
        lock(&self.state).skip_shipments = enabled;
    }

    /// Hold every `POST /cart/items` for `delay` before answering.
    pub fn set_add_delay(&self, delay: std::time::Duration) {
        lock(&self.state).add_delay = Some(delay);
    }

    /// Requests seen for a route such as `"GET /cart/"`.
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        lock(&self.state).hits.get(route).copied().unwrap_or(0)
    }

    /// Requests seen for any route under a path prefix such as `"/cart"`.
    #[must_use]
    pub fn hits_under(&self, prefix: &str) -> usize {
        lock(&self.state)
            .hits
            .iter()
            .filter(|(route, _)| {
                route
                    .split_once(' ')
                    .is_some_and(|(_, path)| path.starts_with(prefix))
            })
            .map(|(_, count)| count)
            .sum()
    }

    /// Requests seen in total.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        lock(&self.state).hits.values().sum()
    }

    /// Forget all counted requests.
    pub fn reset_hits(&self) {
        lock(&self.state).hits.clear();
    }
}

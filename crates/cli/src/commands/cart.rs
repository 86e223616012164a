//! Cart commands.
//!
//! Every mutation prints the cart the server returned.

use shopfront_client::api::CouponApplication;
use shopfront_client::cart::CartSnapshot;
use shopfront_client::views::CartView;
use shopfront_client::{AppError, Result, Storefront};
use shopfront_core::{CartItemId, ProductId, Quantity};

use super::render;

fn cart_view(
    store: &Storefront,
    snapshot: &CartSnapshot,
    coupon: Option<&CouponApplication>,
) -> Result<String> {
    // Shipping is estimated as if an address will be chosen.
    render(&CartView::new(snapshot, coupon, store.shipping_policy(), true))
}

/// Show the cart loaded at startup.
///
/// # Errors
///
/// Returns an error if the cart cannot be rendered.
pub fn show(store: &Storefront) -> Result<String> {
    if !store.session().is_authenticated() {
        return Ok("Log in to see your cart.".to_string());
    }
    cart_view(store, &store.cart().snapshot(), None)
}

/// Add a product after checking its stock.
///
/// # Errors
///
/// Returns an error for an unknown product, insufficient stock, a missing
/// session, or a refused request.
pub async fn add(
    store: &Storefront,
    product_id: ProductId,
    quantity: Quantity,
) -> Result<String> {
    let product = store
        .catalog()
        .product(product_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} not found")))?;

    let snapshot = store.cart().add_product(&product, quantity).await?;
    cart_view(store, &snapshot, None)
}

/// Set a line's quantity; zero or below removes the line.
///
/// # Errors
///
/// Returns an error for a missing session or a refused request.
pub async fn set(store: &Storefront, item_id: CartItemId, quantity: i64) -> Result<String> {
    let snapshot = store.cart().change_quantity(item_id, quantity).await?;
    cart_view(store, &snapshot, None)
}

/// Add one unit to a line.
///
/// # Errors
///
/// Returns an error for an unknown line, a missing session, or a refused
/// request.
pub async fn increment(store: &Storefront, item_id: CartItemId) -> Result<String> {
    let snapshot = store.cart().increment(item_id).await?;
    cart_view(store, &snapshot, None)
}

/// Take one unit off a line.
///
/// # Errors
///
/// Returns an error for an unknown line, a missing session, or a refused
/// request.
pub async fn decrement(store: &Storefront, item_id: CartItemId) -> Result<String> {
    let snapshot = store.cart().decrement(item_id).await?;
    cart_view(store, &snapshot, None)
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error for a missing session or a refused request.
pub async fn remove(store: &Storefront, item_id: CartItemId) -> Result<String> {
    let snapshot = store.cart().remove(item_id).await?;
    cart_view(store, &snapshot, None)
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error for a missing session or a refused request.
pub async fn clear(store: &Storefront) -> Result<String> {
    let snapshot = store.cart().clear().await?;
    cart_view(store, &snapshot, None)
}

/// Show the cart with a coupon applied.
///
/// # Errors
///
/// Returns an error for an empty cart or a refused code.
pub async fn coupon(store: &Storefront, code: &str) -> Result<String> {
    let application = store.apply_coupon(code).await?;
    let mut output = format!(
        "Coupon {} applied. Use `shop checkout --coupon {}` to redeem it.\n\n",
        application.code, application.code
    );
    output.push_str(&cart_view(store, &store.cart().snapshot(), Some(&application))?);
    Ok(output)
}

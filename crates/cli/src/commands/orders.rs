//! Order history commands.

use shopfront_client::views::{OrderListView, OrderView};
use shopfront_client::{Result, Storefront};
use shopfront_core::OrderId;

use super::render;

/// Order history, newest first.
///
/// # Errors
///
/// Returns an error if the orders cannot be fetched.
pub async fn list(store: &Storefront) -> Result<String> {
    let orders = store.api().list_orders().await?;
    render(&OrderListView::new(&orders))
}

/// One order with its tracking.
///
/// # Errors
///
/// Returns an error if the order cannot be fetched.
pub async fn show(store: &Storefront, id: OrderId) -> Result<String> {
    let order = store.api().get_order(id).await?;
    render(&OrderView::from(&order))
}

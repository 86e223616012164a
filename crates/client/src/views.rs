//! Text views of storefront state.
//!
//! View models hold preformatted strings so templates stay free of logic.
//! Templates live in `templates/` and render as plain text.

use askama::Template;
use rust_decimal::Decimal;

use shopfront_core::{OrderEstimate, Price, ShipmentStatus, ShippingPolicy};

use crate::api::{Address, CartItem, Category, CouponApplication, Order, Product, Shipment};
use crate::cart::CartSnapshot;
use crate::checkout::{PaymentResolution, ResolvedStatus};

fn money(amount: Decimal) -> String {
    Price::inr(amount).to_string()
}

fn shipping_label(amount: Decimal) -> String {
    if amount.is_zero() {
        "Free".to_string()
    } else {
        money(amount)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product card display data.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub category: Option<String>,
    pub stock_label: String,
    pub in_stock: bool,
    pub in_cart: u32,
    /// Whether "+" is allowed; off at the stock bound.
    pub can_increment: bool,
}

impl ProductCard {
    /// Build a card for a product with `in_cart` units already in the cart.
    #[must_use]
    pub fn new(product: &Product, in_cart: u32) -> Self {
        let in_stock = product.in_stock();
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            price: product.unit_price().to_string(),
            category: product.category.as_ref().map(|c| c.name.clone()),
            stock_label: if in_stock {
                format!("{} left", product.stock_quantity)
            } else {
                "Out of Stock".to_string()
            },
            in_stock,
            in_cart,
            can_increment: product.addable(in_cart) > 0,
        }
    }
}

/// Product listing page.
#[derive(Template)]
#[template(path = "products.txt")]
pub struct ProductListView {
    pub products: Vec<ProductCard>,
    pub page: u32,
    pub has_more: bool,
}

impl ProductListView {
    /// Cards for one listing page, annotated with cart quantities.
    #[must_use]
    pub fn new(products: &[Product], cart: &CartSnapshot, page: u32, has_more: bool) -> Self {
        Self {
            products: products
                .iter()
                .map(|p| ProductCard::new(p, cart.quantity_of(p.id)))
                .collect(),
            page: page + 1,
            has_more,
        }
    }
}

/// Product detail page.
#[derive(Template)]
#[template(path = "product.txt")]
pub struct ProductDetailView {
    pub card: ProductCard,
    pub description: String,
    pub image_url: Option<String>,
}

impl ProductDetailView {
    #[must_use]
    pub fn new(product: &Product, cart: &CartSnapshot) -> Self {
        Self {
            card: ProductCard::new(product, cart.quantity_of(product.id)),
            description: product
                .description
                .clone()
                .unwrap_or_else(|| "No description available.".to_string()),
            image_url: product.image_url.clone(),
        }
    }
}

/// Category list.
#[derive(Template)]
#[template(path = "categories.txt")]
pub struct CategoryListView<'a> {
    pub categories: &'a [Category],
}

// =============================================================================
// Cart
// =============================================================================

/// Cart line display data.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    /// Whether "+" is allowed; off at the stock bound.
    pub can_increment: bool,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.as_i64(),
            name: item.product.name.clone(),
            quantity: item.quantity.get(),
            price: item.product.unit_price().to_string(),
            line_price: money(item.line_total()),
            can_increment: item.product.addable(item.quantity.get()) > 0,
        }
    }
}

/// A discount line with the code that produced it.
#[derive(Debug, Clone)]
pub struct DiscountView {
    pub code: String,
    pub amount: String,
}

/// Cart page with summary and shipping estimate.
#[derive(Template)]
#[template(path = "cart.txt")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub discount: Option<DiscountView>,
    pub shipping: String,
    pub total: String,
}

impl CartView {
    /// Build the cart page.
    ///
    /// `coupon` is a server-validated discount; `has_address` decides
    /// whether shipping is charged in the estimate.
    #[must_use]
    pub fn new(
        snapshot: &CartSnapshot,
        coupon: Option<&CouponApplication>,
        policy: &ShippingPolicy,
        has_address: bool,
    ) -> Self {
        let subtotal = snapshot.cart.as_ref().map_or(Decimal::ZERO, |c| c.subtotal());
        let discount = coupon.map_or(Decimal::ZERO, |c| c.discount_amount);
        let estimate = OrderEstimate::new(subtotal, discount, policy, has_address);

        Self {
            items: snapshot.items().iter().map(CartItemView::from).collect(),
            item_count: snapshot.item_count(),
            subtotal: money(estimate.subtotal),
            discount: coupon.map(|c| DiscountView {
                code: c.code.clone(),
                amount: money(estimate.discount),
            }),
            shipping: shipping_label(estimate.shipping),
            total: money(estimate.total),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order line display data.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub name: String,
    pub quantity: u32,
    pub price: String,
}

/// One tracking step and whether the shipment has reached it.
#[derive(Debug, Clone)]
pub struct TrackingStep {
    pub label: &'static str,
    pub reached: bool,
}

/// Shipment tracking display data.
#[derive(Debug, Clone)]
pub struct TrackingView {
    pub status: String,
    pub courier: String,
    pub tracking_id: String,
    pub estimated_delivery: Option<String>,
    pub steps: Vec<TrackingStep>,
}

impl From<&Shipment> for TrackingView {
    fn from(shipment: &Shipment) -> Self {
        let status = shipment.status.unwrap_or_default();
        let reached = status.step();
        Self {
            status: status.label().to_string(),
            courier: shipment
                .courier_name
                .clone()
                .unwrap_or_else(|| "Not assigned".to_string()),
            tracking_id: shipment
                .tracking_id
                .clone()
                .unwrap_or_else(|| "Pending".to_string()),
            estimated_delivery: shipment
                .estimated_delivery
                .map(|at| at.format("%d %b %Y").to_string()),
            steps: ShipmentStatus::STEPS
                .iter()
                .enumerate()
                .map(|(i, step)| TrackingStep {
                    label: step.label(),
                    reached: reached.is_some_and(|r| i <= r),
                })
                .collect(),
        }
    }
}

/// Order detail page.
#[derive(Template)]
#[template(path = "order.txt")]
pub struct OrderView {
    pub id: i64,
    pub status: String,
    pub placed: String,
    pub items: Vec<OrderLineView>,
    pub subtotal: String,
    pub discount: Option<DiscountView>,
    pub shipping: String,
    pub total: String,
    pub tracking: Option<TrackingView>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_i64(),
            status: order.status.label().to_string(),
            placed: order.created_at.format("%d %b %Y, %H:%M").to_string(),
            items: order
                .items
                .iter()
                .map(|item| OrderLineView {
                    name: item
                        .product
                        .as_ref()
                        .map_or_else(|| format!("Product #{}", item.product_id), |p| p.name.clone()),
                    quantity: item.quantity.get(),
                    price: money(item.price_at_purchase),
                })
                .collect(),
            subtotal: money(order.subtotal),
            discount: (order.discount_amount > Decimal::ZERO).then(|| DiscountView {
                code: order.coupon_code.clone().unwrap_or_default(),
                amount: money(order.discount_amount),
            }),
            shipping: shipping_label(order.shipping_cost),
            total: money(order.total_amount),
            tracking: order.shipment.as_ref().map(TrackingView::from),
        }
    }
}

/// Order history row.
#[derive(Debug, Clone)]
pub struct OrderSummaryView {
    pub id: i64,
    pub placed: String,
    pub status: String,
    pub items: usize,
    pub total: String,
}

/// Order history page.
#[derive(Template)]
#[template(path = "orders.txt")]
pub struct OrderListView {
    pub orders: Vec<OrderSummaryView>,
}

impl OrderListView {
    /// Most recent orders first.
    #[must_use]
    pub fn new(orders: &[Order]) -> Self {
        let mut sorted: Vec<&Order> = orders.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self {
            orders: sorted
                .into_iter()
                .map(|order| OrderSummaryView {
                    id: order.id.as_i64(),
                    placed: order.created_at.format("%d %b %Y").to_string(),
                    status: order.status.label().to_string(),
                    items: order.items.len(),
                    total: money(order.total_amount),
                })
                .collect(),
        }
    }
}

/// Payment status page.
#[derive(Template)]
#[template(path = "payment_status.txt")]
pub struct PaymentStatusView {
    pub order_id: i64,
    pub headline: &'static str,
    pub detail: &'static str,
    pub total: String,
}

impl From<&PaymentResolution> for PaymentStatusView {
    fn from(resolution: &PaymentResolution) -> Self {
        let (headline, detail) = match resolution.status {
            ResolvedStatus::Succeeded => (
                "Payment successful",
                "Your order is confirmed and will be shipped soon.",
            ),
            ResolvedStatus::Failed => (
                "Payment failed",
                "No money was taken. You can retry the payment from your orders.",
            ),
            ResolvedStatus::Pending => (
                "Payment not confirmed yet",
                "The store has not confirmed this payment. Check your orders again shortly.",
            ),
        };
        Self {
            order_id: resolution.order.id.as_i64(),
            headline,
            detail,
            total: money(resolution.order.total_amount),
        }
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Saved address list.
#[derive(Template)]
#[template(path = "addresses.txt")]
pub struct AddressListView<'a> {
    pub addresses: &'a [Address],
}

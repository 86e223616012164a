//! Product and category browsing commands.

use shopfront_client::catalog::ProductFilter;
use shopfront_client::views::{CategoryListView, ProductDetailView, ProductListView};
use shopfront_client::{AppError, Result, Storefront};
use shopfront_core::{CategoryId, ProductId};

use super::render;

/// Build a listing filter from command-line options.
pub fn filter(search: Option<String>, category_id: Option<CategoryId>) -> ProductFilter {
    ProductFilter {
        search,
        category_id,
    }
}

/// One listing page; `page` starts at 1.
///
/// # Errors
///
/// Returns an error if the listing cannot be fetched.
pub async fn products(
    store: &Storefront,
    filter: &ProductFilter,
    page: u32,
) -> Result<String> {
    let index = page.saturating_sub(1);
    let products = store.catalog().page(filter, index).await?;
    let page_size = usize::try_from(store.catalog().page_size()).unwrap_or(usize::MAX);
    let has_more = products.len() >= page_size;

    render(&ProductListView::new(
        &products,
        &store.cart().snapshot(),
        index,
        has_more,
    ))
}

/// Every page, accumulated through a feed.
///
/// # Errors
///
/// Returns an error if any page cannot be fetched.
pub async fn all_products(store: &Storefront, filter: ProductFilter) -> Result<String> {
    let mut feed = store.catalog().feed(filter);
    let mut pages = 0;
    while feed.has_more() {
        feed.load_more().await?;
        pages += 1;
    }
    tracing::debug!(pages, products = feed.products().len(), "Loaded full listing");

    render(&ProductListView::new(
        feed.products(),
        &store.cart().snapshot(),
        0,
        false,
    ))
}

/// Product detail.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown product, or an error if the
/// product cannot be fetched.
pub async fn product(store: &Storefront, id: ProductId) -> Result<String> {
    let product = store
        .catalog()
        .product(id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Product {id} not found")))?;

    render(&ProductDetailView::new(&product, &store.cart().snapshot()))
}

/// Category list.
///
/// # Errors
///
/// Returns an error if the categories cannot be fetched.
pub async fn categories(store: &Storefront) -> Result<String> {
    let categories = store.catalog().categories().await?;
    render(&CategoryListView {
        categories: &categories,
    })
}

//! Product listings and catalog caching against the fake API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use shopfront_client::catalog::ProductFilter;
use shopfront_client::session::MemoryTokenStore;
use shopfront_client::Storefront;
use shopfront_integration_tests::FakeApi;

fn with_page_size(api: &FakeApi, page_size: u32) -> Storefront {
    let mut config = api.config();
    config.page_size = page_size;
    Storefront::with_token_store(config, Arc::new(MemoryTokenStore::default())).unwrap()
}

#[tokio::test]
async fn test_feed_pages_until_short_page() {
    let api = FakeApi::start().await;
    for i in 0..7 {
        api.add_product(&format!("Candle {i}"), 100 + i, 5);
    }
    let store = with_page_size(&api, 3);
    let mut feed = store.catalog().feed(ProductFilter::default());

    assert_eq!(feed.load_more().await.unwrap().len(), 3);
    assert_eq!(feed.load_more().await.unwrap().len(), 3);
    assert!(feed.has_more());
    assert_eq!(feed.load_more().await.unwrap().len(), 1);
    assert!(!feed.has_more());

    assert!(feed.load_more().await.unwrap().is_empty());
    assert_eq!(feed.products().len(), 7);
    assert_eq!(api.hits("GET /products/"), 3);
}

#[tokio::test]
async fn test_search_is_passed_through() {
    let api = FakeApi::start().await;
    api.add_product("Brass Lamp", 200, 5);
    api.add_product("Desk Lamp", 300, 5);
    api.add_product("Clay Mug", 80, 5);
    let store = api.storefront();

    let filter = ProductFilter {
        search: Some(" lamp ".to_string()),
        category_id: None,
    };
    let products = store.catalog().page(&filter, 0).await.unwrap();

    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Brass Lamp", "Desk Lamp"]);
}

#[tokio::test]
async fn test_category_filter() {
    let api = FakeApi::start().await;
    api.add_product("Brass Lamp", 200, 5);
    let store = api.storefront();
    let categories = store.catalog().categories().await.unwrap();
    let lighting = categories.first().unwrap();

    let filter = ProductFilter {
        search: None,
        category_id: Some(lighting.id),
    };
    assert_eq!(store.catalog().page(&filter, 0).await.unwrap().len(), 1);

    let filter = ProductFilter {
        search: None,
        category_id: Some(shopfront_core::CategoryId::new(9999)),
    };
    assert!(store.catalog().page(&filter, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_product_is_none() {
    let api = FakeApi::start().await;
    let store = api.storefront();

    let product = store
        .catalog()
        .product(shopfront_core::ProductId::new(4040))
        .await
        .unwrap();

    assert!(product.is_none());
}

#[tokio::test]
async fn test_categories_and_products_are_cached() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 5);
    let store = api.storefront();

    let first = store.catalog().categories().await.unwrap();
    let second = store.catalog().categories().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(api.hits("GET /products/categories"), 1);

    store.catalog().product(lamp).await.unwrap().unwrap();
    store.catalog().product(lamp).await.unwrap().unwrap();
    assert_eq!(api.hits("GET /products/{id}"), 1);

    store.api().invalidate_catalog();
    store.catalog().categories().await.unwrap();
    assert_eq!(api.hits("GET /products/categories"), 2);
}

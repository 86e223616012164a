//! Cart mirroring against the fake API.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use shopfront_client::api::ApiError;
use shopfront_client::cart::{CartError, CartSnapshot};
use shopfront_core::{CartItemId, Quantity};
use shopfront_integration_tests::FakeApi;

fn local_lines(snapshot: &CartSnapshot) -> Vec<(i64, i64)> {
    snapshot
        .items()
        .iter()
        .map(|item| (item.product_id.as_i64(), i64::from(item.quantity.get())))
        .collect()
}

fn only_item(snapshot: &CartSnapshot) -> CartItemId {
    assert_eq!(snapshot.items().len(), 1);
    snapshot.items().first().unwrap().id
}

#[tokio::test]
async fn test_local_cart_tracks_server_through_mutations() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let mug = api.add_product("Clay Mug", 80, 10);
    let store = api.logged_in().await;
    let cart = store.cart();

    let snapshot = cart.add_to_cart(lamp, Quantity::new(2).unwrap()).await.unwrap();
    assert_eq!(local_lines(&snapshot), api.server_cart());

    let snapshot = cart.add_to_cart(mug, Quantity::ONE).await.unwrap();
    assert_eq!(local_lines(&snapshot), api.server_cart());

    let lamp_line = snapshot.cart.as_ref().unwrap().item_for_product(lamp).unwrap().id;
    let snapshot = cart.update_quantity(lamp_line, Quantity::new(5).unwrap()).await.unwrap();
    assert_eq!(local_lines(&snapshot), api.server_cart());

    let snapshot = cart.remove(lamp_line).await.unwrap();
    assert_eq!(local_lines(&snapshot), api.server_cart());
    assert_eq!(snapshot.quantity_of(mug), 1);

    let snapshot = cart.clear().await.unwrap();
    assert!(snapshot.is_empty());
    assert!(api.server_cart().is_empty());
}

#[tokio::test]
async fn test_add_without_session_sends_nothing() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.storefront();

    let err = store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap_err();

    assert!(matches!(err, CartError::AuthenticationRequired));
    assert!(err.requires_login());
    assert_eq!(api.total_hits(), 0);
}

#[tokio::test]
async fn test_decrement_last_unit_removes_line() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.logged_in().await;

    let snapshot = store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap();
    let item = only_item(&snapshot);
    api.reset_hits();

    let snapshot = store.cart().decrement(item).await.unwrap();

    assert!(snapshot.is_empty());
    assert_eq!(api.hits("DELETE /cart/items/{id}"), 1);
    assert_eq!(api.hits("PUT /cart/items/{id}"), 0);
    assert!(api.server_cart().is_empty());
}

#[tokio::test]
async fn test_non_positive_quantity_routes_to_remove() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.logged_in().await;

    let snapshot = store
        .cart()
        .add_to_cart(lamp, Quantity::new(3).unwrap())
        .await
        .unwrap();
    let item = only_item(&snapshot);
    api.reset_hits();

    let snapshot = store.cart().change_quantity(item, -2).await.unwrap();

    assert!(snapshot.is_empty());
    assert_eq!(api.hits("PUT /cart/items/{id}"), 0);
    assert_eq!(api.hits("DELETE /cart/items/{id}"), 1);
}

#[tokio::test]
async fn test_increment_and_decrement_update_in_place() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.logged_in().await;

    let snapshot = store
        .cart()
        .add_to_cart(lamp, Quantity::new(2).unwrap())
        .await
        .unwrap();
    let item = only_item(&snapshot);

    let snapshot = store.cart().increment(item).await.unwrap();
    assert_eq!(snapshot.quantity_of(lamp), 3);
    let snapshot = store.cart().decrement(item).await.unwrap();
    assert_eq!(snapshot.quantity_of(lamp), 2);
    assert_eq!(api.server_cart(), vec![(lamp.as_i64(), 2)]);
}

#[tokio::test]
async fn test_removal_with_cart_body_replaces_snapshot() {
    let api = FakeApi::start().await;
    api.set_remove_returns_cart(true);
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let mug = api.add_product("Clay Mug", 80, 10);
    let store = api.logged_in().await;

    store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap();
    let snapshot = store.cart().add_to_cart(mug, Quantity::ONE).await.unwrap();
    let lamp_line = snapshot.cart.as_ref().unwrap().item_for_product(lamp).unwrap().id;
    api.reset_hits();

    let snapshot = store.cart().remove(lamp_line).await.unwrap();

    assert_eq!(local_lines(&snapshot), vec![(mug.as_i64(), 1)]);
    assert_eq!(api.hits("GET /cart/"), 0);
}

#[tokio::test]
async fn test_each_mutation_publishes_one_snapshot() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.logged_in().await;
    let mut updates = store.cart().subscribe();
    let start = updates.borrow_and_update().revision;

    let snapshot = store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap();
    assert_eq!(snapshot.revision, start + 1);
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().revision, start + 1);

    let item = only_item(&snapshot);
    let snapshot = store.cart().increment(item).await.unwrap();
    assert_eq!(snapshot.revision, start + 2);
}

#[tokio::test]
async fn test_concurrent_adds_are_serialized() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let mug = api.add_product("Clay Mug", 80, 10);
    let store = api.logged_in().await;
    let start = store.cart().snapshot().revision;

    let (first, second) = tokio::join!(
        store.cart().add_to_cart(lamp, Quantity::ONE),
        store.cart().add_to_cart(mug, Quantity::ONE),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let mut revisions = [first.revision, second.revision];
    revisions.sort_unstable();
    assert_eq!(revisions, [start + 1, start + 2]);

    let last = store.cart().snapshot();
    assert_eq!(last.items().len(), 2);
    assert_eq!(local_lines(&last), api.server_cart());
}

#[tokio::test]
async fn test_stock_bound_is_checked_locally() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 2);
    let store = api.logged_in().await;
    let product = store.catalog().product(lamp).await.unwrap().unwrap();
    store
        .cart()
        .add_product(&product, Quantity::new(2).unwrap())
        .await
        .unwrap();
    api.reset_hits();

    let err = store
        .cart()
        .add_product(&product, Quantity::ONE)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::OutOfStock { available: 0, .. }));
    assert_eq!(api.total_hits(), 0);
}

#[tokio::test]
async fn test_server_rejection_leaves_snapshot() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 3);
    let store = api.logged_in().await;
    let before = store
        .cart()
        .add_to_cart(lamp, Quantity::ONE)
        .await
        .unwrap();
    let item = only_item(&before);

    let err = store
        .cart()
        .update_quantity(item, Quantity::new(9).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CartError::Api(ApiError::Rejected { status: 400, .. })
    ));
    assert_eq!(store.cart().snapshot(), before);
}

#[tokio::test]
async fn test_logout_clears_cart_without_cart_calls() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let mug = api.add_product("Clay Mug", 80, 10);
    let vase = api.add_product("Glass Vase", 150, 10);
    let store = api.logged_in().await;
    for product in [lamp, mug, vase] {
        store.cart().add_to_cart(product, Quantity::ONE).await.unwrap();
    }
    assert_eq!(store.cart().snapshot().items().len(), 3);
    api.reset_hits();

    store.logout().await.unwrap();

    assert!(store.cart().snapshot().cart.is_none());
    assert!(!store.session().is_authenticated());
    assert_eq!(api.hits_under("/cart"), 0);
    assert_eq!(api.total_hits(), 0);
    // The server still has the cart for the next login.
    assert_eq!(api.server_cart().len(), 3);
}

#[tokio::test]
async fn test_add_in_flight_during_logout_does_not_refill_cart() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.logged_in().await;
    api.set_add_delay(Duration::from_millis(300));

    let adding = tokio::spawn({
        let store = store.clone();
        async move { store.cart().add_to_cart(lamp, Quantity::ONE).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.logout().await.unwrap();
    let err = adding.await.unwrap().unwrap_err();

    assert!(matches!(err, CartError::SessionEnded));
    assert!(store.session().user().is_none());
    assert!(store.cart().snapshot().cart.is_none());
    // The server took the add before it saw the logout.
    assert_eq!(api.server_cart(), vec![(lamp.as_i64(), 1)]);
}

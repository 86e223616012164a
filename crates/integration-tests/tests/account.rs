//! Order history and saved addresses against the fake API.

#![allow(clippy::unwrap_used)]

use askama::Template;

use shopfront_client::api::{ApiError, CheckoutRequest, NewAddress};
use shopfront_client::views::{AddressListView, OrderListView, OrderView};
use shopfront_core::{OrderStatus, Quantity};
use shopfront_integration_tests::FakeApi;

fn new_address(line: &str) -> NewAddress {
    NewAddress {
        full_name: "Asha Shopper".to_string(),
        phone_number: "9800000000".to_string(),
        start_line: line.to_string(),
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        zip_code: "411001".to_string(),
        country: "India".to_string(),
        is_default: false,
    }
}

#[tokio::test]
async fn test_addresses_round_trip() {
    let api = FakeApi::start().await;
    let store = api.logged_in().await;

    let home = store.api().create_address(&new_address("1 FC Road")).await.unwrap();
    let work = store.api().create_address(&new_address("9 JM Road")).await.unwrap();
    assert_eq!(store.api().list_addresses().await.unwrap().len(), 2);

    store.api().delete_address(home.id).await.unwrap();
    let left = store.api().list_addresses().await.unwrap();
    assert_eq!(left, vec![work]);

    let rendered = AddressListView { addresses: &left }.render().unwrap();
    assert!(rendered.contains("9 JM Road, Pune, Maharashtra 411001, India"));

    let err = store.api().delete_address(home.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_order_history_newest_first() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let store = api.logged_in().await;

    let mut placed = Vec::new();
    for _ in 0..2 {
        store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap();
        let order = store.place_order(&CheckoutRequest::default()).await.unwrap();
        placed.push(order.id);
    }

    let orders = store.api().list_orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.status == OrderStatus::Pending));

    let view = OrderListView::new(&orders);
    assert_eq!(view.orders.first().unwrap().id, placed[1].as_i64());
    let rendered = view.render().unwrap();
    assert!(rendered.contains(&format!("Order #{}", placed[0])));
}

#[tokio::test]
async fn test_order_detail_shows_free_shipping_and_tracking() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 600, 10);
    let store = api.logged_in().await;
    store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap();
    let address = store.api().create_address(&new_address("1 FC Road")).await.unwrap();
    let order = store
        .place_order(&CheckoutRequest {
            shipping_address_id: Some(address.id),
            coupon_code: None,
        })
        .await
        .unwrap();

    let rendered = OrderView::from(&order).render().unwrap();
    assert!(rendered.contains("Shipping  Free"));
    assert!(!rendered.contains("Discount"));
    assert!(!rendered.contains("Courier"));

    let mut checkout = match store.checkout(Some(order.id)).await.unwrap() {
        shopfront_client::checkout::CheckoutEntry::Ready(checkout) => checkout,
        shopfront_client::checkout::CheckoutEntry::RedirectToCart => unreachable!(),
    };
    checkout.initiate_payment().await.unwrap();
    checkout
        .complete_payment(&shopfront_client::checkout::MockGateway::Approve)
        .await
        .unwrap();

    let paid = store.api().get_order(order.id).await.unwrap();
    let rendered = OrderView::from(&paid).render().unwrap();
    assert_eq!(paid.status, OrderStatus::Confirmed);
    assert!(rendered.contains(&format!("Order #{}  Confirmed", order.id)));
    assert!(rendered.contains("Courier: Delhivery"));
    assert!(rendered.contains("[x] Ready to ship"));
}

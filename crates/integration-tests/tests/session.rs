//! Login, registration, restore and logout against the fake API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::SecretString;

use shopfront_client::api::Registration;
use shopfront_client::session::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
use shopfront_client::AppError;
use shopfront_core::{Email, Quantity};
use shopfront_integration_tests::{FakeApi, SHOPPER_EMAIL, SHOPPER_PASSWORD};

fn shopper() -> Email {
    Email::parse(SHOPPER_EMAIL).unwrap()
}

#[tokio::test]
async fn test_login_persists_token_and_loads_cart() {
    let api = FakeApi::start().await;
    let tokens = Arc::new(MemoryTokenStore::default());
    let store = api.storefront_with_tokens(tokens.clone());

    let user = store
        .login(&shopper(), &SecretString::from(SHOPPER_PASSWORD))
        .await
        .unwrap();

    assert_eq!(user.email.as_str(), SHOPPER_EMAIL);
    assert!(tokens.has_token());
    assert_eq!(store.session().user(), Some(user));
    // No cart yet: the 404 is an empty cart, not an error.
    assert_eq!(api.hits("GET /cart/"), 1);
    assert!(store.cart().snapshot().cart.is_none());
}

#[tokio::test]
async fn test_wrong_password_reports_server_detail() {
    let api = FakeApi::start().await;
    let tokens = Arc::new(MemoryTokenStore::default());
    let store = api.storefront_with_tokens(tokens.clone());

    let err = store
        .login(&shopper(), &SecretString::from("wrong"))
        .await
        .unwrap_err();

    let AppError::Auth(failure) = &err else {
        panic!("expected an auth failure, got {err:?}");
    };
    assert_eq!(failure.message, "Incorrect email or password");
    assert_eq!(err.user_message(), "Incorrect email or password");
    assert!(!err.is_unexpected());
    assert!(!tokens.has_token());
    assert!(!store.session().is_authenticated());
    assert_eq!(api.hits("GET /users/me"), 0);
}

/// Keeps tokens in memory but refuses to forget them.
#[derive(Default)]
struct StickyTokenStore {
    inner: MemoryTokenStore,
    clear_attempts: AtomicUsize,
}

impl TokenStore for StickyTokenStore {
    fn token(&self) -> Option<SecretString> {
        self.inner.token()
    }

    fn persist(&self, token: SecretString) -> Result<(), TokenStoreError> {
        self.inner.persist(token)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.clear_attempts.fetch_add(1, Ordering::SeqCst);
        Err(TokenStoreError::Io(std::io::Error::other("read-only token file")))
    }
}

#[tokio::test]
async fn test_profile_failure_after_login_survives_token_clear_error() {
    let api = FakeApi::start().await;
    let tokens = Arc::new(StickyTokenStore::default());
    let store = api.storefront_with_tokens(tokens.clone());
    api.revoke_tokens();

    let err = store
        .login(&shopper(), &SecretString::from(SHOPPER_PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Auth(_)));
    assert_eq!(tokens.clear_attempts.load(Ordering::SeqCst), 1);
    assert!(!store.session().is_authenticated());
    assert_eq!(api.hits("GET /users/me"), 1);
}

#[tokio::test]
async fn test_stale_token_on_startup_logs_out() {
    let api = FakeApi::start().await;
    let tokens = Arc::new(MemoryTokenStore::with_token(api.shopper_token()));
    api.revoke_tokens();
    let store = api.storefront_with_tokens(tokens.clone());

    let user = store.start().await.unwrap();

    assert!(user.is_none());
    assert!(!tokens.has_token());
    assert!(!store.session().is_authenticated());
    assert_eq!(api.hits("GET /users/me"), 1);
    assert_eq!(api.hits_under("/cart"), 0);
}

#[tokio::test]
async fn test_startup_without_token_makes_no_calls() {
    let api = FakeApi::start().await;
    let store = api.storefront();

    assert!(store.start().await.unwrap().is_none());
    assert_eq!(api.total_hits(), 0);
}

#[tokio::test]
async fn test_token_file_survives_restart() {
    let api = FakeApi::start().await;
    let lamp = api.add_product("Brass Lamp", 200, 10);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    {
        let tokens = Arc::new(FileTokenStore::open(&path).unwrap());
        let store = api.storefront_with_tokens(tokens);
        store
            .login(&shopper(), &SecretString::from(SHOPPER_PASSWORD))
            .await
            .unwrap();
        store.cart().add_to_cart(lamp, Quantity::ONE).await.unwrap();
    }

    let tokens = Arc::new(FileTokenStore::open(&path).unwrap());
    let store = api.storefront_with_tokens(tokens);
    let user = store.start().await.unwrap().unwrap();

    assert_eq!(user.email.as_str(), SHOPPER_EMAIL);
    assert_eq!(store.cart().snapshot().quantity_of(lamp), 1);
}

#[tokio::test]
async fn test_logout_makes_no_network_call() {
    let api = FakeApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let tokens = Arc::new(FileTokenStore::open(&path).unwrap());
    let store = api.storefront_with_tokens(tokens.clone());
    store
        .login(&shopper(), &SecretString::from(SHOPPER_PASSWORD))
        .await
        .unwrap();
    api.reset_hits();

    store.logout().await.unwrap();

    assert_eq!(api.total_hits(), 0);
    assert!(!tokens.has_token());
    assert!(!path.exists());
    assert!(store.session().user().is_none());
}

#[tokio::test]
async fn test_register_does_not_log_in() {
    let api = FakeApi::start().await;
    let store = api.storefront();
    let registration = Registration {
        email: Email::parse("new@example.com").unwrap(),
        password: SecretString::from("s3cret-pass"),
        full_name: "New Shopper".to_string(),
    };

    let user = store.session().register(&registration).await.unwrap();

    assert_eq!(user.display_name(), "New Shopper");
    assert!(!store.session().is_authenticated());

    let duplicate = store.session().register(&registration).await.unwrap_err();
    assert_eq!(duplicate.message, "Email already registered");

    let logged_in = store
        .login(&registration.email, &SecretString::from("s3cret-pass"))
        .await
        .unwrap();
    assert_eq!(logged_in.id, user.id);
}

#[tokio::test]
async fn test_session_changes_are_published() {
    let api = FakeApi::start().await;
    let store = api.storefront();
    let mut users = store.session().subscribe();
    assert!(users.borrow_and_update().is_none());

    store
        .login(&shopper(), &SecretString::from(SHOPPER_PASSWORD))
        .await
        .unwrap();
    assert!(users.has_changed().unwrap());
    assert!(users.borrow_and_update().is_some());

    store.logout().await.unwrap();
    assert!(users.borrow_and_update().is_none());
}

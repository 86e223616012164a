//! Unified error handling with Sentry integration.
//!
//! Every layer has its own error enum. At the UI boundary they fold into
//! [`AppError`], which decides what gets reported to Sentry and what the user
//! is told. Internal details never reach the user.

use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::session::{AuthFailure, SessionError};

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// API request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session bookkeeping failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Login or registration was refused.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthFailure),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error indicates a bug or outage worth reporting.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        match self {
            Self::Config(_) | Self::Auth(_) | Self::BadRequest(_) => false,
            Self::Internal(_) => true,
            Self::Api(e) => e.is_unexpected(),
            Self::Session(e) => e.is_unexpected(),
            Self::Cart(e) => e.api().is_some_and(ApiError::is_unexpected),
            Self::Checkout(e) => e.api().is_some_and(ApiError::is_unexpected),
        }
    }

    /// Whether the user has to log in before retrying.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Api(ApiError::Unauthorized(_)) => true,
            Self::Cart(e) => e.requires_login(),
            Self::Checkout(e) => e.api().is_some_and(|e| matches!(e, ApiError::Unauthorized(_))),
            _ => false,
        }
    }

    /// Capture unexpected errors to Sentry and log them.
    ///
    /// Returns `self` so call sites can report on the way out.
    #[must_use]
    pub fn report(self) -> Self {
        if self.is_unexpected() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::debug!(error = %self, "Storefront error");
        }
        self
    }

    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.to_string(),
            Self::Api(e) => api_message(e),
            Self::Session(e) => match e {
                SessionError::Api(e) => api_message(e),
                SessionError::TokenStore(_) => "Could not save your session".to_string(),
            },
            Self::Auth(failure) => failure.message.clone(),
            Self::Cart(e) => match e {
                CartError::AuthenticationRequired => {
                    "Please log in to add items to your cart".to_string()
                }
                CartError::Api(e) => api_message(e),
                other => other.to_string(),
            },
            Self::Checkout(e) => match e {
                CheckoutError::Api(e) => api_message(e),
                CheckoutError::Cart(CartError::Api(e)) => api_message(e),
                other => other.to_string(),
            },
            Self::BadRequest(message) => message.clone(),
            Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Don't expose transport or parse details to the user.
fn api_message(error: &ApiError) -> String {
    match error {
        ApiError::Unauthorized(_) => "Please log in to continue".to_string(),
        ApiError::Forbidden(message)
        | ApiError::NotFound(message)
        | ApiError::Rejected { message, .. } => message.clone(),
        ApiError::Http(_) => {
            "Could not reach the store. Check your connection and try again.".to_string()
        }
        ApiError::Server { .. } | ApiError::Parse(_) | ApiError::Url(_) => {
            "The store is having trouble right now. Please try again later.".to_string()
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

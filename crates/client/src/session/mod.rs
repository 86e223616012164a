//! Session state: who is logged in.
//!
//! The session is derived from a persisted bearer token. [`SessionStore`]
//! publishes the current user on a `watch` channel; the user is present only
//! after the profile fetch succeeds.
//!
//! Login and registration never fail with an error that escapes to the UI.
//! They return an [`AuthFailure`] carrying the message to show, taken from
//! the server's `detail` field when there is one.

mod token;

use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use shopfront_core::Email;

use crate::api::{ApiClient, ApiError, Registration, User};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};

pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};

/// Shown when a login fails without a server explanation.
pub const LOGIN_FAILED: &str = "Login failed";
/// Shown when a registration fails without a server explanation.
pub const REGISTRATION_FAILED: &str = "Registration failed";

/// Errors from session bookkeeping outside login/registration.
#[derive(Debug, Error)]
pub enum SessionError {
    /// API request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Token could not be saved or removed.
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl SessionError {
    /// Whether this failure is worth reporting.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        match self {
            Self::Api(e) => e.is_unexpected(),
            Self::TokenStore(_) => true,
        }
    }
}

/// A refused login or registration.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthFailure {
    /// Message to show the user.
    pub message: String,
    /// What went wrong underneath.
    #[source]
    pub cause: SessionError,
}

impl AuthFailure {
    fn new(cause: impl Into<SessionError>, fallback: &str) -> Self {
        let cause = cause.into();
        let message = match &cause {
            SessionError::Api(e) => e.detail().unwrap_or(fallback).to_string(),
            SessionError::TokenStore(_) => fallback.to_string(),
        };
        Self { message, cause }
    }
}

/// Authenticated-user context.
pub struct SessionStore {
    api: ApiClient,
    user: watch::Sender<Option<User>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("user", &*self.user.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a logged-out session store.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (user, _) = watch::channel(None);
        Self { api, user }
    }

    /// The current user, if logged in.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    /// Whether a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.borrow().is_some()
    }

    /// Subscribe to user changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    fn publish(&self, user: Option<User>) {
        match &user {
            Some(user) => set_sentry_user(&user.id, Some(user.email.as_str())),
            None => clear_sentry_user(),
        }
        self.user.send_replace(user);
    }

    /// Re-establish the session from a persisted token.
    ///
    /// A `401` on the profile fetch means the token is stale: it is cleared
    /// and the session ends up logged out. Other failures leave the token in
    /// place for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile fetch fails for a reason other than a
    /// stale token.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<User>, SessionError> {
        if !self.api.tokens().has_token() {
            return Ok(None);
        }

        match self.api.current_user().await {
            Ok(user) => {
                info!(user_id = %user.id, "Session restored");
                self.publish(Some(user.clone()));
                Ok(Some(user))
            }
            Err(ApiError::Unauthorized(_)) => {
                warn!("Saved token rejected, logging out");
                self.logout()?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Log in with email and password.
    ///
    /// On success the token is persisted and the profile is fetched and
    /// published.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthFailure`] with a user-facing message.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<User, AuthFailure> {
        let token = self
            .api
            .login(email, password)
            .await
            .map_err(|e| AuthFailure::new(e, LOGIN_FAILED))?;

        self.api
            .tokens()
            .persist(SecretString::from(token.access_token))
            .map_err(|e| AuthFailure::new(e, LOGIN_FAILED))?;

        let user = match self.api.current_user().await {
            Ok(user) => user,
            Err(e) => {
                // A token without a profile is not a session.
                if let Err(clear_err) = self.api.tokens().clear() {
                    warn!(error = %clear_err, "Failed to discard token after profile fetch failed");
                }
                return Err(AuthFailure::new(e, LOGIN_FAILED));
            }
        };

        info!(user_id = %user.id, "Logged in");
        add_breadcrumb("auth", "Logged in", None);
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthFailure`] with a user-facing message.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthFailure> {
        let user = self
            .api
            .register(registration)
            .await
            .map_err(|e| AuthFailure::new(e, REGISTRATION_FAILED))?;

        info!(user_id = %user.id, "Registered");
        add_breadcrumb("auth", "Registered", None);
        Ok(user)
    }

    /// Forget the token and the user. Makes no network call.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted token cannot be removed; the
    /// in-memory user is cleared regardless.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), SessionError> {
        let cleared = self.api.tokens().clear();
        self.publish(None);
        add_breadcrumb("auth", "Logged out", None);
        cleared.map_err(Into::into)
    }
}

//! Login, registration and session commands.

use std::io::BufRead;

use secrecy::SecretString;

use shopfront_client::api::Registration;
use shopfront_client::{AppError, Result, Storefront};
use shopfront_core::Email;

/// Use the given password or read one line from stdin.
fn password(given: Option<String>) -> Result<SecretString> {
    let password = match given {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| AppError::Internal(format!("failed to read password: {e}")))?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        return Err(AppError::BadRequest("Password is required".to_string()));
    }
    Ok(SecretString::from(password))
}

/// Log in and load the cart.
///
/// # Errors
///
/// Returns the server's refusal message when the login fails.
pub async fn login(
    store: &Storefront,
    email: &Email,
    given: Option<String>,
) -> Result<String> {
    let password = password(given)?;
    let user = store.login(email, &password).await?;
    let items = store.cart().snapshot().item_count();
    Ok(format!(
        "Welcome, {}! Your cart has {items} item(s).",
        user.display_name()
    ))
}

/// Create an account.
///
/// # Errors
///
/// Returns the server's refusal message when registration fails.
pub async fn register(
    store: &Storefront,
    email: Email,
    full_name: String,
    given: Option<String>,
) -> Result<String> {
    let registration = Registration {
        email,
        password: password(given)?,
        full_name,
    };
    let user = store.session().register(&registration).await?;
    Ok(format!(
        "Account created for {}. Log in with `shop login -e {}`.",
        user.display_name(),
        user.email
    ))
}

/// Forget the saved session.
///
/// # Errors
///
/// Returns an error if the token file cannot be removed.
pub async fn logout(store: &Storefront) -> Result<String> {
    store.logout().await?;
    Ok("Logged out.".to_string())
}

/// Show the restored user.
#[allow(clippy::unnecessary_wraps)]
pub fn whoami(store: &Storefront) -> Result<String> {
    Ok(store.session().user().map_or_else(
        || "Not logged in.".to_string(),
        |user| format!("{} <{}>", user.display_name(), user.email),
    ))
}

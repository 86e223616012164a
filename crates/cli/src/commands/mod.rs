//! Command implementations.
//!
//! Each command returns the text to print; `main` owns stdout.

pub mod address;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

use askama::Template;

use shopfront_client::{AppError, Result};

/// Render a view to text.
fn render(view: &impl Template) -> Result<String> {
    view.render()
        .map_err(|e| AppError::Internal(format!("template rendering failed: {e}")))
}

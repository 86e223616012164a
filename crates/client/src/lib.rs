//! Shopfront client library.
//!
//! Everything a storefront front end needs, without the front end:
//! - [`api`] - typed REST client for the storefront API
//! - [`session`] - token persistence and the logged-in user
//! - [`cart`] - client-side mirror of the server cart
//! - [`catalog`] - paginated product listings and categories
//! - [`checkout`] - order placement and the payment sequence
//! - [`views`] - text views rendered with askama
//!
//! [`Storefront`] ties these together and is what callers usually hold.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod session;
pub mod storefront;
pub mod views;

pub use config::ClientConfig;
pub use error::{AppError, Result};
pub use storefront::Storefront;

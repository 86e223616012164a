//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `client` - REST client, session/cart stores and checkout sequencing
//! - `cli` - Command-line storefront built on the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no HTTP
//! clients, no persistence. Anything that talks to the storefront API lives in
//! the client crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, quantities, emails, statuses and the
//!   pre-checkout order estimate

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

//! Cache types for catalog responses.

use std::time::{Duration, Instant};

use moka::Expiry;

use shopfront_core::ProductId;

use super::types::{Category, Product};

/// Products change stock often, so they expire well before categories.
pub const PRODUCT_TTL: Duration = Duration::from_secs(300);

/// Cache key for catalog lookups.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories,
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<Category>),
    Product(Box<Product>),
}

/// Per-entry expiry: categories live for the configured TTL, products for
/// [`PRODUCT_TTL`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogExpiry {
    pub category_ttl: Duration,
}

impl Expiry<CacheKey, CacheValue> for CatalogExpiry {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        _value: &CacheValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        match key {
            CacheKey::Categories => Some(self.category_ttl),
            CacheKey::Product(_) => Some(PRODUCT_TTL),
        }
    }
}

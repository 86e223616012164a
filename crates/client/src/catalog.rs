//! Product catalog browsing.
//!
//! Listings use offset pagination: page `n` asks for `skip = n * limit`. A
//! page shorter than `limit` is the last one. [`ProductFeed`] accumulates
//! pages for "load more" style browsing and never appends a product it has
//! already seen.

use std::collections::HashSet;

use tracing::{debug, instrument};

use shopfront_core::{CategoryId, ProductId};

use crate::api::{ApiClient, ApiError, Category, Product, ProductQuery};

/// Listing filters passed through to the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl ProductFilter {
    fn query(&self, page: u32, page_size: u32) -> ProductQuery {
        ProductQuery {
            skip: page.saturating_mul(page_size),
            limit: page_size,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            category_id: self.category_id,
        }
    }
}

/// Read-only access to products and categories.
#[derive(Debug, Clone)]
pub struct Catalog {
    api: ApiClient,
    page_size: u32,
}

impl Catalog {
    /// Create a catalog that lists `page_size` products per page.
    #[must_use]
    pub fn new(api: ApiClient, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    /// Products per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch a single page (zero-based).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn page(&self, filter: &ProductFilter, page: u32) -> Result<Vec<Product>, ApiError> {
        self.api
            .list_products(&filter.query(page, self.page_size))
            .await
    }

    /// Start an accumulating feed.
    #[must_use]
    pub fn feed(&self, filter: ProductFilter) -> ProductFeed {
        ProductFeed::new(self.clone(), filter)
    }

    /// Look up a product. Unknown products are `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails for any other reason.
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, ApiError> {
        match self.api.get_product(id).await {
            Ok(product) => Ok(Some(product)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All categories (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.api.list_categories().await
    }
}

/// "Load more" product listing.
#[derive(Debug)]
pub struct ProductFeed {
    catalog: Catalog,
    filter: ProductFilter,
    next_page: u32,
    products: Vec<Product>,
    seen: HashSet<ProductId>,
    exhausted: bool,
}

impl ProductFeed {
    fn new(catalog: Catalog, filter: ProductFilter) -> Self {
        Self {
            catalog,
            filter,
            next_page: 0,
            products: Vec::new(),
            seen: HashSet::new(),
            exhausted: false,
        }
    }

    /// Everything loaded so far, in listing order.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Whether another page may exist.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        !self.exhausted
    }

    /// The active filter.
    #[must_use]
    pub const fn filter(&self) -> &ProductFilter {
        &self.filter
    }

    /// Start over with a different filter.
    pub fn reset(&mut self, filter: ProductFilter) {
        self.filter = filter;
        self.next_page = 0;
        self.products.clear();
        self.seen.clear();
        self.exhausted = false;
    }

    /// Load the next page and return only the newly added products.
    ///
    /// Once the feed is exhausted this returns an empty slice without a
    /// request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails; the feed is unchanged.
    #[instrument(skip(self), fields(page = self.next_page))]
    pub async fn load_more(&mut self) -> Result<&[Product], ApiError> {
        if self.exhausted {
            return Ok(&[]);
        }

        let page = self.catalog.page(&self.filter, self.next_page).await?;
        let start = self.products.len();
        self.absorb(page);
        Ok(self.products.get(start..).unwrap_or_default())
    }

    fn absorb(&mut self, page: Vec<Product>) {
        let page_size = self.catalog.page_size;
        let received = page.len();
        if received < usize::try_from(page_size).unwrap_or(usize::MAX) {
            self.exhausted = true;
        }
        self.next_page += 1;

        let before = self.products.len();
        for product in page {
            if self.seen.insert(product.id) {
                self.products.push(product);
            }
        }
        debug!(
            received,
            added = self.products.len() - before,
            exhausted = self.exhausted,
            "Absorbed product page"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::session::MemoryTokenStore;

    fn catalog(page_size: u32) -> Catalog {
        let config = ClientConfig::new(url::Url::parse("http://127.0.0.1:9/api/v1").unwrap());
        let api = ApiClient::new(&config, Arc::new(MemoryTokenStore::default())).unwrap();
        Catalog::new(api, page_size)
    }

    fn products(ids: &[i64]) -> Vec<Product> {
        ids.iter()
            .map(|id| {
                serde_json::from_value(serde_json::json!({
                    "id": id,
                    "name": format!("Product {id}"),
                    "price": 100.0,
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_query_offsets() {
        let filter = ProductFilter {
            search: Some("  lamp ".to_string()),
            category_id: None,
        };
        let query = filter.query(2, 8);
        assert_eq!(query.skip, 16);
        assert_eq!(query.limit, 8);
        assert_eq!(query.search.as_deref(), Some("lamp"));
    }

    #[test]
    fn test_blank_search_is_dropped() {
        let filter = ProductFilter {
            search: Some("   ".to_string()),
            category_id: Some(CategoryId::new(3)),
        };
        let query = filter.query(0, 8);
        assert!(query.search.is_none());
        assert_eq!(query.category_id, Some(CategoryId::new(3)));
    }

    #[test]
    fn test_short_page_ends_feed() {
        let mut feed = catalog(3).feed(ProductFilter::default());
        feed.absorb(products(&[1, 2, 3]));
        assert!(feed.has_more());
        feed.absorb(products(&[4]));
        assert!(!feed.has_more());
        assert_eq!(feed.products().len(), 4);
    }

    #[test]
    fn test_duplicates_are_not_appended() {
        let mut feed = catalog(3).feed(ProductFilter::default());
        feed.absorb(products(&[1, 2, 3]));
        feed.absorb(products(&[3, 4, 5]));
        let ids: Vec<i64> = feed.products().iter().map(|p| p.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_exhausted_feed_makes_no_request() {
        let mut feed = catalog(3).feed(ProductFilter::default());
        feed.absorb(Vec::new());
        // The base URL is unroutable; a request would fail.
        assert!(feed.load_more().await.unwrap().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut feed = catalog(2).feed(ProductFilter::default());
        feed.absorb(products(&[1]));
        feed.reset(ProductFilter {
            search: Some("mug".to_string()),
            category_id: None,
        });
        assert!(feed.has_more());
        assert!(feed.products().is_empty());
        assert_eq!(feed.filter().search.as_deref(), Some("mug"));
    }
}

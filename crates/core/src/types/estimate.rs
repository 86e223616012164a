//! Pre-checkout order estimate.
//!
//! The server computes the authoritative totals when it creates the order.
//! Before that, the cart view shows an estimate built with the same rules the
//! server applies at checkout: shipping is charged on the pre-discount
//! subtotal, only when a shipping address is chosen, and the discount never
//! exceeds the subtotal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quantity::Quantity;

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Subtotals at or above this ship for free.
    pub free_threshold: Decimal,
    /// Charge applied below the threshold.
    pub flat_rate: Decimal,
}

impl ShippingPolicy {
    /// Shipping cost for a subtotal. Without an address nothing is charged.
    #[must_use]
    pub fn cost(&self, subtotal: Decimal, has_address: bool) -> Decimal {
        if has_address && subtotal < self.free_threshold {
            self.flat_rate
        } else {
            Decimal::ZERO
        }
    }

    /// Whether a subtotal qualifies for free shipping.
    #[must_use]
    pub fn is_free(&self, subtotal: Decimal) -> bool {
        subtotal >= self.free_threshold
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_threshold: Decimal::from(500),
            flat_rate: Decimal::from(50),
        }
    }
}

/// Display-only totals for a cart that has not been checked out yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEstimate {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderEstimate {
    /// Build an estimate from a subtotal and an optional coupon discount.
    ///
    /// ```
    /// use rust_decimal::Decimal;
    /// use shopfront_core::{OrderEstimate, ShippingPolicy};
    ///
    /// let estimate = OrderEstimate::new(
    ///     Decimal::from(400),
    ///     Decimal::from(50),
    ///     &ShippingPolicy::default(),
    ///     true,
    /// );
    /// assert_eq!(estimate.total, Decimal::from(400));
    /// ```
    #[must_use]
    pub fn new(
        subtotal: Decimal,
        discount: Decimal,
        policy: &ShippingPolicy,
        has_address: bool,
    ) -> Self {
        let discount = discount.clamp(Decimal::ZERO, subtotal.max(Decimal::ZERO));
        let shipping = policy.cost(subtotal, has_address);
        Self {
            subtotal,
            discount,
            shipping,
            total: subtotal - discount + shipping,
        }
    }

    /// Sum `unit_price × quantity` over cart lines.
    pub fn subtotal_of<I>(lines: I) -> Decimal
    where
        I: IntoIterator<Item = (Decimal, Quantity)>,
    {
        lines
            .into_iter()
            .map(|(price, quantity)| price * Decimal::from(quantity.get()))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_and_shipping_fold_into_total() {
        let policy = ShippingPolicy::default();
        let estimate = OrderEstimate::new(Decimal::from(300), Decimal::from(50), &policy, true);
        assert_eq!(estimate.shipping, Decimal::from(50));
        assert_eq!(estimate.total, Decimal::from(300));
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let policy = ShippingPolicy::default();
        let estimate = OrderEstimate::new(Decimal::from(500), Decimal::ZERO, &policy, true);
        assert_eq!(estimate.shipping, Decimal::ZERO);
        assert!(policy.is_free(Decimal::from(500)));
    }

    #[test]
    fn test_no_shipping_without_address() {
        let policy = ShippingPolicy::default();
        let estimate = OrderEstimate::new(Decimal::from(120), Decimal::ZERO, &policy, false);
        assert_eq!(estimate.total, Decimal::from(120));
    }

    #[test]
    fn test_discount_is_capped_at_subtotal() {
        let policy = ShippingPolicy::default();
        let estimate = OrderEstimate::new(Decimal::from(30), Decimal::from(50), &policy, false);
        assert_eq!(estimate.discount, Decimal::from(30));
        assert_eq!(estimate.total, Decimal::ZERO);
    }

    #[test]
    fn test_subtotal_of_lines() {
        let lines = [
            (Decimal::from(200), Quantity::ONE),
            (Decimal::new(1250, 1), Quantity::new(2).unwrap()),
        ];
        assert_eq!(OrderEstimate::subtotal_of(lines), Decimal::from(450));
    }
}

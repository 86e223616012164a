//! Status enums reported by the storefront API.
//!
//! All statuses travel as lowercase snake-case strings. Values this client
//! does not know about deserialize to an `Unknown` variant instead of failing
//! the whole response.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Human-readable label for order history.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

/// Payment record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Shipment tracking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    ReadyToShip,
    Shipped,
    InTransit,
    Delivered,
    #[serde(other)]
    Unknown,
}

impl ShipmentStatus {
    /// Tracking steps in display order.
    pub const STEPS: [Self; 4] = [
        Self::ReadyToShip,
        Self::Shipped,
        Self::InTransit,
        Self::Delivered,
    ];

    /// Human-readable label for tracking output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ReadyToShip => "Ready to ship",
            Self::Shipped => "Shipped",
            Self::InTransit => "In transit",
            Self::Delivered => "Delivered",
            Self::Unknown => "Unknown",
        }
    }

    /// Position in [`Self::STEPS`], if this is a known step.
    #[must_use]
    pub fn step(&self) -> Option<usize> {
        Self::STEPS.iter().position(|s| s == self)
    }
}

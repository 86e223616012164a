//! Line-item quantities.
//!
//! A cart line always holds at least one unit, so [`Quantity`] is backed by a
//! `NonZeroU32` and a zero or negative quantity is unrepresentable. Requests
//! that would drop a line to zero are expressed as [`QuantityChange::Remove`].

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity was zero or negative.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// Quantity does not fit the wire type.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
    /// Text that is not a whole number.
    #[error("invalid quantity: {0:?}")]
    Invalid(String),
}

/// A strictly positive number of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity from a signed count.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotPositive` for counts below 1 and
    /// `QuantityError::TooLarge` for counts above `u32::MAX`.
    pub fn new(count: i64) -> Result<Self, QuantityError> {
        if count < 1 {
            return Err(QuantityError::NotPositive(count));
        }
        u32::try_from(count)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(QuantityError::TooLarge(count))
    }

    /// The count as a `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// One more unit, saturating at `u32::MAX`.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The change that results from asking for `self - 1` units.
    #[must_use]
    pub fn decrement(self) -> QuantityChange {
        QuantityChange::from_requested(i64::from(self.get()) - 1)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let count = trimmed
            .parse::<i64>()
            .map_err(|_| QuantityError::Invalid(trimmed.to_string()))?;
        Self::new(count)
    }
}

/// What a requested quantity means for an existing cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Set the line to this many units.
    Update(Quantity),
    /// Drop the line entirely.
    Remove,
}

impl QuantityChange {
    /// Route a requested quantity: anything at or below zero removes the line.
    ///
    /// ```
    /// use shopfront_core::{Quantity, QuantityChange};
    ///
    /// assert_eq!(QuantityChange::from_requested(0), QuantityChange::Remove);
    /// assert_eq!(QuantityChange::from_requested(-3), QuantityChange::Remove);
    /// assert_eq!(
    ///     QuantityChange::from_requested(2),
    ///     QuantityChange::Update(Quantity::new(2).unwrap())
    /// );
    /// ```
    #[must_use]
    pub fn from_requested(requested: i64) -> Self {
        match Quantity::new(requested) {
            Ok(quantity) => Self::Update(quantity),
            Err(QuantityError::NotPositive(_) | QuantityError::Invalid(_)) => Self::Remove,
            Err(QuantityError::TooLarge(_)) => Self::Update(Quantity(NonZeroU32::MAX)),
        }
    }
}

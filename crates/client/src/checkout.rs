//! Checkout sequencing.
//!
//! The flow is strictly linear and never moves backward:
//!
//! 1. [`place_order`] turns the current cart into a server-side order.
//! 2. [`Checkout::enter`] re-fetches that order by ID. Without an ID the
//!    caller is sent back to the cart.
//! 3. [`Checkout::initiate_payment`] opens a gateway order.
//! 4. [`Checkout::complete_payment`] collects payment through a
//!    [`PaymentGateway`] and forwards the signed confirmation for
//!    verification. A cancelled or declined collection stays at step 3 so it
//!    can be retried.
//! 5. [`Checkout::resolve`] decides the outcome from the order the server
//!    reports, see [`PaymentStatusRequest`].

use std::fmt;
use std::future::Future;

use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shopfront_core::{OrderId, OrderStatus, PaymentStatus};

use crate::api::{
    ApiClient, ApiError, CheckoutRequest, Order, PaymentConfirmation, PaymentOrder,
};
use crate::cart::{CartError, CartStore};
use crate::error::add_breadcrumb;

// =============================================================================
// Errors
// =============================================================================

/// Errors a payment gateway can raise.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// This gateway cannot serve the payment order it was given.
    #[error("Payment gateway unavailable: {0}")]
    Unsupported(String),
}

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// There is nothing to check out. Nothing was sent.
    #[error("Your cart is empty")]
    EmptyCart,

    /// A step was attempted out of order.
    #[error("Cannot {attempted} while the checkout is at \"{actual}\"")]
    InvalidStage {
        attempted: &'static str,
        actual: CheckoutStage,
    },

    /// Payment gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Cart reload failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// API request failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CheckoutError {
    /// The underlying API error, if any.
    #[must_use]
    pub const fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) | Self::Cart(CartError::Api(e)) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// Step 1: place the order
// =============================================================================

/// Create an order from the current cart.
///
/// An empty local cart is refused before any request. After the server
/// accepts the order it empties the cart, so the cart is reloaded.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` for an empty cart, or an error if the
/// API request fails.
#[instrument(skip(api, cart))]
pub async fn place_order(
    api: &ApiClient,
    cart: &CartStore,
    request: &CheckoutRequest,
) -> Result<Order, CheckoutError> {
    if cart.snapshot().is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let order = api.checkout(request).await?;
    info!(order_id = %order.id, total = %order.total_amount, "Order placed");
    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));

    if let Err(e) = cart.fetch().await {
        // The order exists either way; a stale cart is fixed by the next fetch.
        warn!(error = %e, "Cart reload after checkout failed");
    }

    Ok(order)
}

// =============================================================================
// Stages
// =============================================================================

/// Where a checkout currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckoutStage {
    OrderLoaded,
    PaymentInitiated,
    PaymentCompleted,
    Resolved,
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OrderLoaded => "order loaded",
            Self::PaymentInitiated => "payment initiated",
            Self::PaymentCompleted => "payment completed",
            Self::Resolved => "resolved",
        })
    }
}

/// Result of entering the checkout step.
#[derive(Debug)]
pub enum CheckoutEntry {
    /// No order ID was carried over; go back to the cart.
    RedirectToCart,
    /// The order was loaded.
    Ready(Box<Checkout>),
}

/// What the client believes happened, as passed to the status step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportedOutcome {
    Success,
    Failed,
}

impl std::str::FromStr for ReportedOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failed" | "failure" => Ok(Self::Failed),
            other => Err(format!("unknown payment outcome: {other}")),
        }
    }
}

/// Result of a payment collection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAttempt {
    /// The server accepted the confirmation.
    Verified,
    /// The user backed out; the payment can be retried.
    Cancelled,
    /// The gateway declined; the payment can be retried.
    Declined(String),
    /// The server rejected the confirmation.
    VerificationFailed(String),
}

// =============================================================================
// Payment gateways
// =============================================================================

/// What a gateway reports back after collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Paid; this confirmation must be verified by the server.
    Confirmed(PaymentConfirmation),
    /// The user closed the payment prompt.
    Cancelled,
    /// The gateway refused the payment.
    Declined(String),
}

/// Something that can collect payment for a gateway order.
pub trait PaymentGateway {
    /// Collect payment for `payment`, which belongs to `order`.
    fn collect(
        &self,
        payment: &PaymentOrder,
        order: &Order,
    ) -> impl Future<Output = Result<GatewayOutcome, GatewayError>> + Send;
}

/// Local stand-in for the gateway, used when the server hands out a mock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockGateway {
    Approve,
    Cancel,
    Decline,
}

impl MockGateway {
    /// Signature the server accepts from the mock flow.
    pub const SIGNATURE: &'static str = "mock_signature";

    fn payment_id() -> String {
        let id: String = Uuid::new_v4().simple().to_string().chars().take(10).collect();
        format!("pay_mock_{id}")
    }
}

impl PaymentGateway for MockGateway {
    async fn collect(
        &self,
        payment: &PaymentOrder,
        _order: &Order,
    ) -> Result<GatewayOutcome, GatewayError> {
        if !payment.is_mock() {
            return Err(GatewayError::Unsupported(
                "the store is using a live payment gateway".to_string(),
            ));
        }

        Ok(match self {
            Self::Approve => GatewayOutcome::Confirmed(PaymentConfirmation {
                gateway_order_id: payment.gateway_order_id.clone(),
                payment_id: Self::payment_id(),
                signature: Self::SIGNATURE.to_string(),
            }),
            Self::Cancel => GatewayOutcome::Cancelled,
            Self::Decline => GatewayOutcome::Declined("Payment declined".to_string()),
        })
    }
}

/// Confirmation obtained from the live gateway out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedConfirmation {
    pub payment_id: String,
    pub signature: String,
}

impl PaymentGateway for SignedConfirmation {
    async fn collect(
        &self,
        payment: &PaymentOrder,
        _order: &Order,
    ) -> Result<GatewayOutcome, GatewayError> {
        Ok(GatewayOutcome::Confirmed(PaymentConfirmation {
            gateway_order_id: payment.gateway_order_id.clone(),
            payment_id: self.payment_id.clone(),
            signature: self.signature.clone(),
        }))
    }
}

// =============================================================================
// Status resolution
// =============================================================================

/// Final payment status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedStatus {
    /// The server confirms the payment.
    Succeeded,
    /// The payment failed, by the server's account or the client's.
    Failed,
    /// The server has not confirmed the payment yet.
    Pending,
}

impl ResolvedStatus {
    /// Decide from the server's view of the order.
    ///
    /// The order status is the server's word: verification moves an order
    /// to `confirmed`, and a cancelled order was never paid. For orders
    /// still `pending` a `success` payment status or a shipment record,
    /// which the server creates only after verification, also counts.
    /// A client-reported failure always wins; a client-reported success
    /// counts for nothing on its own.
    #[must_use]
    pub fn judge(order: &Order, reported: ReportedOutcome) -> Self {
        if reported == ReportedOutcome::Failed {
            return Self::Failed;
        }
        match order.status {
            OrderStatus::Confirmed | OrderStatus::Shipped | OrderStatus::Delivered => {
                return Self::Succeeded;
            }
            OrderStatus::Cancelled => return Self::Failed,
            OrderStatus::Pending | OrderStatus::Unknown => {}
        }
        match order.payment_status {
            Some(PaymentStatus::Success) => Self::Succeeded,
            Some(PaymentStatus::Failed) => Self::Failed,
            _ if order.shipment.is_some() => Self::Succeeded,
            _ => Self::Pending,
        }
    }
}

/// Input of the status step: an order and what the client believes happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentStatusRequest {
    pub order_id: OrderId,
    pub reported: ReportedOutcome,
}

/// Output of the status step.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResolution {
    pub order: Order,
    pub status: ResolvedStatus,
}

impl PaymentStatusRequest {
    /// Re-fetch the order and decide the status from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, api), fields(order_id = %self.order_id, reported = ?self.reported))]
    pub async fn resolve(&self, api: &ApiClient) -> Result<PaymentResolution, ApiError> {
        let order = api.get_order(self.order_id).await?;
        let status = ResolvedStatus::judge(&order, self.reported);
        if status == ResolvedStatus::Pending && self.reported == ReportedOutcome::Success {
            warn!("Client reported success the server has not confirmed");
        }
        Ok(PaymentResolution { order, status })
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// A checkout in progress for one order.
#[derive(Debug)]
pub struct Checkout {
    api: ApiClient,
    order: Order,
    stage: CheckoutStage,
    payment: Option<PaymentOrder>,
    reported: Option<ReportedOutcome>,
}

impl Checkout {
    /// Enter the checkout step for a carried-over order ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be loaded.
    #[instrument(skip(api))]
    pub async fn enter(api: &ApiClient, order_id: Option<OrderId>) -> Result<CheckoutEntry, CheckoutError> {
        let Some(order_id) = order_id else {
            return Ok(CheckoutEntry::RedirectToCart);
        };

        let order = api.get_order(order_id).await?;
        Ok(CheckoutEntry::Ready(Box::new(Self {
            api: api.clone(),
            order,
            stage: CheckoutStage::OrderLoaded,
            payment: None,
            reported: None,
        })))
    }

    /// The order being paid for.
    #[must_use]
    pub const fn order(&self) -> &Order {
        &self.order
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> CheckoutStage {
        self.stage
    }

    /// The gateway order, once initiated.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentOrder> {
        self.payment.as_ref()
    }

    fn expect_stage(&self, expected: CheckoutStage, attempted: &'static str) -> Result<(), CheckoutError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(CheckoutError::InvalidStage {
                attempted,
                actual: self.stage,
            })
        }
    }

    /// Open a gateway order for this order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidStage` unless the order was just
    /// loaded, or an error if the API request fails.
    #[instrument(skip(self), fields(order_id = %self.order.id))]
    pub async fn initiate_payment(&mut self) -> Result<&PaymentOrder, CheckoutError> {
        self.expect_stage(CheckoutStage::OrderLoaded, "start payment")?;

        let payment = self.api.create_payment_order(self.order.id).await?;
        info!(
            gateway_order_id = %payment.gateway_order_id,
            mock = payment.is_mock(),
            "Payment initiated"
        );
        self.stage = CheckoutStage::PaymentInitiated;
        Ok(&*self.payment.insert(payment))
    }

    /// Collect payment and forward the confirmation for verification.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidStage` unless payment was initiated,
    /// a gateway error, or an API error other than a rejected confirmation.
    #[instrument(skip(self, gateway), fields(order_id = %self.order.id))]
    pub async fn complete_payment<G>(&mut self, gateway: &G) -> Result<PaymentAttempt, CheckoutError>
    where
        G: PaymentGateway + Sync,
    {
        self.expect_stage(CheckoutStage::PaymentInitiated, "complete payment")?;
        let Some(payment) = self.payment.as_ref() else {
            return Err(CheckoutError::InvalidStage {
                attempted: "complete payment",
                actual: self.stage,
            });
        };

        let confirmation = match gateway.collect(payment, &self.order).await? {
            GatewayOutcome::Confirmed(confirmation) => confirmation,
            GatewayOutcome::Cancelled => {
                info!("Payment cancelled");
                return Ok(PaymentAttempt::Cancelled);
            }
            GatewayOutcome::Declined(reason) => {
                info!(reason = %reason, "Payment declined");
                return Ok(PaymentAttempt::Declined(reason));
            }
        };

        let attempt = match self.api.verify_payment(&confirmation).await {
            Ok(_) => {
                self.reported = Some(ReportedOutcome::Success);
                PaymentAttempt::Verified
            }
            Err(e @ (ApiError::Rejected { .. } | ApiError::NotFound(_))) => {
                warn!(error = %e, "Payment verification rejected");
                self.reported = Some(ReportedOutcome::Failed);
                PaymentAttempt::VerificationFailed(e.detail().unwrap_or("Verification failed").to_string())
            }
            Err(e) => return Err(e.into()),
        };

        let order_id = self.order.id.to_string();
        add_breadcrumb("checkout", "Payment submitted", Some(&[("order_id", order_id.as_str())]));
        self.stage = CheckoutStage::PaymentCompleted;
        Ok(attempt)
    }

    /// Re-fetch the order and decide the final status.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidStage` unless payment was completed, or
    /// an error if the API request fails.
    pub async fn resolve(&mut self) -> Result<PaymentResolution, CheckoutError> {
        self.expect_stage(CheckoutStage::PaymentCompleted, "check payment status")?;

        let request = PaymentStatusRequest {
            order_id: self.order.id,
            reported: self.reported.unwrap_or(ReportedOutcome::Failed),
        };
        let resolution = request.resolve(&self.api).await?;
        self.order = resolution.order.clone();
        self.stage = CheckoutStage::Resolved;
        Ok(resolution)
    }
}

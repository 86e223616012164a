//! Order placement, payment and status commands.

use shopfront_client::api::CheckoutRequest;
use shopfront_client::checkout::{
    Checkout, CheckoutEntry, MockGateway, PaymentAttempt, PaymentStatusRequest, ReportedOutcome,
    SignedConfirmation,
};
use shopfront_client::views::{OrderView, PaymentStatusView};
use shopfront_client::{AppError, Result, Storefront};
use shopfront_core::{AddressId, OrderId};

use super::render;

/// How the payment is collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// Mock gateway, approving.
    Mock,
    /// Mock gateway, user closes the prompt.
    MockCancel,
    /// Mock gateway, declined.
    MockDecline,
    /// Confirmation obtained from the live gateway.
    Signed {
        payment_id: String,
        signature: String,
    },
}

/// Place an order from the cart.
///
/// # Errors
///
/// Returns an error for an empty cart or a refused order.
pub async fn place(
    store: &Storefront,
    address: Option<AddressId>,
    coupon: Option<String>,
) -> Result<String> {
    let request = CheckoutRequest {
        shipping_address_id: address,
        coupon_code: coupon.filter(|code| !code.trim().is_empty()),
    };
    let order = store.place_order(&request).await?;

    let mut output = render(&OrderView::from(&order))?;
    output.push_str(&format!("\nPay with `shop pay {}`.", order.id));
    Ok(output)
}

/// Run the payment sequence for an order and show the result.
///
/// A cancelled or declined collection stops before verification so the
/// command can simply be run again.
///
/// # Errors
///
/// Returns an error if the order cannot be loaded, payment cannot be
/// initiated, or the gateway is unusable.
pub async fn pay(store: &Storefront, order_id: OrderId, method: Method) -> Result<String> {
    let mut checkout: Box<Checkout> = match store.checkout(Some(order_id)).await? {
        CheckoutEntry::Ready(checkout) => checkout,
        CheckoutEntry::RedirectToCart => {
            return Ok("No order to pay for. Place one with `shop checkout`.".to_string());
        }
    };

    let payment = checkout.initiate_payment().await?;
    tracing::info!(
        gateway_order_id = %payment.gateway_order_id,
        amount = %payment.amount,
        currency = %payment.currency,
        "Collecting payment"
    );

    let attempt = match method {
        Method::Mock => checkout.complete_payment(&MockGateway::Approve).await?,
        Method::MockCancel => checkout.complete_payment(&MockGateway::Cancel).await?,
        Method::MockDecline => checkout.complete_payment(&MockGateway::Decline).await?,
        Method::Signed {
            payment_id,
            signature,
        } => {
            checkout
                .complete_payment(&SignedConfirmation {
                    payment_id,
                    signature,
                })
                .await?
        }
    };

    match attempt {
        PaymentAttempt::Cancelled => {
            return Ok(format!(
                "Payment cancelled. Run `shop pay {order_id}` to try again."
            ));
        }
        PaymentAttempt::Declined(reason) => {
            return Ok(format!(
                "{reason}. Run `shop pay {order_id}` to try again."
            ));
        }
        PaymentAttempt::VerificationFailed(reason) => {
            tracing::warn!(reason = %reason, "Payment verification failed");
        }
        PaymentAttempt::Verified => {}
    }

    let resolution = checkout.resolve().await?;
    render(&PaymentStatusView::from(&resolution))
}

/// Show the payment status of an order.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown outcome flag, or an error
/// if the order cannot be fetched.
pub async fn status(store: &Storefront, order_id: OrderId, reported: &str) -> Result<String> {
    let reported: ReportedOutcome = reported.parse().map_err(AppError::BadRequest)?;
    let resolution = PaymentStatusRequest { order_id, reported }
        .resolve(store.api())
        .await?;
    render(&PaymentStatusView::from(&resolution))
}

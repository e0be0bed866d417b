//! Payment gateway seam
//!
//! The orchestrator only sees this trait; [`StripeGateway`] is the
//! production implementation over the Stripe REST API.

pub mod stripe;

pub use stripe::StripeGateway;

use async_trait::async_trait;
use thiserror::Error;

/// Payment provider identifier recorded on payment rows
pub const PROVIDER_STRIPE: &str = "stripe";

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote call itself failed (network, 5xx, timeout)
    #[error("payment gateway request failed: {0}")]
    Request(String),

    /// The gateway answered with something we cannot use
    #[error("unexpected gateway response: {0}")]
    Response(String),

    /// Webhook payload failed the authenticity check
    #[error("invalid webhook signature: {0}")]
    SignatureInvalid(&'static str),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Request(err.to_string())
    }
}

/// A created payment intent
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Gateway-assigned reference (also the webhook correlation key)
    pub id: String,
    /// Secret the client uses to complete the payment
    pub client_secret: String,
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentSucceeded { reference: String },
    PaymentFailed { reference: String },
    /// Verified but not relevant to reconciliation
    Other { event_type: String },
}

/// External payment processor contract
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for the given amount in minor units.
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        order_id: i64,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Verify a webhook payload against its signature header and parse
    /// it into an event. Only events returned from here may mutate
    /// state.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError>;
}

//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{GatewayError, PaymentGateway, PaymentIntent, WebhookEvent};

/// Stripe-backed [`PaymentGateway`]
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        order_id: i64,
    ) -> Result<PaymentIntent, GatewayError> {
        let amount = amount_minor_units.to_string();
        let order_id = order_id.to_string();
        let resp: serde_json::Value = self
            .client
            .post("https://api.stripe.com/v1/payment_intents")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", currency),
                ("metadata[order_id]", order_id.as_str()),
                ("automatic_payment_methods[enabled]", "true"),
            ])
            .send()
            .await?
            .json()
            .await?;

        match (resp["id"].as_str(), resp["client_secret"].as_str()) {
            (Some(id), Some(client_secret)) => Ok(PaymentIntent {
                id: id.to_string(),
                client_secret: client_secret.to_string(),
            }),
            _ => Err(GatewayError::Response(format!(
                "Stripe create_intent failed: {resp}"
            ))),
        }
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        verify_webhook_signature(payload, signature_header, &self.webhook_secret)
            .map_err(GatewayError::SignatureInvalid)?;
        parse_webhook_event(payload)
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    // Decode hex signature and use constant-time comparison via hmac::verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    // Reject events older than 5 minutes to prevent replay attacks
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > 300 {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Parse a verified Stripe event payload into a [`WebhookEvent`]
fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent, GatewayError> {
    let event: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::Response(format!("invalid webhook JSON: {e}")))?;

    let event_type = event["type"].as_str().unwrap_or("").to_string();
    let reference = event
        .get("data")
        .and_then(|d| d.get("object"))
        .and_then(|o| o["id"].as_str())
        .map(String::from);

    match (event_type.as_str(), reference) {
        ("payment_intent.succeeded", Some(reference)) => {
            Ok(WebhookEvent::PaymentSucceeded { reference })
        }
        ("payment_intent.payment_failed", Some(reference)) => {
            Ok(WebhookEvent::PaymentFailed { reference })
        }
        ("payment_intent.succeeded" | "payment_intent.payment_failed", None) => Err(
            GatewayError::Response(format!("{event_type} event missing payment intent id")),
        ),
        _ => Ok(WebhookEvent::Other { event_type }),
    }
}

//! Payment endpoints
//!
//! POST /api/payments/webhook — gateway events (raw body for signature
//! verification), plus payment lookups.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use shared::error::{AppError, ErrorCode};
use shared::models::Payment;

use crate::gateway::{PaymentGateway, WebhookEvent};
use crate::orders::{self, OrderError};
use crate::state::AppState;
use crate::store::Store;

use super::ApiResult;

/// Handle incoming gateway webhook events
///
/// Must receive the raw body (not JSON) for HMAC signature verification.
/// Only events that pass verification may touch state.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    let event = match state.gateway.verify_webhook(&body, sig_header) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "Webhook signature verification failed");
            return StatusCode::BAD_REQUEST;
        }
    };

    let result = match event {
        WebhookEvent::PaymentSucceeded { reference } => {
            tracing::info!(payment_reference = %reference, "Received payment success webhook");
            orders::handle_payment_success(state.store.as_ref(), &reference).await
        }
        WebhookEvent::PaymentFailed { reference } => {
            tracing::info!(payment_reference = %reference, "Received payment failure webhook");
            orders::handle_payment_failure(state.store.as_ref(), &reference).await
        }
        WebhookEvent::Other { event_type } => {
            tracing::debug!(event_type = %event_type, "Unhandled webhook event type");
            return StatusCode::OK;
        }
    };

    match result {
        Ok(()) => StatusCode::OK,
        Err(OrderError::PaymentNotFound(reference)) => {
            tracing::warn!(payment_reference = %reference, "Webhook for unknown payment");
            StatusCode::NOT_FOUND
        }
        Err(err) => {
            tracing::error!(error = %err, "Webhook event processing failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /api/payments/by-order?order_id=
#[derive(Deserialize)]
pub struct ByOrderQuery {
    pub order_id: i64,
}

pub async fn by_order(
    State(state): State<AppState>,
    Query(query): Query<ByOrderQuery>,
) -> ApiResult<Payment> {
    let payment = state
        .store
        .payment_by_order(query.order_id)
        .await?
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::PaymentNotFound,
                format!("Payment not found for order: {}", query.order_id),
            )
        })?;
    Ok(Json(payment))
}

/// GET /api/payments/by-reference?reference=
#[derive(Deserialize)]
pub struct ByReferenceQuery {
    pub reference: String,
}

pub async fn by_reference(
    State(state): State<AppState>,
    Query(query): Query<ByReferenceQuery>,
) -> ApiResult<Payment> {
    let payment = state
        .store
        .payment_by_reference(&query.reference)
        .await?
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {}", query.reference),
            )
        })?;
    Ok(Json(payment))
}

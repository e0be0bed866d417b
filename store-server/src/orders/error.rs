//! Order workflow error types

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Errors surfaced by the order workflow
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock: {}", .issues.join(", "))]
    InsufficientStock { issues: Vec<String> },

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            // The ledger's own re-check failed (a concurrent placement
            // won the race); surface it the same way the availability
            // check does.
            StoreError::InsufficientStock { .. } => Self::InsufficientStock {
                issues: vec![err.to_string()],
            },
            other => Self::Store(other),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => AppError::new(ErrorCode::EmptyCart),
            OrderError::InsufficientStock { .. } => {
                AppError::with_message(ErrorCode::InsufficientStock, err.to_string())
            }
            OrderError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order not found: {id}"))
            }
            OrderError::PaymentNotFound(reference) => AppError::with_message(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {reference}"),
            ),
            OrderError::ProductNotFound(id) => AppError::with_message(
                ErrorCode::ProductNotFound,
                format!("Product not found: {id}"),
            ),
            OrderError::InvalidRequest(msg) => AppError::invalid_request(msg),
            OrderError::Gateway(GatewayError::SignatureInvalid(reason)) => {
                AppError::with_message(ErrorCode::WebhookSignatureInvalid, reason)
            }
            OrderError::Gateway(gateway_err) => {
                tracing::error!(error = %gateway_err, "Payment gateway call failed");
                AppError::new(ErrorCode::PaymentGatewayError)
            }
            OrderError::Store(store_err) => store_err.into(),
        }
    }
}

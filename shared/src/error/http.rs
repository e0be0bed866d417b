//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::PaymentNotFound
            | Self::ProductNotFound
            | Self::CartNotFound
            | Self::CartItemNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::ProductNameExists
            | Self::InsufficientStock => StatusCode::CONFLICT,

            // 502 Bad Gateway (upstream payment processor failed)
            Self::PaymentGatewayError => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            Self::Unknown
            | Self::ValidationFailed
            | Self::InvalidRequest
            | Self::EmptyCart
            | Self::InvalidOrderStatus
            | Self::WebhookSignatureInvalid => StatusCode::BAD_REQUEST,
        }
    }
}

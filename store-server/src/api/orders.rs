//! Order endpoints: placement, queries, status override, direct
//! reconciliation notifications

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    Order, OrderStatus, PaymentEventRequest, PlaceOrderResponse, UpdateOrderStatusRequest,
};

use crate::orders;
use crate::state::AppState;
use crate::store::Store;

use super::ApiResult;

/// POST /api/orders/place/{user_id}
pub async fn place(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), AppError> {
    let response = orders::place_order(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &state.currency,
        user_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/orders
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Order>> {
    Ok(Json(state.store.list_orders().await?))
}

/// GET /api/orders/user/{user_id}
pub async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<Order>> {
    Ok(Json(state.store.orders_by_user(user_id).await?))
}

/// GET /api/orders/{order_id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Order> {
    let order = state.store.get_order(order_id).await?.ok_or_else(|| {
        AppError::with_message(ErrorCode::OrderNotFound, format!("Order not found: {order_id}"))
    })?;
    Ok(Json(order))
}

/// PUT /api/orders/{order_id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<serde_json::Value> {
    let status = OrderStatus::parse(&request.status).ok_or_else(|| {
        AppError::with_message(
            ErrorCode::InvalidOrderStatus,
            format!("Invalid order status: {}", request.status),
        )
    })?;

    orders::update_order_status(state.store.as_ref(), order_id, status).await?;
    Ok(Json(serde_json::json!({
        "message": "Order status updated successfully",
        "order_id": order_id,
        "new_status": status,
    })))
}

/// POST /api/orders/payment/success
pub async fn payment_success(
    State(state): State<AppState>,
    Json(request): Json<PaymentEventRequest>,
) -> ApiResult<serde_json::Value> {
    orders::handle_payment_success(state.store.as_ref(), &request.payment_reference).await?;
    Ok(Json(serde_json::json!({
        "message": "Payment success processed",
        "payment_reference": request.payment_reference,
    })))
}

/// POST /api/orders/payment/failure
pub async fn payment_failure(
    State(state): State<AppState>,
    Json(request): Json<PaymentEventRequest>,
) -> ApiResult<serde_json::Value> {
    orders::handle_payment_failure(state.store.as_ref(), &request.payment_reference).await?;
    Ok(Json(serde_json::json!({
        "message": "Payment failure processed",
        "payment_reference": request.payment_reference,
    })))
}

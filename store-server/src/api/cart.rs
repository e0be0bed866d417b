//! Shopping cart endpoints

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use shared::error::{AppError, ErrorCode};
use shared::models::{AddToCartRequest, CartItemResponse, CartResponse, UpdateCartItemRequest};
use shared::money;

use crate::state::AppState;
use crate::store::Store;

use super::ApiResult;

/// GET /api/cart/{user_id}
///
/// Creates the cart lazily on first access.
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<CartResponse> {
    Ok(Json(cart_response(state.store.as_ref(), user_id).await?))
}

/// POST /api/cart/{user_id}/items
pub async fn add_item(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<AddToCartRequest>,
) -> ApiResult<CartResponse> {
    if request.quantity < 1 {
        return Err(AppError::validation("quantity must be at least 1"));
    }
    require_product(state.store.as_ref(), request.product_id).await?;

    state
        .store
        .add_cart_item(user_id, request.product_id, request.quantity)
        .await?;
    tracing::info!(
        user_id,
        product_id = request.product_id,
        quantity = request.quantity,
        "Added item to cart"
    );

    Ok(Json(cart_response(state.store.as_ref(), user_id).await?))
}

/// PUT /api/cart/{user_id}/items
///
/// Sets the quantity of an existing line; zero or negative removes it.
pub async fn update_item(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdateCartItemRequest>,
) -> ApiResult<CartResponse> {
    require_product(state.store.as_ref(), request.product_id).await?;

    let found = state
        .store
        .set_cart_item_quantity(user_id, request.product_id, request.quantity)
        .await?;
    if !found {
        return Err(AppError::with_message(
            ErrorCode::CartItemNotFound,
            "Item not found in cart",
        ));
    }

    Ok(Json(cart_response(state.store.as_ref(), user_id).await?))
}

/// DELETE /api/cart/{user_id}/items/{product_id}
pub async fn remove_item(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(i64, i64)>,
) -> ApiResult<CartResponse> {
    let removed = state.store.remove_cart_item(user_id, product_id).await?;
    if !removed {
        tracing::warn!(user_id, product_id, "Cart item not found for removal");
    }
    Ok(Json(cart_response(state.store.as_ref(), user_id).await?))
}

/// DELETE /api/cart/{user_id}
pub async fn clear(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.clear_cart(user_id).await?;
    tracing::info!(user_id, "Cart cleared");
    Ok(StatusCode::NO_CONTENT)
}

async fn require_product(store: &dyn Store, product_id: i64) -> Result<(), AppError> {
    store.get_product(product_id).await?.ok_or_else(|| {
        AppError::with_message(
            ErrorCode::ProductNotFound,
            format!("Product not found: {product_id}"),
        )
    })?;
    Ok(())
}

/// Build the cart response with per-line product data and totals.
async fn cart_response(store: &dyn Store, user_id: i64) -> Result<CartResponse, AppError> {
    let cart = store.get_or_create_cart(user_id).await?;
    let lines = store.cart_lines(user_id).await?.unwrap_or_default();

    let ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
    let products = store.products_by_ids(&ids).await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let Some(product) = products.iter().find(|p| p.id == line.product_id) else {
            continue;
        };
        items.push(CartItemResponse {
            product_id: product.id,
            product_name: product.name.clone(),
            price: product.price,
            quantity: line.quantity,
        });
    }

    let total_amount = money::order_total(items.iter().map(|i| (i.price, i.quantity)));
    let total_items = items.iter().map(|i| i.quantity).sum();

    Ok(CartResponse {
        cart_id: cart.id,
        items,
        total_amount,
        total_items,
    })
}

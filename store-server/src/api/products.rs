//! Product catalog endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::error::{AppError, ErrorCode};
use shared::models::{Product, ProductCreate, ProductUpdate};

use crate::state::AppState;
use crate::store::Store;

use super::ApiResult;

/// GET /api/products
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(Json(state.store.list_products().await?))
}

/// GET /api/products/search?name=
#[derive(Deserialize)]
pub struct SearchQuery {
    pub name: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Product>> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name cannot be empty"));
    }
    Ok(Json(state.store.search_products(name).await?))
}

/// GET /api/products/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<Product> {
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| product_not_found(product_id))?;
    Ok(Json(product))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<ProductCreate>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    if data.name.trim().is_empty() {
        return Err(AppError::validation("product name is required"));
    }
    validate_price(data.price)?;
    validate_stock(data.stock_quantity)?;

    let product = state.store.create_product(data).await?;
    tracing::info!(product_id = product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(data): Json<ProductUpdate>,
) -> ApiResult<Product> {
    if let Some(ref name) = data.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("product name cannot be empty"));
        }
    }
    if let Some(price) = data.price {
        validate_price(price)?;
    }
    if let Some(stock) = data.stock_quantity {
        validate_stock(stock)?;
    }

    let product = state
        .store
        .update_product(product_id, data)
        .await?
        .ok_or_else(|| product_not_found(product_id))?;
    Ok(Json(product))
}

/// DELETE /api/products/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_product(product_id).await? {
        tracing::info!(product_id, "Product deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(product_not_found(product_id))
    }
}

fn product_not_found(product_id: i64) -> AppError {
    AppError::with_message(
        ErrorCode::ProductNotFound,
        format!("Product not found: {product_id}"),
    )
}

fn validate_price(price: Decimal) -> Result<(), AppError> {
    if price <= Decimal::ZERO {
        return Err(AppError::validation("price must be greater than 0"));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<(), AppError> {
    if stock < 0 {
        return Err(AppError::validation("stock quantity cannot be negative"));
    }
    Ok(())
}

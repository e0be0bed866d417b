//! API routes

pub mod cart;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use shared::error::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let products = Router::new()
        .route(
            "/api/products",
            get(products::list).post(products::create),
        )
        .route("/api/products/search", get(products::search))
        .route(
            "/api/products/{id}",
            get(products::get_by_id)
                .put(products::update)
                .delete(products::delete),
        );

    let cart = Router::new()
        .route(
            "/api/cart/{user_id}",
            get(cart::get_cart).delete(cart::clear),
        )
        .route(
            "/api/cart/{user_id}/items",
            post(cart::add_item).put(cart::update_item),
        )
        .route(
            "/api/cart/{user_id}/items/{product_id}",
            axum::routing::delete(cart::remove_item),
        );

    let orders = Router::new()
        .route("/api/orders", get(orders::list))
        .route("/api/orders/place/{user_id}", post(orders::place))
        .route("/api/orders/user/{user_id}", get(orders::by_user))
        .route("/api/orders/{order_id}", get(orders::get_by_id))
        .route("/api/orders/{order_id}/status", put(orders::update_status))
        .route("/api/orders/payment/success", post(orders::payment_success))
        .route("/api/orders/payment/failure", post(orders::payment_failure));

    // Webhook receives the raw body for signature verification
    let payments = Router::new()
        .route("/api/payments/webhook", post(payments::handle_webhook))
        .route("/api/payments/by-order", get(payments::by_order))
        .route("/api/payments/by-reference", get(payments::by_reference));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(products)
        .merge(cart)
        .merge(orders)
        .merge(payments)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

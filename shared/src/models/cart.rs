//! Cart Models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cart entity (one per user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
}

/// Cart line item entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

/// Snapshot of one cart line, consumed by order placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// Add item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Set quantity payload (quantity <= 0 removes the line)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// One line of a cart response, joined with product data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemResponse {
    pub product_id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// Cart response with computed totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub cart_id: i64,
    pub items: Vec<CartItemResponse>,
    pub total_amount: Decimal,
    pub total_items: i32,
}

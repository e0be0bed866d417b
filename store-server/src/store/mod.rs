//! Persistence facade
//!
//! One trait covers the catalog, carts, orders, payments and the
//! inventory ledger. [`PgStore`] is the PostgreSQL implementation;
//! [`MemStore`] keeps everything behind a single mutex and backs the
//! test suites.
//!
//! Multi-row operations are transactional: either every row change in a
//! call is visible or none is. The ledger operations (`decrement_stock`,
//! `restore_stock`) and the reconciliation writes (`complete_payment`,
//! `fail_payment`) are the enforcement points for the stock and
//! status-consistency invariants.

pub mod memory;
pub mod pg;

pub use memory::MemStore;
pub use pg::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Cart, CartLine, NewOrderLine, Order, OrderLine, OrderStatus, Payment, Product, ProductCreate,
    ProductUpdate,
};
use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(
        "Product '{name}' has insufficient stock. Requested: {requested}, Available: {available}"
    )]
    InsufficientStock {
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(resource) => AppError::not_found(resource),
            StoreError::InsufficientStock { .. } => {
                AppError::with_message(ErrorCode::InsufficientStock, err.to_string())
            }
            StoreError::Duplicate(what) => {
                AppError::with_message(ErrorCode::AlreadyExists, format!("{what} already exists"))
            }
            StoreError::Database(msg) => {
                tracing::error!(error = %msg, "Store operation failed");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations for the checkout workflow and its surface API.
#[async_trait]
pub trait Store: Send + Sync {
    // ==================== Products ====================

    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn get_product(&self, product_id: i64) -> StoreResult<Option<Product>>;
    /// Fetch products for the given ids; missing ids are simply absent
    /// from the result.
    async fn products_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<Product>>;
    async fn search_products(&self, name: &str) -> StoreResult<Vec<Product>>;
    async fn create_product(&self, data: ProductCreate) -> StoreResult<Product>;
    async fn update_product(
        &self,
        product_id: i64,
        data: ProductUpdate,
    ) -> StoreResult<Option<Product>>;
    async fn delete_product(&self, product_id: i64) -> StoreResult<bool>;

    // ==================== Inventory ledger ====================

    /// Atomically subtract the given quantities from stock.
    ///
    /// All-or-nothing: availability is re-checked per product at write
    /// time, and the first shortage rolls back every decrement already
    /// applied in this call before returning
    /// [`StoreError::InsufficientStock`].
    async fn decrement_stock(&self, lines: &[CartLine]) -> StoreResult<()>;

    /// Atomically add the given quantities back to stock.
    ///
    /// The ledger does not deduplicate; invoking this exactly once per
    /// cancelled order is the caller's responsibility.
    async fn restore_stock(&self, lines: &[CartLine]) -> StoreResult<()>;

    // ==================== Carts ====================

    /// Fetch the user's cart, creating it if absent (atomic
    /// insert-or-fetch, safe against concurrent creation).
    async fn get_or_create_cart(&self, user_id: i64) -> StoreResult<Cart>;
    /// Current cart lines; `None` when the user has no cart at all.
    async fn cart_lines(&self, user_id: i64) -> StoreResult<Option<Vec<CartLine>>>;
    /// Add quantity for a product (accumulates onto an existing line).
    async fn add_cart_item(&self, user_id: i64, product_id: i64, quantity: i32) -> StoreResult<()>;
    /// Set the quantity of an existing line; `quantity <= 0` removes it.
    /// Returns false when the line does not exist.
    async fn set_cart_item_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> StoreResult<bool>;
    /// Remove one line. Returns false when the line does not exist.
    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> StoreResult<bool>;
    /// Delete all lines. Idempotent when the cart is already empty.
    async fn clear_cart(&self, user_id: i64) -> StoreResult<()>;

    // ==================== Orders ====================

    /// Create an order with all of its lines in one transaction,
    /// status `PENDING`. An order is never visible without its lines.
    async fn insert_order(
        &self,
        user_id: i64,
        total: Decimal,
        lines: &[NewOrderLine],
        now: i64,
    ) -> StoreResult<Order>;

    /// Compensation path only: remove the payment, the lines and the
    /// order itself, in that order, in one transaction.
    async fn delete_order(&self, order_id: i64) -> StoreResult<()>;

    async fn get_order(&self, order_id: i64) -> StoreResult<Option<Order>>;
    async fn list_orders(&self) -> StoreResult<Vec<Order>>;
    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>>;
    async fn order_lines(&self, order_id: i64) -> StoreResult<Vec<OrderLine>>;
    /// Plain status write. Returns false when the order does not exist.
    async fn set_order_status(&self, order_id: i64, status: OrderStatus) -> StoreResult<bool>;

    // ==================== Payments ====================

    async fn insert_payment(
        &self,
        order_id: i64,
        provider: &str,
        reference: &str,
    ) -> StoreResult<Payment>;
    async fn payment_by_reference(&self, reference: &str) -> StoreResult<Option<Payment>>;
    async fn payment_by_order(&self, order_id: i64) -> StoreResult<Option<Payment>>;

    /// Settle a payment as completed and confirm its order, both writes
    /// in one transaction. Compare-and-set on the payment still being
    /// `PENDING`: returns false (and changes nothing) when the payment
    /// was already settled, which makes replayed success events no-ops.
    async fn complete_payment(&self, reference: &str, paid_at: i64) -> StoreResult<bool>;

    /// Settle a payment as failed and cancel its order, both writes in
    /// one transaction. Compare-and-set on the order not yet being
    /// `CANCELLED`: returns the order only when the transition happened,
    /// so the caller restores stock exactly once per order.
    async fn fail_payment(&self, reference: &str) -> StoreResult<Option<Order>>;
}

//! PostgreSQL store
//!
//! Runtime-checked queries over a `PgPool`. Every multi-row operation
//! runs inside one transaction; the guarded stock UPDATE doubles as the
//! per-product row lock that serializes concurrent decrements.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use shared::models::{
    Cart, CartLine, NewOrderLine, Order, OrderLine, OrderStatus, Payment, PaymentStatus, Product,
    ProductCreate, ProductUpdate,
};

use super::{Store, StoreError, StoreResult};

/// PostgreSQL-backed [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn name_taken(&self, name: &str, exclude_id: Option<i64>) -> StoreResult<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM products
                 WHERE lower(name) = lower($1) AND ($2::BIGINT IS NULL OR id <> $2)
             )",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock_quantity: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock_quantity: row.stock_quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    total_amount: Decimal,
    status: String,
    created_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        let status = OrderStatus::from_db(&row.status)
            .ok_or_else(|| StoreError::Database(format!("unknown order status: {}", row.status)))?;
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            total_amount: row.total_amount,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    order_id: i64,
    payment_provider: String,
    payment_status: String,
    payment_reference: String,
    paid_at: Option<i64>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, StoreError> {
        let status = PaymentStatus::from_db(&row.payment_status).ok_or_else(|| {
            StoreError::Database(format!("unknown payment status: {}", row.payment_status))
        })?;
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            payment_provider: row.payment_provider,
            status,
            payment_reference: row.payment_reference,
            paid_at: row.paid_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock_quantity";
const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, created_at";
const PAYMENT_COLUMNS: &str =
    "id, order_id, payment_provider, payment_status, payment_reference, paid_at";

#[async_trait]
impl Store for PgStore {
    // ==================== Products ====================

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, product_id: i64) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Product::from))
    }

    async fn products_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn search_products(&self, name: &str) -> StoreResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE name ILIKE '%' || $1 || '%' ORDER BY id"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn create_product(&self, data: ProductCreate) -> StoreResult<Product> {
        if self.name_taken(&data.name, None).await? {
            return Err(StoreError::Duplicate(format!("product '{}'", data.name)));
        }

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO products (name, description, price, stock_quantity)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.price)
        .bind(data.stock_quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(Product {
            id: row.0,
            name: data.name,
            description: data.description,
            price: data.price,
            stock_quantity: data.stock_quantity,
        })
    }

    async fn update_product(
        &self,
        product_id: i64,
        data: ProductUpdate,
    ) -> StoreResult<Option<Product>> {
        let Some(current) = self.get_product(product_id).await? else {
            return Ok(None);
        };

        if let Some(ref name) = data.name {
            if self.name_taken(name, Some(product_id)).await? {
                return Err(StoreError::Duplicate(format!("product '{name}'")));
            }
        }

        let updated = Product {
            id: product_id,
            name: data.name.unwrap_or(current.name),
            description: data.description.or(current.description),
            price: data.price.unwrap_or(current.price),
            stock_quantity: data.stock_quantity.unwrap_or(current.stock_quantity),
        };

        sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, stock_quantity = $5
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(updated.price)
        .bind(updated.stock_quantity)
        .execute(&self.pool)
        .await?;

        Ok(Some(updated))
    }

    async fn delete_product(&self, product_id: i64) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // ==================== Inventory ledger ====================

    async fn decrement_stock(&self, lines: &[CartLine]) -> StoreResult<()> {
        let mut lines = lines.to_vec();
        // Lock rows in id order so concurrent decrements cannot deadlock
        lines.sort_by_key(|l| l.product_id);

        let mut tx = self.pool.begin().await?;
        for line in &lines {
            let res = sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $2
                 WHERE id = $1 AND stock_quantity >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if res.rows_affected() == 0 {
                let row: Option<(String, i32)> =
                    sqlx::query_as("SELECT name, stock_quantity FROM products WHERE id = $1")
                        .bind(line.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;

                let Some((name, available)) = row else {
                    return Err(StoreError::NotFound("product"));
                };
                return Err(StoreError::InsufficientStock {
                    name,
                    requested: line.quantity,
                    available,
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn restore_stock(&self, lines: &[CartLine]) -> StoreResult<()> {
        let mut lines = lines.to_vec();
        lines.sort_by_key(|l| l.product_id);

        let mut tx = self.pool.begin().await?;
        for line in &lines {
            sqlx::query("UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1")
                .bind(line.product_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ==================== Carts ====================

    async fn get_or_create_cart(&self, user_id: i64) -> StoreResult<Cart> {
        sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Cart {
            id: row.0,
            user_id,
        })
    }

    async fn cart_lines(&self, user_id: i64) -> StoreResult<Option<Vec<CartLine>>> {
        let cart: Option<(i64,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some((cart_id,)) = cart else {
            return Ok(None);
        };

        let rows: Vec<(i64, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(
            rows.into_iter()
                .map(|(product_id, quantity)| CartLine {
                    product_id,
                    quantity,
                })
                .collect(),
        ))
    }

    async fn add_cart_item(&self, user_id: i64, product_id: i64, quantity: i32) -> StoreResult<()> {
        let cart = self.get_or_create_cart(user_id).await?;
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)
             ON CONFLICT (cart_id, product_id)
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_cart_item_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> StoreResult<bool> {
        let cart: Option<(i64,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some((cart_id,)) = cart else {
            return Ok(false);
        };

        let res = if quantity <= 0 {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query(
                "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
            )
            .bind(cart_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&self.pool)
            .await?
        };
        Ok(res.rows_affected() > 0)
    }

    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> StoreResult<bool> {
        let res = sqlx::query(
            "DELETE FROM cart_items USING carts
             WHERE cart_items.cart_id = carts.id
               AND carts.user_id = $1 AND cart_items.product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: i64) -> StoreResult<()> {
        sqlx::query(
            "DELETE FROM cart_items USING carts
             WHERE cart_items.cart_id = carts.id AND carts.user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Orders ====================

    async fn insert_order(
        &self,
        user_id: i64,
        total: Decimal,
        lines: &[NewOrderLine],
        now: i64,
    ) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;

        let (order_id,): (i64,) = sqlx::query_as(
            "INSERT INTO orders (user_id, total_amount, status, created_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind(total)
        .bind(OrderStatus::Pending.as_db())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.price_at_purchase)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Order {
            id: order_id,
            user_id,
            total_amount: total,
            status: OrderStatus::Pending,
            created_at: now,
        })
    }

    async fn delete_order(&self, order_id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM payments WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, order_id: i64) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn order_lines(&self, order_id: i64) -> StoreResult<Vec<OrderLine>> {
        let rows: Vec<(i64, i64, i64, i32, Decimal)> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity, price_at_purchase
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, order_id, product_id, quantity, price_at_purchase)| OrderLine {
                id,
                order_id,
                product_id,
                quantity,
                price_at_purchase,
            })
            .collect())
    }

    async fn set_order_status(&self, order_id: i64, status: OrderStatus) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(status.as_db())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // ==================== Payments ====================

    async fn insert_payment(
        &self,
        order_id: i64,
        provider: &str,
        reference: &str,
    ) -> StoreResult<Payment> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO payments (order_id, payment_provider, payment_status, payment_reference)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(order_id)
        .bind(provider)
        .bind(PaymentStatus::Pending.as_db())
        .bind(reference)
        .fetch_one(&self.pool)
        .await?;

        Ok(Payment {
            id,
            order_id,
            payment_provider: provider.to_string(),
            status: PaymentStatus::Pending,
            payment_reference: reference.to_string(),
            paid_at: None,
        })
    }

    async fn payment_by_reference(&self, reference: &str) -> StoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn payment_by_order(&self, order_id: i64) -> StoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn complete_payment(&self, reference: &str, paid_at: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(
            "UPDATE payments SET payment_status = $2, paid_at = $3
             WHERE payment_reference = $1 AND payment_status = $4",
        )
        .bind(reference)
        .bind(PaymentStatus::Completed.as_db())
        .bind(paid_at)
        .bind(PaymentStatus::Pending.as_db())
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let (order_id,): (i64,) =
            sqlx::query_as("SELECT order_id FROM payments WHERE payment_reference = $1")
                .bind(reference)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(OrderStatus::Confirmed.as_db())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn fail_payment(&self, reference: &str) -> StoreResult<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let payment: Option<(i64,)> =
            sqlx::query_as("SELECT order_id FROM payments WHERE payment_reference = $1")
                .bind(reference)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((order_id,)) = payment else {
            tx.rollback().await?;
            return Ok(None);
        };

        let res = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status <> $2")
            .bind(order_id)
            .bind(OrderStatus::Cancelled.as_db())
            .execute(&mut *tx)
            .await?;

        if res.rows_affected() == 0 {
            // Order already cancelled: a replayed failure event, nothing to do
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE payments SET payment_status = $2, paid_at = NULL
             WHERE payment_reference = $1",
        )
        .bind(reference)
        .bind(PaymentStatus::Failed.as_db())
        .execute(&mut *tx)
        .await?;

        let row: OrderRow =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(Some(Order::try_from(row)?))
    }
}

//! In-memory store
//!
//! Single-mutex implementation of [`Store`]. Backs the unit and
//! integration test suites and local development without PostgreSQL.
//! Holding one lock across each operation gives the same all-or-nothing
//! visibility the PostgreSQL transactions provide.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use shared::models::{
    Cart, CartLine, NewOrderLine, Order, OrderLine, OrderStatus, Payment, PaymentStatus, Product,
    ProductCreate, ProductUpdate,
};

use super::{Store, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    products: BTreeMap<i64, Product>,
    /// user_id -> cart id
    carts: BTreeMap<i64, i64>,
    /// cart id -> (product_id -> quantity)
    cart_items: BTreeMap<i64, BTreeMap<i64, i32>>,
    orders: BTreeMap<i64, Order>,
    /// order id -> lines
    order_lines: BTreeMap<i64, Vec<OrderLine>>,
    payments: BTreeMap<i64, Payment>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn payment_by_reference_mut(&mut self, reference: &str) -> Option<&mut Payment> {
        self.payments
            .values_mut()
            .find(|p| p.payment_reference == reference)
    }
}

/// In-memory [`Store`]
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl Store for MemStore {
    // ==================== Products ====================

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        Ok(self.lock().products.values().cloned().collect())
    }

    async fn get_product(&self, product_id: i64) -> StoreResult<Option<Product>> {
        Ok(self.lock().products.get(&product_id).cloned())
    }

    async fn products_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<Product>> {
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }

    async fn search_products(&self, name: &str) -> StoreResult<Vec<Product>> {
        let needle = name.to_lowercase();
        Ok(self
            .lock()
            .products
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn create_product(&self, data: ProductCreate) -> StoreResult<Product> {
        let mut inner = self.lock();
        if inner
            .products
            .values()
            .any(|p| p.name.eq_ignore_ascii_case(&data.name))
        {
            return Err(StoreError::Duplicate(format!("product '{}'", data.name)));
        }

        let id = inner.next_id();
        let product = Product {
            id,
            name: data.name,
            description: data.description,
            price: data.price,
            stock_quantity: data.stock_quantity,
        };
        inner.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        product_id: i64,
        data: ProductUpdate,
    ) -> StoreResult<Option<Product>> {
        let mut inner = self.lock();
        if let Some(ref name) = data.name {
            if inner
                .products
                .values()
                .any(|p| p.id != product_id && p.name.eq_ignore_ascii_case(name))
            {
                return Err(StoreError::Duplicate(format!("product '{name}'")));
            }
        }

        let Some(product) = inner.products.get_mut(&product_id) else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            product.name = name;
        }
        if let Some(description) = data.description {
            product.description = Some(description);
        }
        if let Some(price) = data.price {
            product.price = price;
        }
        if let Some(stock) = data.stock_quantity {
            product.stock_quantity = stock;
        }
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, product_id: i64) -> StoreResult<bool> {
        Ok(self.lock().products.remove(&product_id).is_some())
    }

    // ==================== Inventory ledger ====================

    async fn decrement_stock(&self, lines: &[CartLine]) -> StoreResult<()> {
        let mut inner = self.lock();

        // Re-check every line before touching anything, so a shortage
        // leaves stock exactly as it was.
        for line in lines {
            let Some(product) = inner.products.get(&line.product_id) else {
                return Err(StoreError::NotFound("product"));
            };
            if product.stock_quantity < line.quantity {
                return Err(StoreError::InsufficientStock {
                    name: product.name.clone(),
                    requested: line.quantity,
                    available: product.stock_quantity,
                });
            }
        }

        for line in lines {
            if let Some(product) = inner.products.get_mut(&line.product_id) {
                product.stock_quantity -= line.quantity;
            }
        }
        Ok(())
    }

    async fn restore_stock(&self, lines: &[CartLine]) -> StoreResult<()> {
        let mut inner = self.lock();
        for line in lines {
            if let Some(product) = inner.products.get_mut(&line.product_id) {
                product.stock_quantity += line.quantity;
            }
        }
        Ok(())
    }

    // ==================== Carts ====================

    async fn get_or_create_cart(&self, user_id: i64) -> StoreResult<Cart> {
        let mut inner = self.lock();
        if let Some(&cart_id) = inner.carts.get(&user_id) {
            return Ok(Cart {
                id: cart_id,
                user_id,
            });
        }
        let cart_id = inner.next_id();
        inner.carts.insert(user_id, cart_id);
        inner.cart_items.insert(cart_id, BTreeMap::new());
        Ok(Cart {
            id: cart_id,
            user_id,
        })
    }

    async fn cart_lines(&self, user_id: i64) -> StoreResult<Option<Vec<CartLine>>> {
        let inner = self.lock();
        let Some(cart_id) = inner.carts.get(&user_id) else {
            return Ok(None);
        };
        let lines = inner
            .cart_items
            .get(cart_id)
            .map(|items| {
                items
                    .iter()
                    .map(|(&product_id, &quantity)| CartLine {
                        product_id,
                        quantity,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(lines))
    }

    async fn add_cart_item(&self, user_id: i64, product_id: i64, quantity: i32) -> StoreResult<()> {
        let mut inner = self.lock();
        let cart_id = match inner.carts.get(&user_id).copied() {
            Some(id) => id,
            None => {
                let id = inner.next_id();
                inner.carts.insert(user_id, id);
                id
            }
        };
        *inner
            .cart_items
            .entry(cart_id)
            .or_default()
            .entry(product_id)
            .or_insert(0) += quantity;
        Ok(())
    }

    async fn set_cart_item_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(&cart_id) = inner.carts.get(&user_id) else {
            return Ok(false);
        };
        let Some(items) = inner.cart_items.get_mut(&cart_id) else {
            return Ok(false);
        };
        if !items.contains_key(&product_id) {
            return Ok(false);
        }
        if quantity <= 0 {
            items.remove(&product_id);
        } else {
            items.insert(product_id, quantity);
        }
        Ok(true)
    }

    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(&cart_id) = inner.carts.get(&user_id) else {
            return Ok(false);
        };
        Ok(inner
            .cart_items
            .get_mut(&cart_id)
            .is_some_and(|items| items.remove(&product_id).is_some()))
    }

    async fn clear_cart(&self, user_id: i64) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(cart_id) = inner.carts.get(&user_id).copied() {
            if let Some(items) = inner.cart_items.get_mut(&cart_id) {
                items.clear();
            }
        }
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
        let mut inner = self.lock();
        let order_id = inner.next_id();
        let order = Order {
            id: order_id,
            user_id,
            total_amount: total,
            status: OrderStatus::Pending,
            created_at: now,
        };

        let stored_lines: Vec<OrderLine> = lines
            .iter()
            .map(|line| OrderLine {
                id: inner.next_id(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.price_at_purchase,
            })
            .collect();

        inner.orders.insert(order_id, order.clone());
        inner.order_lines.insert(order_id, stored_lines);
        Ok(order)
    }

    async fn delete_order(&self, order_id: i64) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.payments.retain(|_, p| p.order_id != order_id);
        inner.order_lines.remove(&order_id);
        inner.orders.remove(&order_id);
        Ok(())
    }

    async fn get_order(&self, order_id: i64) -> StoreResult<Option<Order>> {
        Ok(self.lock().orders.get(&order_id).cloned())
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(self.lock().orders.values().cloned().collect())
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }

    async fn order_lines(&self, order_id: i64) -> StoreResult<Vec<OrderLine>> {
        Ok(self
            .lock()
            .order_lines
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_order_status(&self, order_id: i64, status: OrderStatus) -> StoreResult<bool> {
        let mut inner = self.lock();
        match inner.orders.get_mut(&order_id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ==================== Payments ====================

    async fn insert_payment(
        &self,
        order_id: i64,
        provider: &str,
        reference: &str,
    ) -> StoreResult<Payment> {
        let mut inner = self.lock();
        let id = inner.next_id();
        let payment = Payment {
            id,
            order_id,
            payment_provider: provider.to_string(),
            status: PaymentStatus::Pending,
            payment_reference: reference.to_string(),
            paid_at: None,
        };
        inner.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn payment_by_reference(&self, reference: &str) -> StoreResult<Option<Payment>> {
        Ok(self
            .lock()
            .payments
            .values()
            .find(|p| p.payment_reference == reference)
            .cloned())
    }

    async fn payment_by_order(&self, order_id: i64) -> StoreResult<Option<Payment>> {
        Ok(self
            .lock()
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn complete_payment(&self, reference: &str, paid_at: i64) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(payment) = inner.payment_by_reference_mut(reference) else {
            return Ok(false);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(false);
        }
        payment.status = PaymentStatus::Completed;
        payment.paid_at = Some(paid_at);
        let order_id = payment.order_id;

        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.status = OrderStatus::Confirmed;
        }
        Ok(true)
    }

    async fn fail_payment(&self, reference: &str) -> StoreResult<Option<Order>> {
        let mut inner = self.lock();
        let Some(payment) = inner.payment_by_reference_mut(reference) else {
            return Ok(None);
        };
        let order_id = payment.order_id;

        let Some(order) = inner.orders.get_mut(&order_id) else {
            return Ok(None);
        };
        if order.status == OrderStatus::Cancelled {
            // Replayed failure event, nothing to do
            return Ok(None);
        }
        order.status = OrderStatus::Cancelled;
        let cancelled = order.clone();

        if let Some(payment) = inner.payment_by_reference_mut(reference) {
            payment.status = PaymentStatus::Failed;
            payment.paid_at = None;
        }
        Ok(Some(cancelled))
    }
}

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use shared::models::Product;
use shared::models::ProductCreate;

use crate::gateway::{GatewayError, PaymentGateway, PaymentIntent, WebhookEvent};
use crate::store::{MemStore, Store};

use super::*;

mod test_reconcile;

// ========================================================================
// Helpers
// ========================================================================

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn test_store() -> MemStore {
    MemStore::new()
}

async fn seed_product(store: &MemStore, name: &str, price: &str, stock: i32) -> Product {
    store
        .create_product(ProductCreate {
            name: name.to_string(),
            description: None,
            price: dec(price),
            stock_quantity: stock,
        })
        .await
        .unwrap()
}

async fn fill_cart(store: &MemStore, user_id: i64, items: &[(i64, i32)]) {
    for &(product_id, quantity) in items {
        store
            .add_cart_item(user_id, product_id, quantity)
            .await
            .unwrap();
    }
}

async fn stock_of(store: &MemStore, product_id: i64) -> i32 {
    store
        .get_product(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

/// Gateway double: hands out deterministic intents, or fails every call
/// when constructed with `failing()`.
struct MockGateway {
    fail_create: bool,
    counter: AtomicI64,
}

impl MockGateway {
    fn new() -> Self {
        Self {
            fail_create: false,
            counter: AtomicI64::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail_create: true,
            counter: AtomicI64::new(0),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        _amount_minor_units: i64,
        _currency: &str,
        order_id: i64,
    ) -> Result<PaymentIntent, GatewayError> {
        if self.fail_create {
            return Err(GatewayError::Request("gateway offline".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent {
            id: format!("pi_mock_{order_id}_{n}"),
            client_secret: format!("pi_mock_{order_id}_{n}_secret"),
        })
    }

    fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        Err(GatewayError::SignatureInvalid("not used in these tests"))
    }
}

/// Seed one product, fill the user's cart and place the order.
/// Returns (product, payment reference).
async fn place_simple_order(
    store: &MemStore,
    gateway: &MockGateway,
    user_id: i64,
    price: &str,
    stock: i32,
    quantity: i32,
) -> (Product, String) {
    let product = seed_product(store, &format!("Gadget {user_id}"), price, stock).await;
    fill_cart(store, user_id, &[(product.id, quantity)]).await;
    let response = place_order(store, gateway, "usd", user_id).await.unwrap();
    (product, response.payment_reference)
}

//! Order placement
//!
//! The placement sequence must look atomic from the outside: either the
//! order, its lines, the payment record, the stock decrement and the
//! cart clear are all visible, or none of them are. The gateway call
//! cannot join a local transaction, so every step after order creation
//! compensates in reverse order on failure.

use std::collections::HashMap;

use shared::models::{CartLine, NewOrderLine, PlaceOrderResponse, Product};
use shared::money;

use crate::gateway::{PROVIDER_STRIPE, PaymentGateway};
use crate::store::Store;

use super::OrderError;

/// Place an order from the user's current cart.
///
/// Steps: snapshot cart → availability check → total → order + lines →
/// payment intent → payment record → stock decrement → clear cart.
pub async fn place_order(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    currency: &str,
    user_id: i64,
) -> Result<PlaceOrderResponse, OrderError> {
    // 1. Snapshot the cart; a missing cart and an empty cart are the same
    //    from the buyer's point of view.
    let lines = store
        .cart_lines(user_id)
        .await?
        .ok_or(OrderError::EmptyCart)?;
    if lines.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    // 2. Availability check against current stock. Pure read: on any
    //    shortage nothing has been mutated yet.
    let products = load_products(store, &lines).await?;
    let issues = check_availability(&lines, &products);
    if !issues.is_empty() {
        return Err(OrderError::InsufficientStock { issues });
    }

    // 3. Total from current prices, captured per line for the order's
    //    immutable history.
    let order_lines: Vec<NewOrderLine> = lines
        .iter()
        .map(|line| NewOrderLine {
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_purchase: products[&line.product_id].price,
        })
        .collect();
    let total = money::order_total(
        order_lines
            .iter()
            .map(|l| (l.price_at_purchase, l.quantity)),
    );

    // 4. Durable order + lines (one transaction, status PENDING).
    let now = chrono::Utc::now().timestamp_millis();
    let order = store.insert_order(user_id, total, &order_lines, now).await?;

    // 5. Payment intent at the gateway. From here on every failure must
    //    undo what is already committed before surfacing.
    let amount = match money::to_minor_units(total) {
        Some(amount) => amount,
        None => {
            abandon_order(store, order.id).await;
            return Err(OrderError::InvalidRequest(format!(
                "order total out of range: {total}"
            )));
        }
    };
    let intent = match gateway.create_intent(amount, currency, order.id).await {
        Ok(intent) => intent,
        Err(err) => {
            abandon_order(store, order.id).await;
            return Err(err.into());
        }
    };

    if let Err(err) = store
        .insert_payment(order.id, PROVIDER_STRIPE, &intent.id)
        .await
    {
        abandon_order(store, order.id).await;
        return Err(err.into());
    }

    // 6. Reserve inventory. The ledger re-checks stock; a concurrent
    //    placement may have drained it since step 2.
    if let Err(err) = store.decrement_stock(&lines).await {
        abandon_order(store, order.id).await;
        return Err(err.into());
    }

    // 7. Consume the cart.
    if let Err(err) = store.clear_cart(user_id).await {
        if let Err(restore_err) = store.restore_stock(&lines).await {
            tracing::error!(order_id = order.id, error = %restore_err,
                "Failed to restore stock while unwinding placement");
        }
        abandon_order(store, order.id).await;
        return Err(err.into());
    }

    tracing::info!(
        order_id = order.id,
        user_id,
        total = %total,
        payment_reference = %intent.id,
        "Order placed"
    );

    Ok(PlaceOrderResponse {
        order_id: order.id,
        payment_client_secret: intent.client_secret,
        payment_reference: intent.id,
    })
}

/// Load the products referenced by the cart, keyed by id.
async fn load_products(
    store: &dyn Store,
    lines: &[CartLine],
) -> Result<HashMap<i64, Product>, OrderError> {
    let ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<i64, Product> = store
        .products_by_ids(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for line in lines {
        if !products.contains_key(&line.product_id) {
            return Err(OrderError::ProductNotFound(line.product_id));
        }
    }
    Ok(products)
}

/// One message per line whose requested quantity exceeds current stock.
fn check_availability(lines: &[CartLine], products: &HashMap<i64, Product>) -> Vec<String> {
    let mut issues = Vec::new();
    for line in lines {
        let product = &products[&line.product_id];
        if product.stock_quantity < line.quantity {
            issues.push(format!(
                "Product '{}' has insufficient stock. Requested: {}, Available: {}",
                product.name, line.quantity, product.stock_quantity
            ));
        }
    }
    issues
}

/// Roll back an order that failed mid-placement. Best effort: the
/// original error is what the caller surfaces.
async fn abandon_order(store: &dyn Store, order_id: i64) {
    if let Err(err) = store.delete_order(order_id).await {
        tracing::error!(order_id, error = %err, "Failed to roll back abandoned order");
    }
}

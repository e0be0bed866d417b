//! Payment reconciliation
//!
//! Invoked from the webhook receiver and the direct notification
//! endpoints. Payment and order status move together (one store
//! transaction); stock restoration uses the order's captured lines, not
//! the live cart, which was cleared at placement time.

use shared::models::{CartLine, OrderStatus};

use crate::store::Store;

use super::OrderError;

/// Mark a payment completed and confirm its order.
///
/// Idempotent: a replayed event finds the payment already settled and
/// does nothing.
pub async fn handle_payment_success(store: &dyn Store, reference: &str) -> Result<(), OrderError> {
    let reference = require_reference(reference)?;
    let payment = store
        .payment_by_reference(reference)
        .await?
        .ok_or_else(|| OrderError::PaymentNotFound(reference.to_string()))?;

    let paid_at = chrono::Utc::now().timestamp_millis();
    if store.complete_payment(reference, paid_at).await? {
        tracing::info!(
            order_id = payment.order_id,
            payment_reference = reference,
            "Payment completed, order confirmed"
        );
    } else {
        tracing::info!(
            payment_reference = reference,
            "Payment already settled, ignoring duplicate success event"
        );
    }
    Ok(())
}

/// Mark a payment failed, cancel its order and restore its stock.
///
/// Restoration runs exactly once per order: the store's cancel is a
/// compare-and-set on the order not yet being CANCELLED, and stock is
/// only restored when that transition actually happened.
pub async fn handle_payment_failure(store: &dyn Store, reference: &str) -> Result<(), OrderError> {
    let reference = require_reference(reference)?;
    store
        .payment_by_reference(reference)
        .await?
        .ok_or_else(|| OrderError::PaymentNotFound(reference.to_string()))?;

    match store.fail_payment(reference).await? {
        Some(order) => {
            let lines: Vec<CartLine> = store
                .order_lines(order.id)
                .await?
                .iter()
                .map(|l| CartLine {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect();
            store.restore_stock(&lines).await?;
            tracing::info!(
                order_id = order.id,
                payment_reference = reference,
                "Payment failed, order cancelled and stock restored"
            );
        }
        None => {
            tracing::info!(
                payment_reference = reference,
                "Order already cancelled, skipping stock restoration"
            );
        }
    }
    Ok(())
}

/// Administrative status override. No inventory or payment side effects.
pub async fn update_order_status(
    store: &dyn Store,
    order_id: i64,
    status: OrderStatus,
) -> Result<(), OrderError> {
    if store.set_order_status(order_id, status).await? {
        tracing::info!(order_id, status = status.as_db(), "Order status updated");
        Ok(())
    } else {
        Err(OrderError::OrderNotFound(order_id))
    }
}

fn require_reference(reference: &str) -> Result<&str, OrderError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(OrderError::InvalidRequest(
            "Payment reference cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

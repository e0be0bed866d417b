//! Reconciliation scenarios: success, failure, idempotence

use shared::models::{OrderStatus, PaymentStatus};

use super::*;

#[tokio::test]
async fn test_payment_success_confirms_order() {
    let store = test_store();
    let gateway = MockGateway::new();

    let (product, reference) = place_simple_order(&store, &gateway, 1, "10.00", 10, 2).await;

    handle_payment_success(&store, &reference).await.unwrap();

    let payment = store
        .payment_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.paid_at.is_some());

    let order = store.get_order(payment.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);

    // Stock stays reserved on success
    assert_eq!(stock_of(&store, product.id).await, 8);
}

#[tokio::test]
async fn test_payment_success_is_idempotent() {
    let store = test_store();
    let gateway = MockGateway::new();

    let (product, reference) = place_simple_order(&store, &gateway, 1, "10.00", 10, 2).await;

    handle_payment_success(&store, &reference).await.unwrap();
    let first = store
        .payment_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();

    // Replayed event is a no-op
    handle_payment_success(&store, &reference).await.unwrap();
    let second = store
        .payment_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(second.status, PaymentStatus::Completed);
    assert_eq!(second.paid_at, first.paid_at);
    let order = store.get_order(first.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(stock_of(&store, product.id).await, 8);
}

#[tokio::test]
async fn test_payment_failure_cancels_and_restores() {
    let store = test_store();
    let gateway = MockGateway::new();

    let (product, reference) = place_simple_order(&store, &gateway, 1, "10.00", 10, 2).await;
    assert_eq!(stock_of(&store, product.id).await, 8);

    handle_payment_failure(&store, &reference).await.unwrap();

    let payment = store
        .payment_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.paid_at.is_none());

    let order = store.get_order(payment.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    // Every line's stock is back to its pre-order value
    assert_eq!(stock_of(&store, product.id).await, 10);
}

#[tokio::test]
async fn test_payment_failure_replay_does_not_double_restore() {
    let store = test_store();
    let gateway = MockGateway::new();

    let (product, reference) = place_simple_order(&store, &gateway, 1, "10.00", 10, 2).await;

    handle_payment_failure(&store, &reference).await.unwrap();
    assert_eq!(stock_of(&store, product.id).await, 10);

    // Replayed failure event must not restore again
    handle_payment_failure(&store, &reference).await.unwrap();
    assert_eq!(stock_of(&store, product.id).await, 10);
}

#[tokio::test]
async fn test_failure_restores_captured_lines_not_live_cart() {
    let store = test_store();
    let gateway = MockGateway::new();

    let x = seed_product(&store, "Product X", "10.00", 10).await;
    let y = seed_product(&store, "Product Y", "15.00", 10).await;
    fill_cart(&store, 1, &[(x.id, 3)]).await;

    let response = place_order(&store, &gateway, "usd", 1).await.unwrap();
    assert_eq!(stock_of(&store, x.id).await, 7);

    // The cart was cleared at placement; the user starts a new one
    fill_cart(&store, 1, &[(y.id, 5)]).await;

    handle_payment_failure(&store, &response.payment_reference)
        .await
        .unwrap();

    // Only the ordered product is restored; the new cart is untouched
    assert_eq!(stock_of(&store, x.id).await, 10);
    assert_eq!(stock_of(&store, y.id).await, 10);
    assert_eq!(store.cart_lines(1).await.unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_reference_is_not_found() {
    let store = test_store();

    let err = handle_payment_success(&store, "pi_missing").await.unwrap_err();
    assert!(matches!(err, OrderError::PaymentNotFound(_)));

    let err = handle_payment_failure(&store, "pi_missing").await.unwrap_err();
    assert!(matches!(err, OrderError::PaymentNotFound(_)));
}

#[tokio::test]
async fn test_blank_reference_is_rejected() {
    let store = test_store();

    let err = handle_payment_success(&store, "   ").await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));

    let err = handle_payment_failure(&store, "").await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_update_order_status() {
    let store = test_store();
    let gateway = MockGateway::new();

    let (product, _) = place_simple_order(&store, &gateway, 1, "10.00", 10, 2).await;
    let order_id = store.list_orders().await.unwrap()[0].id;

    update_order_status(&store, order_id, OrderStatus::Confirmed)
        .await
        .unwrap();
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);

    // Administrative override has no inventory side effects
    assert_eq!(stock_of(&store, product.id).await, 8);
}

#[tokio::test]
async fn test_update_order_status_unknown_order() {
    let store = test_store();

    let err = update_order_status(&store, 999, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderNotFound(999)));
}

//! Order workflow
//!
//! Converts a user's cart into a durable order with reserved inventory
//! and an open payment intent, then reconciles asynchronous payment
//! outcomes back into order and inventory state.

mod error;
mod placement;
mod reconcile;

#[cfg(test)]
mod tests;

pub use error::OrderError;
pub use placement::place_order;
pub use reconcile::{handle_payment_failure, handle_payment_success, update_order_status};

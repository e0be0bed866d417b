//! store-server — online store backend
//!
//! Long-running service that:
//! - Serves the product catalog and per-user shopping carts
//! - Converts carts into durable orders with reserved inventory
//! - Creates payment intents against the Stripe REST API
//! - Reconciles asynchronous payment outcomes (webhooks and direct
//!   notifications) back into order and inventory state

pub mod api;
pub mod config;
pub mod gateway;
pub mod orders;
pub mod state;
pub mod store;

//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::gateway::{PaymentGateway, StripeGateway};
use crate::store::{PgStore, Store};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    /// ISO currency code used for payment intents
    pub currency: String,
}

impl AppState {
    /// Create a new AppState backed by PostgreSQL and Stripe
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let gateway = StripeGateway::new(
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
        );

        Ok(Self {
            store: Arc::new(PgStore::new(pool)),
            gateway: Arc::new(gateway),
            currency: config.currency.clone(),
        })
    }
}

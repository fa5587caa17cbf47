//! Application state for academy-cloud

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{RateLimiter, Shield};
use crate::config::Config;
use crate::db::PgStore;
use crate::error::BoxError;
use crate::services::assets::AssetJanitor;
use crate::storage::{ObjectStore, S3Store};
use crate::store::Store;
use crate::stripe::{PaymentProvider, StripeClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Persistence (PostgreSQL in production)
    pub store: Arc<dyn Store>,
    /// Payment provider (Stripe)
    pub payments: Arc<dyn PaymentProvider>,
    /// Object storage (S3-compatible)
    pub objects: Arc<dyn ObjectStore>,
    /// Rate limiting and bot detection
    pub shield: Arc<dyn Shield>,
    /// Fixed-window limiter behind `shield`, kept for periodic cleanup
    pub rate_limiter: RateLimiter,
    /// Deletes orphaned objects after committed mutations
    pub janitor: AssetJanitor,
    /// JWT secret shared with the auth service
    pub jwt_secret: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Currency for course prices
    pub stripe_currency: String,
    /// Redirect after a successful checkout
    pub payment_success_url: String,
    /// Redirect after a cancelled checkout
    pub payment_cancel_url: String,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let s3 = match &config.s3_endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                S3Client::from_conf(s3_config)
            }
            None => S3Client::new(&aws_config),
        };
        let objects: Arc<dyn ObjectStore> =
            Arc::new(S3Store::new(s3, &config.s3_bucket, &config.s3_public_host));

        let rate_limiter = RateLimiter::new();

        Ok(Self {
            store: Arc::new(PgStore::new(pool)),
            payments: Arc::new(StripeClient::new(&config.stripe_secret_key)),
            janitor: AssetJanitor::detached(objects.clone()),
            objects,
            shield: Arc::new(rate_limiter.clone()),
            rate_limiter,
            jwt_secret: config.jwt_secret.clone(),
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            stripe_currency: config.stripe_currency.clone(),
            payment_success_url: config.payment_success_url(),
            payment_cancel_url: config.payment_cancel_url(),
        })
    }
}

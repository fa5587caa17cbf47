//! Cloud server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cloud server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// HS256 secret shared with the auth service
    pub jwt_secret: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// ISO currency for course prices
    pub stripe_currency: String,
    /// Public web app base URL (checkout redirects)
    pub app_url: String,
    /// S3 bucket holding course assets
    pub s3_bucket: String,
    /// Host suffix for public object URLs: https://{bucket}.{host}/{key}
    pub s3_public_host: String,
    /// Custom S3-compatible endpoint
    pub s3_endpoint_url: Option<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_currency: std::env::var("STRIPE_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|_| "usd".into()),
            app_url: std::env::var("APP_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            s3_bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "academy-assets".into()),
            s3_public_host: std::env::var("S3_PUBLIC_HOST")
                .unwrap_or_else(|_| "t3.storage.dev".into()),
            s3_endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }

    /// Checkout success redirect
    pub fn payment_success_url(&self) -> String {
        format!("{}/payment/success", self.app_url)
    }

    /// Checkout cancel redirect
    pub fn payment_cancel_url(&self) -> String {
        format!("{}/payment/cancel", self.app_url)
    }
}

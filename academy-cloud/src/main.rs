//! academy-cloud: course platform backend
//!
//! Long-running service that:
//! - Serves the public course catalog
//! - Runs checkout and enrollment against Stripe
//! - Tracks learner progress per lesson
//! - Lets admins edit, reorder and upload course content

mod api;
mod auth;
mod config;
mod db;
mod error;
mod services;
mod state;
mod storage;
mod store;
mod stripe;
#[cfg(test)]
mod testing;

use config::Config;
use error::BoxError;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "academy_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting academy-cloud (env: {})", config.environment);

    let state = AppState::new(&config).await?;
    let app = api::create_router(state.clone());

    // Periodic rate limiter cleanup (every 5 minutes)
    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup().await;
        }
    });

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("academy-cloud HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

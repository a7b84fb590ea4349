use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use storefront_payments::config::Config;
use storefront_payments::signature::SquareVerifier;
use storefront_payments::store::Database;
use storefront_payments::stripe::StripeClient;
use storefront_payments::webhook::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let db = Database::new(&config.database_url).await?;
    let stripe = StripeClient::new(&config.stripe_secret_key, &config.stripe_api_base);
    let verifier = SquareVerifier::new(
        &config.square_webhook_secret,
        &config.webhook_fallback_path,
    );

    // Initialize database
    db.migrate().await?;

    let state = AppState {
        config: config.clone(),
        db,
        stripe,
        verifier,
    };

    let app = router(Arc::new(state)).layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

// config.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    /// Shared secret for Square webhook signatures. May be empty when the
    /// deployment has not been provisioned yet; the webhook handler answers
    /// 500 in that case rather than treating requests as authenticated.
    pub square_webhook_secret: String,
    /// Publicly configured webhook path, substituted when the fronting proxy
    /// strips the sub-path before it reaches us.
    pub webhook_fallback_path: String,
    pub database_url: String,
    pub bind_address: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Config {
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("STRIPE_SECRET_KEY not set"))?,
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            square_webhook_secret: env::var("SQUARE_WEBHOOK_SECRET").unwrap_or_default(),
            webhook_fallback_path: env::var("WEBHOOK_FALLBACK_PATH")
                .unwrap_or_else(|_| "/squareWebhook".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/storefront".to_string()),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

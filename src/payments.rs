// payments.rs
//
// The payment-creation callable: validates the cart, checks availability
// against the catalog, and creates the provider payment intent whose client
// secret the browser-side SDK uses to complete the charge.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PaymentError;
use crate::reconcile::check_availability;
use crate::stripe::IntentRequest;
use crate::webhook::AppState;
use crate::LineItem;

fn default_currency() -> String {
    "gbp".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// JSON-encoded array of `{productId, qty}`.
    pub items_json: String,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Validates amount and cart shape before anything touches the database or
/// the provider. Returns the decoded line items.
pub fn validate_request(request: &CreatePaymentRequest) -> Result<Vec<LineItem>, PaymentError> {
    if request.amount <= 0 {
        return Err(PaymentError::InvalidAmount);
    }

    let items: Vec<LineItem> = serde_json::from_str(&request.items_json)
        .map_err(|e| PaymentError::InvalidCart(format!("items are not valid JSON: {}", e)))?;

    if items.is_empty() {
        return Err(PaymentError::InvalidCart("cart is empty".to_string()));
    }
    if let Some(bad) = items.iter().find(|item| item.qty <= 0) {
        return Err(PaymentError::InvalidCart(format!(
            "{}: quantity must be positive",
            bad.product_id
        )));
    }

    Ok(items)
}

/// Human-readable one-liner for order bookkeeping, e.g. `oak-table x3; bench x1`.
pub fn summarize(items: &[LineItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} x{}", item.product_id, item.qty))
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, PaymentError> {
    let items = validate_request(&request)?;

    // Every shortfall is reported at once, before the customer is charged.
    check_availability(&state.db, &items).await?;

    let intent = state
        .stripe
        .create_payment_intent(&IntentRequest {
            amount: request.amount,
            currency: request.currency.clone(),
            items_json: request.items_json.clone(),
            summary: summarize(&items),
            email: request.user_email.clone(),
            name: request.user_name.clone(),
        })
        .await?;

    let client_secret = intent.client_secret.ok_or_else(|| PaymentError::Provider {
        kind: None,
        code: None,
        request_id: None,
        message: "provider response had no client secret".to_string(),
    })?;

    info!(payment_intent = %intent.id, amount = request.amount, "payment intent created");
    Ok(Json(CreatePaymentResponse {
        client_secret,
        payment_intent_id: intent.id,
    }))
}

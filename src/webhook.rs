// webhook.rs
//
// HTTP entry point for payment-provider webhook deliveries. Requests are
// authenticated with the Square HMAC signature before any event parsing or
// store access happens; unrecognized event types are acknowledged and
// dropped so new provider event types never cause retry storms.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::payments::create_payment_intent;
use crate::reconcile;
use crate::signature::{SquareVerifier, SIGNATURE_HEADER};
use crate::store::Database;
use crate::stripe::StripeClient;
use crate::{Address, Customer, LineItem, OrderRecord};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub stripe: StripeClient,
    pub verifier: SquareVerifier,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // The fronting proxy sometimes collapses the webhook sub-path to the
        // bare root, so both spellings reach the same handler.
        .route("/squareWebhook", post(handle_webhook).get(probe))
        .route("/", post(handle_webhook).get(probe))
        .route("/createPaymentIntent", post(create_payment_intent))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Provider health-check probes (GET/HEAD) are not security-relevant.
async fn probe() -> &'static str {
    "ok"
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now()
    }))
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // A POST with no signature header at all never reaches the verifier.
    if !headers.contains_key(SIGNATURE_HEADER) {
        warn!("webhook request without signature header");
        return (StatusCode::BAD_REQUEST, "missing signature").into_response();
    }

    if !state.verifier.has_secret() {
        error!("webhook secret is not configured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "webhook secret not configured")
            .into_response();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let protocol = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");

    let result = state
        .verifier
        .verify(&headers, &body, host, protocol, uri.path());
    if !result.valid {
        warn!(
            code = ?result.code,
            path = %result.context.normalized_path,
            "webhook signature verification failed"
        );
        return (StatusCode::BAD_REQUEST, "invalid signature").into_response();
    }

    // A verified body that does not parse is a hard error, not a retry.
    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "verified webhook body failed to parse");
            return (StatusCode::BAD_REQUEST, "invalid payload").into_response();
        }
    };

    match event {
        WebhookEvent::PaymentCompleted(order) => {
            // The provider retries on non-2xx; a reconciliation failure is
            // logged for the operator, never bounced back as an error that
            // would redeliver the event.
            match reconcile::reconcile(&state.db, &order).await {
                Ok(outcome) if outcome.fully_applied() => {
                    info!(order_id = %order.id, "payment reconciled");
                }
                Ok(outcome) => {
                    error!(
                        order_id = %order.id,
                        failed = outcome.failed.len(),
                        "payment reconciled with item failures"
                    );
                }
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "failed to persist order");
                }
            }
        }
        WebhookEvent::Ignored(kind) => {
            info!(event_type = kind.as_deref().unwrap_or("<none>"), "ignoring webhook event");
        }
    }

    Json(serde_json::json!({ "received": true })).into_response()
}

/// Inbound webhook body, keyed by `event.type`. Anything not recognized as a
/// completed payment folds into `Ignored` and is acknowledged as a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    PaymentCompleted(OrderRecord),
    Ignored(Option<String>),
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    metadata: IntentMetadata,
    #[serde(default)]
    receipt_email: Option<String>,
    #[serde(default)]
    shipping: Option<Shipping>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentMetadata {
    #[serde(default)]
    items: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Shipping {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct SquarePayment {
    id: String,
    status: String,
    #[serde(default)]
    amount_money: AmountMoney,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    buyer_email_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AmountMoney {
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
}

/// Parses a verified webhook body into the event union. Only a body that is
/// not JSON at all, or a recognized event type with a malformed object, is
/// an error; unknown types are valid `Ignored` events.
pub fn parse_event(raw_body: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    let value: Value = serde_json::from_slice(raw_body)?;
    let kind = value.get("type").and_then(Value::as_str);

    match kind {
        Some("payment_intent.succeeded") => {
            let object = value.pointer("/data/object").cloned().unwrap_or(Value::Null);
            let intent: PaymentIntentObject = serde_json::from_value(object)?;
            Ok(WebhookEvent::PaymentCompleted(order_from_intent(intent)))
        }
        Some("payment.updated") => {
            let object = value
                .pointer("/data/object/payment")
                .cloned()
                .unwrap_or(Value::Null);
            let payment: SquarePayment = serde_json::from_value(object)?;
            if payment.status == "COMPLETED" {
                Ok(WebhookEvent::PaymentCompleted(order_from_square(payment)))
            } else {
                Ok(WebhookEvent::Ignored(Some("payment.updated".to_string())))
            }
        }
        other => Ok(WebhookEvent::Ignored(other.map(String::from))),
    }
}

/// Decodes a cart blob attached at payment creation. Items with a
/// non-positive quantity are dropped: the quantities come back out of
/// provider metadata, and a negative qty fed into the decrement would grow
/// stock instead of reducing it.
fn decode_items(raw: &str) -> Option<Vec<LineItem>> {
    let items: Vec<LineItem> = serde_json::from_str(raw).ok()?;
    Some(items.into_iter().filter(|item| item.qty > 0).collect())
}

/// The cart was attached to the intent as opaque metadata at creation time;
/// a metadata blob that no longer parses yields an order with no items
/// rather than a dropped event.
fn order_from_intent(intent: PaymentIntentObject) -> OrderRecord {
    let items = intent
        .metadata
        .items
        .as_deref()
        .and_then(decode_items)
        .unwrap_or_default();

    let customer = match (&intent.receipt_email, &intent.shipping) {
        (None, None) => None,
        (email, shipping) => Some(Customer {
            name: shipping.as_ref().and_then(|s| s.name.clone()),
            email: email.clone(),
            address: shipping.as_ref().and_then(|s| s.address.clone()),
        }),
    };

    OrderRecord {
        id: intent.id,
        amount: intent.amount,
        currency: intent.currency,
        status: intent.status,
        created: Utc
            .timestamp_opt(intent.created, 0)
            .single()
            .unwrap_or_else(Utc::now),
        items_summary: intent.metadata.summary.unwrap_or_default(),
        items,
        customer,
    }
}

/// Square payments carry the cart in the free-form note, written there at
/// payment creation. A note that is not line-item JSON is kept as the
/// human-readable summary instead.
fn order_from_square(payment: SquarePayment) -> OrderRecord {
    let (items, items_summary) = match payment.note.as_deref().and_then(decode_items) {
        Some(items) => (items, String::new()),
        None => (Vec::new(), payment.note.clone().unwrap_or_default()),
    };

    let customer = payment.buyer_email_address.map(|email| Customer {
        name: None,
        email: Some(email),
        address: None,
    });

    OrderRecord {
        id: payment.id,
        amount: payment.amount_money.amount,
        currency: payment.amount_money.currency.to_lowercase(),
        status: payment.status,
        created: payment.created_at.unwrap_or_else(Utc::now),
        items_summary,
        items,
        customer,
    }
}

// stripe.rs
use reqwest::{header, Client};
use serde::Deserialize;

use crate::error::PaymentError;

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
}

/// Fields sent to the provider when creating a payment intent. The cart is
/// attached as opaque metadata so the completed-payment webhook can read it
/// back for reconciliation.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount: i64,
    pub currency: String,
    pub items_json: String,
    pub summary: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ProviderErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: &str, api_base: &str) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", secret_key)).unwrap(),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("storefront-payments/1.0"),
        );

        let client = Client::builder().default_headers(headers).build().unwrap();

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a payment intent. Provider rejections keep the diagnostic
    /// fields (type, code, request id) for support follow-up.
    pub async fn create_payment_intent(
        &self,
        request: &IntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.api_base);

        let mut form = vec![
            ("amount", request.amount.to_string()),
            ("currency", request.currency.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[items]", request.items_json.clone()),
            ("metadata[summary]", request.summary.clone()),
            ("description", request.summary.clone()),
        ];
        if let Some(email) = &request.email {
            form.push(("receipt_email", email.clone()));
        }
        if let Some(name) = &request.name {
            form.push(("shipping[name]", name.clone()));
        }

        let response = self.client.post(&url).form(&form).send().await?;

        let request_id = response
            .headers()
            .get("request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if !response.status().is_success() {
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            return Err(PaymentError::Provider {
                kind: envelope.error.kind,
                code: envelope.error.code,
                request_id,
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "payment provider returned an error".to_string()),
            });
        }

        Ok(response.json().await?)
    }
}

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_payments::error::PaymentError;
use storefront_payments::stripe::{IntentRequest, StripeClient};

fn intent_request() -> IntentRequest {
    IntentRequest {
        amount: 45000,
        currency: "gbp".to_string(),
        items_json: r#"[{"productId":"p1","qty":3}]"#.to_string(),
        summary: "p1 x3".to_string(),
        email: Some("buyer@example.com".to_string()),
        name: None,
    }
}

#[tokio::test]
async fn creates_an_intent_and_returns_the_client_secret() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_string_contains("amount=45000"))
        .and(body_string_contains("receipt_email=buyer%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_1",
            "client_secret": "pi_1_secret_abc",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", &server.uri());
    let intent = client.create_payment_intent(&intent_request()).await.unwrap();

    assert_eq!(intent.id, "pi_1");
    assert_eq!(intent.client_secret.as_deref(), Some("pi_1_secret_abc"));
}

#[tokio::test]
async fn provider_rejection_preserves_diagnostics() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header("request-id", "req_test_42")
                .set_body_json(json!({
                    "error": {
                        "type": "card_error",
                        "code": "card_declined",
                        "message": "Your card was declined."
                    }
                })),
        )
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", &server.uri());
    let err = client.create_payment_intent(&intent_request()).await.unwrap_err();

    match err {
        PaymentError::Provider {
            kind,
            code,
            request_id,
            message,
        } => {
            assert_eq!(kind.as_deref(), Some("card_error"));
            assert_eq!(code.as_deref(), Some("card_declined"));
            assert_eq!(request_id.as_deref(), Some("req_test_42"));
            assert_eq!(message, "Your card was declined.");
        }
        other => panic!("expected a provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn undecodable_error_body_still_maps_to_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream blew up"))
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", &server.uri());
    let err = client.create_payment_intent(&intent_request()).await.unwrap_err();
    assert_eq!(err.code(), "provider-error");
}

// HTTP-level dispatcher tests. The database pool is built lazily and these
// request paths are all rejected or acknowledged before any query runs, so
// no live Postgres is needed.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use storefront_payments::config::Config;
use storefront_payments::signature::{sign, SignatureVersion, SquareVerifier};
use storefront_payments::store::Database;
use storefront_payments::stripe::StripeClient;
use storefront_payments::webhook::{router, AppState};

const HOST: &str = "us-central1-nature-and-steel.cloudfunctions.net";
const SECRET: &str = "test-secret";

fn test_config(secret: &str) -> Config {
    Config {
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_api_base: "https://api.stripe.com".to_string(),
        square_webhook_secret: secret.to_string(),
        webhook_fallback_path: "/squareWebhook".to_string(),
        database_url: "postgresql://localhost/storefront_test".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
    }
}

fn app(secret: &str) -> axum::Router {
    let config = test_config(secret);
    let db = Database::connect_lazy(&config.database_url).unwrap();
    let stripe = StripeClient::new(&config.stripe_secret_key, &config.stripe_api_base);
    let verifier = SquareVerifier::new(secret, &config.webhook_fallback_path);
    router(Arc::new(AppState {
        config,
        db,
        stripe,
        verifier,
    }))
}

fn signed_url() -> String {
    format!("https://{}/squareWebhook", HOST)
}

#[tokio::test]
async fn get_probe_returns_ok() {
    let response = app(SECRET)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/squareWebhook")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn post_without_signature_header_is_400() {
    let response = app(SECRET)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/squareWebhook")
                .header("host", HOST)
                .body(Body::from(r#"{"type":"payment.updated"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_with_wrong_signature_is_400() {
    let response = app(SECRET)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/squareWebhook")
                .header("host", HOST)
                .header("x-square-hmacsha256-signature", "bm90LXRoZS1zaWduYXR1cmU=")
                .body(Body::from(r#"{"type":"payment.updated"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unconfigured_secret_is_500() {
    let response = app("")
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/squareWebhook")
                .header("host", HOST)
                .header("x-square-hmacsha256-signature", "bm90LXRoZS1zaWduYXR1cmU=")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn verified_unknown_event_is_acknowledged() {
    let body = r#"{"type":"inventory.count.updated","data":{}}"#;
    let signature = sign(SECRET, SignatureVersion::V1, None, &signed_url(), body.as_bytes());

    let response = app(SECRET)
        .oneshot(
            Request::builder()
                .method("POST")
                // Proxy collapsed the sub-path; the canonicalizer restores it.
                .uri("/")
                .header("host", HOST)
                .header("x-square-hmacsha256-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["received"], true);
}

#[tokio::test]
async fn verified_unparseable_body_is_400() {
    let body = "{not json";
    let signature = sign(SECRET, SignatureVersion::V1, None, &signed_url(), body.as_bytes());

    let response = app(SECRET)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/squareWebhook")
                .header("host", HOST)
                .header("x-square-hmacsha256-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn v2_signature_with_sent_at_is_accepted() {
    let body = r#"{"type":"inventory.count.updated"}"#;
    let sent_at = "2026-01-03T21:15:00Z";
    let signature = sign(
        SECRET,
        SignatureVersion::V2,
        Some(sent_at),
        &signed_url(),
        body.as_bytes(),
    );

    let response = app(SECRET)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/squareWebhook")
                .header("host", HOST)
                .header("x-square-hmacsha256-signature", signature)
                .header("x-square-signature-version", "2")
                .header("x-square-sent-at", sent_at)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

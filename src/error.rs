// error.rs
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// One line item the cart cannot be fulfilled for. `available` is `None`
/// when the product no longer exists in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub product_id: String,
    pub requested: i64,
    pub available: Option<i64>,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.available {
            Some(available) => write!(
                f,
                "{}: requested {}, only {} in stock",
                self.product_id, self.requested, available
            ),
            None => write!(f, "{}: no longer available", self.product_id),
        }
    }
}

fn join_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(Shortfall::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount must be a positive integer in minor currency units")]
    InvalidAmount,

    #[error("invalid cart: {0}")]
    InvalidCart(String),

    /// Aggregates every offending line item so the caller can show the whole
    /// problem at once instead of one item per attempt.
    #[error("some items cannot be fulfilled: {}", join_shortfalls(.0))]
    OutOfStock(Vec<Shortfall>),

    #[error("payment provider rejected the request: {message}")]
    Provider {
        kind: Option<String>,
        code: Option<String>,
        request_id: Option<String>,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl PaymentError {
    /// Stable machine-readable code, independent of the detail message.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::InvalidAmount => "invalid-amount",
            PaymentError::InvalidCart(_) => "invalid-cart",
            PaymentError::OutOfStock(_) => "out-of-stock",
            PaymentError::Provider { .. } => "provider-error",
            PaymentError::Database(_) => "database-error",
            PaymentError::Http(_) => "provider-unreachable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PaymentError::InvalidAmount | PaymentError::InvalidCart(_) => StatusCode::BAD_REQUEST,
            PaymentError::OutOfStock(_) => StatusCode::CONFLICT,
            PaymentError::Provider { .. } | PaymentError::Http(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code(),
            "detail": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_stock_lists_every_offending_item() {
        let err = PaymentError::OutOfStock(vec![
            Shortfall {
                product_id: "oak-table".to_string(),
                requested: 3,
                available: Some(1),
            },
            Shortfall {
                product_id: "walnut-chair".to_string(),
                requested: 1,
                available: None,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("oak-table: requested 3, only 1 in stock"));
        assert!(msg.contains("walnut-chair: no longer available"));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(PaymentError::InvalidAmount.code(), "invalid-amount");
        assert_eq!(PaymentError::OutOfStock(vec![]).code(), "out-of-stock");
        assert_eq!(PaymentError::InvalidAmount.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PaymentError::OutOfStock(vec![]).status(), StatusCode::CONFLICT);
    }
}

// lib.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod payments;
pub mod reconcile;
pub mod signature;
pub mod store;
pub mod stripe;
pub mod webhook;

/// One line of a customer's cart, as attached to the payment as opaque
/// metadata at creation time and read back out of the completed-payment event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<Address>,
}

/// Persisted record of a completed payment. `id` is the provider's payment
/// identifier and doubles as the idempotency key: redelivery of the same
/// event upserts the same row rather than creating a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub created: DateTime<Utc>,
    pub items_summary: String,
    pub items: Vec<LineItem>,
    pub customer: Option<Customer>,
}

// reconcile.rs
//
// Turns a verified payment-completed event into a persisted order plus a
// consistent inventory decrement, safe under at-least-once delivery.

use tracing::{error, info};

use crate::error::{PaymentError, Shortfall};
use crate::store::{Database, ProductStock, StockOutcome};
use crate::{LineItem, OrderRecord};

#[derive(Debug, Clone)]
pub struct AppliedItem {
    pub item: LineItem,
    pub outcome: StockOutcome,
}

#[derive(Debug, Clone)]
pub struct FailedItem {
    pub item: LineItem,
    pub error: String,
}

/// Explicit batch result of a reconciliation run. One item's failure never
/// aborts the remaining items, so both halves can be populated at once.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub applied: Vec<AppliedItem>,
    pub failed: Vec<FailedItem>,
}

impl ReconcileOutcome {
    pub fn fully_applied(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upserts the order record, then applies each line item in its own
/// transaction. The upsert is the idempotency boundary: redelivery of the
/// same event rewrites the same row. Per-item inventory failures are logged
/// and collected rather than propagated, since the customer has already paid
/// and partial stock updates must not block the rest.
pub async fn reconcile(
    db: &Database,
    order: &OrderRecord,
) -> Result<ReconcileOutcome, sqlx::Error> {
    db.upsert_order(order).await?;
    info!(order_id = %order.id, items = order.items.len(), "order persisted");

    let mut outcome = ReconcileOutcome::default();
    for item in &order.items {
        match db.apply_line_item(item).await {
            Ok(stock) => outcome.applied.push(AppliedItem {
                item: item.clone(),
                outcome: stock,
            }),
            Err(e) => {
                error!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    error = %e,
                    "inventory update failed for line item"
                );
                outcome.failed.push(FailedItem {
                    item: item.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

/// Classifies one requested line item against its current stock position.
/// Untracked pieces are unique, so anything beyond qty 1 is a shortfall.
fn classify(item: &LineItem, stock: ProductStock) -> Option<Shortfall> {
    match stock {
        ProductStock::Missing => Some(Shortfall {
            product_id: item.product_id.clone(),
            requested: item.qty,
            available: None,
        }),
        ProductStock::Tracked(available) if available < item.qty => Some(Shortfall {
            product_id: item.product_id.clone(),
            requested: item.qty,
            available: Some(available),
        }),
        ProductStock::Untracked if item.qty > 1 => Some(Shortfall {
            product_id: item.product_id.clone(),
            requested: item.qty,
            available: Some(1),
        }),
        _ => None,
    }
}

/// Pre-payment availability check. Every offending item is collected before
/// failing so the caller can present the complete list, not just the first.
pub async fn check_availability(db: &Database, items: &[LineItem]) -> Result<(), PaymentError> {
    let mut shortfalls = Vec::new();
    for item in items {
        let stock = db.product_stock(&item.product_id).await?;
        if let Some(shortfall) = classify(item, stock) {
            shortfalls.push(shortfall);
        }
    }

    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(PaymentError::OutOfStock(shortfalls))
    }
}

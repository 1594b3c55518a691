use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Order, OrderLine, Product};
use crate::store::OrderStore;
use shared::CustomerDetails;

/// Shown in place of a catalog entry that was deleted after the order
/// captured its line.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// An order joined with its lines and the current catalog rows, ready for
/// rendering or notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer: CustomerDetails,
    pub status: String,
    pub payment_reference: Option<String>,
    pub notified: bool,
    pub total_amount: BigDecimal,
    pub lines: Vec<FullOrderLine>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullOrderLine {
    pub product_id: Uuid,
    /// Current catalog name, or the placeholder when the product is gone.
    pub name: String,
    pub image: Option<String>,
    /// What the catalog charges today. Display only; billing stays on `price`.
    pub current_price: Option<BigDecimal>,
    /// Unit price captured at checkout.
    pub price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
}

#[derive(Clone)]
pub struct OrderAssembler {
    store: Arc<dyn OrderStore>,
}

impl OrderAssembler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Loads the order header, its lines, and whatever catalog rows still
    /// exist, then joins them. Missing products degrade to placeholders
    /// instead of failing the order.
    pub async fn hydrate(&self, order_id: Uuid) -> Result<FullOrder, StoreError> {
        let order = self.store.get_order(order_id).await?;
        let lines = self.store.load_lines(order_id).await?;
        if lines.is_empty() {
            warn!(
                "Order {} has no line items, rendering an empty summary",
                order.order_number
            );
        }
        let product_ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
        let products = if product_ids.is_empty() {
            Vec::new()
        } else {
            self.store.load_products(&product_ids).await?
        };
        Ok(assemble(order, lines, products))
    }
}

/// Pure join of the three row sets. Line totals come from the captured unit
/// price, never from the current catalog price.
pub fn assemble(order: Order, lines: Vec<OrderLine>, products: Vec<Product>) -> FullOrder {
    let catalog: HashMap<Uuid, Product> = products.into_iter().map(|p| (p.id, p)).collect();
    let lines = lines
        .into_iter()
        .map(|line| {
            let product = catalog.get(&line.product_id);
            let line_total = &line.price * BigDecimal::from(line.quantity);
            FullOrderLine {
                product_id: line.product_id,
                name: product
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
                image: product.and_then(|p| p.image.clone()),
                current_price: product.map(|p| p.price.clone()),
                price: line.price,
                quantity: line.quantity,
                line_total,
            }
        })
        .collect();

    let customer = order.customer();
    FullOrder {
        id: order.id,
        order_number: order.order_number,
        customer,
        status: order.status,
        payment_reference: order.payment_reference,
        notified: order.notified,
        total_amount: order.total_amount,
        lines,
        created_at: order.created_at,
    }
}

use bigdecimal::rounding::RoundingMode;
use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assembler::OrderAssembler;
use crate::error::{CheckoutError, StoreError};
use crate::notify::NotificationDispatcher;
use crate::store::{LineInput, OrderStore};
use shared::{CustomerDetails, NotificationResult};

/// One cart line as submitted by the storefront client. The price is the
/// client's asking price and gets re-validated and rescaled before it is
/// trusted.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub price: f64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub order_number: String,
}

fn to_money(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    BigDecimal::try_from(value)
        .ok()
        .map(|amount| amount.with_scale_round(2, RoundingMode::HalfUp))
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn OrderStore>,
    assembler: OrderAssembler,
    dispatcher: Arc<NotificationDispatcher>,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        assembler: OrderAssembler,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            assembler,
            dispatcher,
        }
    }

    /// Validates the cart, persists the order atomically, and hands the
    /// confirmation to a detached task. The receipt comes back as soon as the
    /// order is durable; notification outcome never changes it.
    pub async fn checkout(
        &self,
        customer: CustomerDetails,
        items: Vec<CartLine>,
        submitted_total: Option<f64>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::Invalid("cart has no items".into()));
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut total = BigDecimal::from(0);
        for item in &items {
            if item.quantity <= 0 {
                return Err(CheckoutError::Invalid(format!(
                    "quantity must be positive for product {}",
                    item.product_id
                )));
            }
            let price = to_money(item.price).ok_or_else(|| {
                CheckoutError::Invalid(format!(
                    "price {} is not a valid amount for product {}",
                    item.price, item.product_id
                ))
            })?;
            total += &price * BigDecimal::from(item.quantity);
            lines.push(LineInput {
                product_id: item.product_id,
                quantity: item.quantity,
                price,
            });
        }

        // the client's grand total is an echo, never an input
        if let Some(submitted) = submitted_total {
            let drifted = total
                .to_f64()
                .map_or(true, |computed| (computed - submitted).abs() > 0.005);
            if drifted {
                warn!(
                    "Client-submitted total {} disagrees with computed total {}",
                    submitted, total
                );
            }
        }

        let order = self.store.create_order(&customer, &lines, total).await?;
        info!(
            "Order {} accepted with {} line(s)",
            order.order_number,
            lines.len()
        );

        // The confirmation rides a detached task: a slow provider or a
        // dropped client connection cannot affect the persisted order.
        let service = self.clone();
        let order_id = order.id;
        tokio::spawn(async move {
            if let Err(e) = service.notify_order(order_id, None).await {
                error!("Order {}: confirmation dispatch failed: {}", order_id, e);
            }
        });

        Ok(CheckoutReceipt {
            order_id: order.id,
            order_number: order.order_number,
        })
    }

    /// Re-sends the confirmation for an existing order, optionally to a
    /// different recipient. The stored customer snapshot is never modified;
    /// the override applies to this dispatch alone.
    pub async fn resend(
        &self,
        order_id: Uuid,
        recipient_override: Option<CustomerDetails>,
    ) -> Result<NotificationResult, StoreError> {
        self.notify_order(order_id, recipient_override).await
    }

    async fn notify_order(
        &self,
        order_id: Uuid,
        recipient_override: Option<CustomerDetails>,
    ) -> Result<NotificationResult, StoreError> {
        let mut order = self.assembler.hydrate(order_id).await?;
        if let Some(customer) = recipient_override {
            order.customer = customer;
        }
        let result = self.dispatcher.dispatch(&order).await;
        if result.delivered() {
            if let Err(e) = self.store.mark_notified(order_id).await {
                // the message went out; an unset flag only means the admin
                // may trigger a duplicate send later
                warn!("Order {}: could not record notified flag: {}", order_id, e);
            }
        }
        Ok(result)
    }
}

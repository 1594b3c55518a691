use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::assembler::FullOrder;
use crate::error::ConfigError;
use crate::providers::{MailjetClient, ResendClient, SendGridClient};
use shared::*;

/// One mail delivery backend. Adapters never surface transport errors as
/// `Err`; every outcome is folded into the response so callers treat failure
/// as data.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn send(&self, payload: &NotificationPayload) -> ProviderResponse;
}

#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: Option<String>,
    /// Overrides the adapter's class-default HTTP timeout when set.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub provider: ProviderKind,
    pub mode: RuntimeMode,
    pub from_address: String,
    /// Umbrella bound on one dispatch, over and above the adapter's own
    /// HTTP timeout.
    pub dispatch_timeout: Duration,
    pub resend: ProviderCredentials,
    pub sendgrid: ProviderCredentials,
    pub mailjet: ProviderCredentials,
}

pub struct NotificationDispatcher {
    provider: Arc<dyn NotificationProvider>,
    mode: RuntimeMode,
    dispatch_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        provider: Arc<dyn NotificationProvider>,
        mode: RuntimeMode,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            mode,
            dispatch_timeout,
        }
    }

    /// Builds the one adapter selected by configuration. Credentials for the
    /// providers that were not selected are neither required nor validated.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, ConfigError> {
        let provider: Arc<dyn NotificationProvider> = match config.provider {
            ProviderKind::Resend => Arc::new(ResendClient::new(
                &config.resend,
                config.from_address.clone(),
                config.mode,
            )?),
            ProviderKind::Sendgrid => Arc::new(SendGridClient::new(
                &config.sendgrid,
                config.from_address.clone(),
                config.mode,
            )?),
            ProviderKind::Mailjet => Arc::new(MailjetClient::new(
                &config.mailjet,
                config.from_address.clone(),
                config.mode,
            )?),
        };
        Ok(Self::new(provider, config.mode, config.dispatch_timeout))
    }

    /// Sends the confirmation for an assembled order and reports what
    /// happened. Always returns within the umbrella timeout; a provider
    /// failure comes back as a result, never as an error or a hang.
    pub async fn dispatch(&self, order: &FullOrder) -> NotificationResult {
        let kind = self.provider.kind();
        if self.mode == RuntimeMode::Build {
            info!(
                "Order {}: notification suppressed in build mode",
                order.order_number
            );
            return NotificationResult::from_response(kind, ProviderResponse::skipped());
        }

        let payload = build_payload(order);
        let response = match timeout(self.dispatch_timeout, self.provider.send(&payload)).await {
            Ok(response) => response,
            Err(_) => ProviderResponse::timeout(format!(
                "no answer from {} within {:?}",
                kind, self.dispatch_timeout
            )),
        };

        let result = NotificationResult::from_response(kind, response);
        if result.success {
            info!(
                "Order {} confirmation sent via {}",
                order.order_number, kind
            );
        } else {
            warn!(
                "Order {} confirmation via {} failed: {}",
                order.order_number,
                kind,
                result.detail.as_deref().unwrap_or("no detail")
            );
        }
        result
    }
}

/// Flattens an assembled order into the provider-independent message. Line
/// names come from the hydrated view, so deleted products already read
/// "Unknown Product" here.
pub fn build_payload(order: &FullOrder) -> NotificationPayload {
    NotificationPayload {
        recipient: order.customer.email.clone(),
        customer_name: order.customer.full_name(),
        order_number: order.order_number.clone(),
        lines: order
            .lines
            .iter()
            .map(|line| PayloadLine {
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.price.clone(),
                line_total: line.line_total.clone(),
            })
            .collect(),
        total_amount: order.total_amount.clone(),
    }
}

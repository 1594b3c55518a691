use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Resend,
    Sendgrid,
    Mailjet,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Resend => "resend",
            ProviderKind::Sendgrid => "sendgrid",
            ProviderKind::Mailjet => "mailjet",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resend" => Ok(ProviderKind::Resend),
            "sendgrid" => Ok(ProviderKind::Sendgrid),
            "mailjet" => Ok(ProviderKind::Mailjet),
            other => Err(format!(
                "unknown provider '{}', expected one of: resend, sendgrid, mailjet",
                other
            )),
        }
    }
}

/// Whether the process is serving traffic or running inside a build pipeline.
/// In build mode every network-calling operation short-circuits to a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Serve,
    Build,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeMode::Serve => "serve",
            RuntimeMode::Build => "build",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serve" => Ok(RuntimeMode::Serve),
            "build" => Ok(RuntimeMode::Build),
            other => Err(format!("unknown runtime mode '{}', expected serve or build", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    ProviderError,
    Timeout,
    Skipped,
}

/// What a single provider call came back with, normalized across backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub outcome: Outcome,
    pub detail: Option<String>,
}

impl ProviderResponse {
    pub fn success() -> Self {
        Self { outcome: Outcome::Success, detail: None }
    }

    pub fn provider_error(detail: impl Into<String>) -> Self {
        Self { outcome: Outcome::ProviderError, detail: Some(detail.into()) }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self { outcome: Outcome::Timeout, detail: Some(detail.into()) }
    }

    pub fn skipped() -> Self {
        Self {
            outcome: Outcome::Skipped,
            detail: Some("notification suppressed in build mode".to_string()),
        }
    }
}

/// Dispatcher verdict handed back to callers. `success` covers `Skipped`:
/// a suppressed send is a no-op, not a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub provider: ProviderKind,
    pub outcome: Outcome,
    pub detail: Option<String>,
}

impl NotificationResult {
    pub fn from_response(provider: ProviderKind, response: ProviderResponse) -> Self {
        Self {
            success: matches!(response.outcome, Outcome::Success | Outcome::Skipped),
            provider,
            outcome: response.outcome,
            detail: response.detail,
        }
    }

    /// True only when a message actually went out, which is what gates the
    /// order's one-way `notified` flag.
    pub fn delivered(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl CustomerDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
}

/// Provider-agnostic confirmation message. Adapters translate this into
/// their own wire shapes; nothing provider-specific may leak in here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipient: String,
    pub customer_name: String,
    pub order_number: String,
    pub lines: Vec<PayloadLine>,
    pub total_amount: BigDecimal,
}

impl NotificationPayload {
    pub fn subject(&self) -> String {
        format!("Order confirmation {}", self.order_number)
    }

    pub fn body_text(&self) -> String {
        let mut body = format!(
            "Hi {},\n\nThanks for your order {}.\n\n",
            self.customer_name, self.order_number
        );
        for line in &self.lines {
            body.push_str(&format!(
                "  {} x{} @ {} = {}\n",
                line.name, line.quantity, line.unit_price, line.line_total
            ));
        }
        body.push_str(&format!("\nTotal: {}\n", self.total_amount));
        body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

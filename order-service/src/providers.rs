use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::error::ConfigError;
use crate::notify::{NotificationProvider, ProviderCredentials};
use shared::{NotificationPayload, ProviderKind, ProviderResponse, RuntimeMode};

const RESEND_TIMEOUT: Duration = Duration::from_secs(5);
const SENDGRID_TIMEOUT: Duration = Duration::from_secs(5);
// Mailjet's API answers noticeably slower than the other two.
const MAILJET_TIMEOUT: Duration = Duration::from_secs(8);

/// Upstream error bodies are kept in the result detail for the admin UI, but
/// capped so a misbehaving provider cannot flood the logs.
const DETAIL_LIMIT: usize = 512;

fn build_client(timeout: Duration) -> Result<Client, ConfigError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn truncate_detail(body: &str) -> String {
    if body.len() <= DETAIL_LIMIT {
        return body.to_string();
    }
    let mut end = DETAIL_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{} [truncated]", &body[..end])
}

/// Folds a reqwest outcome into the provider contract: 2xx is success, any
/// other status is a provider error carrying the body, and transport-level
/// timeouts or refused connections count as timeouts.
async fn classify(sent: Result<reqwest::Response, reqwest::Error>) -> ProviderResponse {
    match sent {
        Ok(response) if response.status().is_success() => ProviderResponse::success(),
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            ProviderResponse::provider_error(format!("{}: {}", status, truncate_detail(&body)))
        }
        Err(e) if e.is_timeout() || e.is_connect() => ProviderResponse::timeout(e.to_string()),
        Err(e) => ProviderResponse::provider_error(e.to_string()),
    }
}

#[derive(Serialize)]
struct ResendMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    text: String,
}

pub struct ResendClient {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
    mode: RuntimeMode,
}

impl ResendClient {
    pub fn new(
        credentials: &ProviderCredentials,
        from: String,
        mode: RuntimeMode,
    ) -> Result<Self, ConfigError> {
        if credentials.api_key.is_empty() {
            return Err(ConfigError::MissingCredential("RESEND_API_KEY"));
        }
        Ok(Self {
            client: build_client(credentials.timeout.unwrap_or(RESEND_TIMEOUT))?,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            from,
            mode,
        })
    }
}

#[async_trait]
impl NotificationProvider for ResendClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Resend
    }

    async fn send(&self, payload: &NotificationPayload) -> ProviderResponse {
        if self.mode == RuntimeMode::Build {
            return ProviderResponse::skipped();
        }
        let message = ResendMessage {
            from: &self.from,
            to: [payload.recipient.as_str()],
            subject: payload.subject(),
            text: payload.body_text(),
        };
        let sent = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await;
        classify(sent).await
    }
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [EmailAddress<'a>; 1],
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

#[derive(Serialize)]
struct SendGridMessage<'a> {
    personalizations: [Personalization<'a>; 1],
    from: EmailAddress<'a>,
    subject: String,
    content: [Content; 1],
}

pub struct SendGridClient {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
    mode: RuntimeMode,
}

impl SendGridClient {
    pub fn new(
        credentials: &ProviderCredentials,
        from: String,
        mode: RuntimeMode,
    ) -> Result<Self, ConfigError> {
        if credentials.api_key.is_empty() {
            return Err(ConfigError::MissingCredential("SENDGRID_API_KEY"));
        }
        Ok(Self {
            client: build_client(credentials.timeout.unwrap_or(SENDGRID_TIMEOUT))?,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            from,
            mode,
        })
    }
}

#[async_trait]
impl NotificationProvider for SendGridClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sendgrid
    }

    async fn send(&self, payload: &NotificationPayload) -> ProviderResponse {
        if self.mode == RuntimeMode::Build {
            return ProviderResponse::skipped();
        }
        let message = SendGridMessage {
            personalizations: [Personalization {
                to: [EmailAddress {
                    email: &payload.recipient,
                }],
            }],
            from: EmailAddress { email: &self.from },
            subject: payload.subject(),
            content: [Content {
                content_type: "text/plain",
                value: payload.body_text(),
            }],
        };
        let sent = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await;
        classify(sent).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetMessage<'a> {
    from: MailjetAddress<'a>,
    to: [MailjetAddress<'a>; 1],
    subject: String,
    text_part: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetEnvelope<'a> {
    messages: [MailjetMessage<'a>; 1],
}

pub struct MailjetClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    from: String,
    mode: RuntimeMode,
}

impl MailjetClient {
    pub fn new(
        credentials: &ProviderCredentials,
        from: String,
        mode: RuntimeMode,
    ) -> Result<Self, ConfigError> {
        if credentials.api_key.is_empty() {
            return Err(ConfigError::MissingCredential("MAILJET_API_KEY"));
        }
        let api_secret = credentials
            .api_secret
            .clone()
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingCredential("MAILJET_API_SECRET"))?;
        Ok(Self {
            client: build_client(credentials.timeout.unwrap_or(MAILJET_TIMEOUT))?,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            api_secret,
            from,
            mode,
        })
    }
}

#[async_trait]
impl NotificationProvider for MailjetClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mailjet
    }

    async fn send(&self, payload: &NotificationPayload) -> ProviderResponse {
        if self.mode == RuntimeMode::Build {
            return ProviderResponse::skipped();
        }
        let message = MailjetEnvelope {
            messages: [MailjetMessage {
                from: MailjetAddress {
                    email: &self.from,
                    name: None,
                },
                to: [MailjetAddress {
                    email: &payload.recipient,
                    name: Some(&payload.customer_name),
                }],
                subject: payload.subject(),
                text_part: payload.body_text(),
            }],
        };
        let sent = self
            .client
            .post(format!("{}/v3.1/send", self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&message)
            .send()
            .await;
        classify(sent).await
    }
}

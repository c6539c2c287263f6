//! Outbound notifier client (C12): Discord-compatible webhook poster.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, content: &str, embed: Value) -> Result<(), String>;
}

#[derive(Serialize)]
struct WebhookBody {
    content: String,
    embeds: Vec<Value>,
}

pub struct DiscordWebhookNotifier {
    client: Client,
    url: String,
}

impl DiscordWebhookNotifier {
    pub fn from_id_and_token(client: Client, webhook_id: &str, webhook_token: &str) -> Self {
        Self {
            client,
            url: format!("https://discord.com/api/webhooks/{webhook_id}/{webhook_token}"),
        }
    }

    pub fn from_url(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn send(&self, content: &str, embed: Value) -> Result<(), String> {
        let body = WebhookBody {
            content: content.to_string(),
            embeds: vec![embed],
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = format!("discord webhook returned {status}: {text}");
            warn!(reason, "notifier delivery failed");
            return Err(reason);
        }

        Ok(())
    }
}

/// No-op notifier used when neither `WEBHOOK_ID`/`WEBHOOK_TOKEN` nor
/// `DISCORD_WEBHOOK_URL` is configured. The pipeline still runs; alerts are
/// simply not delivered anywhere, matching the "missing tokens disable the
/// corresponding ... notifier" contract.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _content: &str, _embed: Value) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_notifier_always_succeeds() {
        let notifier = NullNotifier;
        let result = notifier.send("hello", serde_json::json!({})).await;
        assert!(result.is_ok());
    }

    #[test]
    fn webhook_url_is_built_from_id_and_token() {
        let client = Client::new();
        let notifier = DiscordWebhookNotifier::from_id_and_token(client, "123", "abc");
        assert_eq!(
            notifier.url,
            "https://discord.com/api/webhooks/123/abc"
        );
    }
}

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::clients::ChannelProvider;
use crate::error::NotificationError;
use crate::models::notification::{Channel, NotificationType, OutboundMessage};
use crate::models::preferences::Recipient;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent<'a> {
    event: NotificationType,
    notification_id: &'a str,
    user_id: &'a str,
    title: &'a str,
    message: &'a str,
    data: &'a HashMap<String, JsonValue>,
    sent_at: DateTime<Utc>,
}

/// Delivery to a user-configured HTTP endpoint. Users without a webhook URL
/// are a silent no-op, not an error.
pub struct WebhookProvider {
    http_client: Client,
}

impl WebhookProvider {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout_seconds))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ChannelProvider for WebhookProvider {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    fn is_ready(&self) -> bool {
        // Delivery is configured per user, not per process.
        true
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Result<bool, NotificationError> {
        let Some(url) = recipient.contact.webhook_url.as_deref() else {
            debug!(user_id = %recipient.user_id, "No webhook URL configured, skipping");
            return Ok(false);
        };

        let event = WebhookEvent {
            event: message.kind,
            notification_id: &message.notification_id,
            user_id: &recipient.user_id,
            title: &message.title,
            message: &message.body,
            data: &message.data,
            sent_at: Utc::now(),
        };

        let response = self
            .http_client
            .post(url)
            .header("X-Notification-Event", message.kind.as_str())
            .json(&event)
            .send()
            .await
            .map_err(|e| NotificationError::send_failed(Channel::Webhook, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::send_failed(
                Channel::Webhook,
                format!("endpoint returned status {}", status),
            ));
        }

        info!(
            user_id = %recipient.user_id,
            notification_id = %message.notification_id,
            "Webhook delivered"
        );

        Ok(true)
    }
}

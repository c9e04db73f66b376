use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::clients::ChannelProvider;
use crate::config::SmsSettings;
use crate::error::NotificationError;
use crate::models::notification::{Channel, OutboundMessage};
use crate::models::preferences::Recipient;
use crate::models::retry::RetryConfig;
use crate::utils::retry_with_backoff;

/// Carrier-side character budget for a single message.
pub const SMS_MAX_CHARS: usize = 160;
const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, Serialize)]
struct SmsPayload {
    to: String,
    from: String,
    body: String,
}

/// SMS delivery through the carrier's HTTP API. Messages are truncated to
/// the carrier budget and numbers normalized to E.164 before dispatch.
pub struct SmsProvider {
    http_client: Client,
    settings: Option<SmsSettings>,
    retry_config: RetryConfig,
}

impl SmsProvider {
    pub fn new(settings: Option<SmsSettings>, retry_config: RetryConfig) -> Self {
        let timeout = settings
            .as_ref()
            .map(|s| s.timeout_seconds)
            .unwrap_or(10);

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .unwrap_or_default();

        if let Some(settings) = &settings {
            info!(api_url = %settings.api_url, "SMS client initialized");
        } else {
            info!("SMS carrier not configured, sms channel disabled");
        }

        Self {
            http_client,
            settings,
            retry_config,
        }
    }
}

#[async_trait]
impl ChannelProvider for SmsProvider {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    fn is_ready(&self) -> bool {
        self.settings.is_some()
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Result<bool, NotificationError> {
        let Some(settings) = &self.settings else {
            debug!("SMS provider not ready, skipping send");
            return Ok(false);
        };

        let Some(phone) = recipient.contact.phone.as_deref() else {
            debug!(user_id = %recipient.user_id, "No phone number on file, skipping");
            return Ok(false);
        };

        let Some(to) = normalize_number(phone, &settings.default_country_code) else {
            return Err(NotificationError::send_failed(
                Channel::Sms,
                format!("unroutable phone number: {}", phone),
            ));
        };

        let payload = SmsPayload {
            to,
            from: settings.sender_id.clone(),
            body: truncate_message(&message.body),
        };

        let http_client = self.http_client.clone();
        let api_url = settings.api_url.clone();
        let api_key = settings.api_key.clone();

        retry_with_backoff(&self.retry_config, || {
            let client = http_client.clone();
            let url = api_url.clone();
            let key = api_key.clone();
            let payload = payload.clone();

            async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&key)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;

                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(format!("carrier returned status {}", status))
                }
            }
        })
        .await
        .map_err(|reason| NotificationError::send_failed(Channel::Sms, reason))?;

        info!(
            user_id = %recipient.user_id,
            notification_id = %message.notification_id,
            "SMS accepted by carrier"
        );

        Ok(true)
    }
}

/// Fits `body` into the carrier budget, marking the cut when it happens.
pub fn truncate_message(body: &str) -> String {
    if body.chars().count() <= SMS_MAX_CHARS {
        return body.to_string();
    }

    let keep = SMS_MAX_CHARS - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = body.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Normalizes a user-entered phone number to E.164. Separators are dropped;
/// numbers without a country prefix get the configured default. Returns
/// `None` for numbers that cannot plausibly be routed.
pub fn normalize_number(raw: &str, default_country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else if let Some(rest) = digits.strip_prefix("00") {
        format!("+{}", rest)
    } else {
        format!("{}{}", default_country_code, digits)
    };

    let digit_count = normalized.chars().filter(|c| c.is_ascii_digit()).count();
    if (8..=15).contains(&digit_count) {
        Some(normalized)
    } else {
        None
    }
}

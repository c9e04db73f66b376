use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::clients::ChannelProvider;
use crate::config::Config;
use crate::error::NotificationError;
use crate::models::notification::{Channel, OutboundMessage};
use crate::models::preferences::Recipient;

pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// SMTP delivery via lettre. The transport is verified once at startup; a
/// failed verification leaves the provider not-ready until restart.
pub struct EmailProvider {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl EmailProvider {
    pub async fn connect(config: &Config) -> Self {
        let not_ready = Self {
            transport: None,
            from: None,
        };

        let Some(settings) = config.smtp_settings() else {
            info!("SMTP not configured, email channel disabled");
            return not_ready;
        };

        let from: Mailbox = match settings.from.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                warn!(from = %settings.from, error = %e, "Invalid SMTP sender address, email channel disabled");
                return not_ready;
            }
        };

        let builder = match AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host) {
            Ok(builder) => builder,
            Err(e) => {
                warn!(host = %settings.host, error = %e, "Failed to build SMTP transport, email channel disabled");
                return not_ready;
            }
        };

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .timeout(Some(Duration::from_secs(config.provider_timeout_seconds)))
            .build();

        match transport.test_connection().await {
            Ok(true) => {
                info!(host = %settings.host, "SMTP transport verified");
                Self {
                    transport: Some(transport),
                    from: Some(from),
                }
            }
            Ok(false) => {
                warn!(host = %settings.host, "SMTP transport verification failed, email channel disabled until restart");
                not_ready
            }
            Err(e) => {
                warn!(host = %settings.host, error = %e, "SMTP transport verification failed, email channel disabled until restart");
                not_ready
            }
        }
    }

    /// Direct send with optional attachments, used outside the normal
    /// fan-out path (e.g. inquiry exports).
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: Vec<EmailAttachment>,
    ) -> Result<bool, NotificationError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            debug!("Email provider not ready, skipping send");
            return Ok(false);
        };

        let to: Mailbox = to.parse().map_err(|_| {
            NotificationError::send_failed(Channel::Email, format!("invalid recipient: {}", to))
        })?;

        let alternative =
            MultiPart::alternative_plain_html(body.to_string(), html_body(subject, body));

        let builder = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(subject);

        let email = if attachments.is_empty() {
            builder.multipart(alternative)
        } else {
            let mut mixed = MultiPart::mixed().multipart(alternative);
            for attachment in attachments {
                let content_type = ContentType::parse(&attachment.content_type)
                    .unwrap_or(ContentType::TEXT_PLAIN);
                mixed = mixed.singlepart(
                    Attachment::new(attachment.filename).body(attachment.content, content_type),
                );
            }
            builder.multipart(mixed)
        }
        .map_err(|e| NotificationError::send_failed(Channel::Email, e.to_string()))?;

        let response = transport
            .send(email)
            .await
            .map_err(|e| NotificationError::send_failed(Channel::Email, e.to_string()))?;

        Ok(response.is_positive())
    }
}

#[async_trait]
impl ChannelProvider for EmailProvider {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn is_ready(&self) -> bool {
        self.transport.is_some() && self.from.is_some()
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Result<bool, NotificationError> {
        let Some(address) = recipient.contact.email.as_deref() else {
            debug!(user_id = %recipient.user_id, "No email address on file, skipping");
            return Ok(false);
        };

        let subject = message.subject.as_deref().unwrap_or(&message.title);

        let accepted = self
            .send_email(address, subject, &message.body, Vec::new())
            .await?;

        if accepted {
            info!(
                user_id = %recipient.user_id,
                notification_id = %message.notification_id,
                "Email accepted by SMTP relay"
            );
        }

        Ok(accepted)
    }
}

fn html_body(subject: &str, body: &str) -> String {
    format!(
        "<html><body><h2>{}</h2><p>{}</p></body></html>",
        subject,
        body.replace('\n', "<br/>")
    )
}

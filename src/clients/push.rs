use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, StatusCode, Url};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair};
use tracing::{debug, info, warn};

use crate::clients::ChannelProvider;
use crate::config::VapidSettings;
use crate::error::NotificationError;
use crate::models::notification::{Channel, OutboundMessage, Priority};
use crate::models::preferences::Recipient;
use crate::stores::PushSubscriptionStore;

const JWT_HEADER: &[u8] = br#"{"typ":"JWT","alg":"ES256"}"#;
const JWT_LIFETIME_SECONDS: u64 = 12 * 3600;
const PUSH_TTL_SECONDS: u64 = 86400;

struct VapidSigner {
    subject: String,
    public_key: String,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl VapidSigner {
    fn from_settings(settings: &VapidSettings) -> Option<Self> {
        let der = URL_SAFE_NO_PAD.decode(&settings.private_key).ok()?;
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &der, &rng).ok()?;

        Some(Self {
            subject: settings.subject.clone(),
            public_key: settings.public_key.clone(),
            key_pair,
            rng,
        })
    }

    /// `Authorization` header for one push-service origin, per RFC 8292.
    fn authorization_for(&self, endpoint: &str) -> Result<String, NotificationError> {
        let url = Url::parse(endpoint).map_err(|e| {
            NotificationError::send_failed(Channel::Push, format!("bad endpoint: {}", e))
        })?;

        let host = url.host_str().ok_or_else(|| {
            NotificationError::send_failed(Channel::Push, "endpoint has no host".to_string())
        })?;

        let audience = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + JWT_LIFETIME_SECONDS;

        let claims = serde_json::json!({
            "aud": audience,
            "exp": expiry,
            "sub": self.subject,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HEADER),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let signature = self
            .key_pair
            .sign(&self.rng, signing_input.as_bytes())
            .map_err(|_| {
                NotificationError::send_failed(Channel::Push, "JWT signing failed".to_string())
            })?;

        Ok(format!(
            "vapid t={}.{}, k={}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.as_ref()),
            self.public_key
        ))
    }
}

/// Web-push delivery. Fans out to every stored subscription of the user;
/// endpoints answering `404`/`410` are unsubscribed on the spot instead of
/// retried.
pub struct PushProvider {
    http_client: Client,
    signer: Option<VapidSigner>,
    subscriptions: Arc<dyn PushSubscriptionStore>,
}

impl PushProvider {
    pub fn new(
        settings: Option<VapidSettings>,
        subscriptions: Arc<dyn PushSubscriptionStore>,
    ) -> Self {
        let timeout = settings.as_ref().map(|s| s.timeout_seconds).unwrap_or(10);

        let signer = match &settings {
            Some(settings) => {
                let signer = VapidSigner::from_settings(settings);
                match &signer {
                    Some(_) => info!("Push client initialized"),
                    None => {
                        warn!("Invalid VAPID private key, push channel disabled");
                    }
                }
                signer
            }
            None => {
                info!("VAPID keys not configured, push channel disabled");
                None
            }
        };

        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()
                .unwrap_or_default(),
            signer,
            subscriptions,
        }
    }

    /// Public VAPID key handed to clients for `pushManager.subscribe`.
    pub fn public_key(&self) -> Option<&str> {
        self.signer.as_ref().map(|s| s.public_key.as_str())
    }
}

#[async_trait]
impl ChannelProvider for PushProvider {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    fn is_ready(&self) -> bool {
        self.signer.is_some()
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Result<bool, NotificationError> {
        let Some(signer) = &self.signer else {
            debug!("Push provider not ready, skipping send");
            return Ok(false);
        };

        let subscriptions = self.subscriptions.subscriptions(&recipient.user_id).await?;
        if subscriptions.is_empty() {
            debug!(user_id = %recipient.user_id, "No push subscriptions, skipping");
            return Ok(false);
        }

        let payload = serde_json::json!({
            "notification_id": message.notification_id,
            "type": message.kind,
            "title": message.title,
            "body": message.body,
            "data": message.data,
        });

        let mut accepted = 0;
        for subscription in subscriptions {
            let authorization = match signer.authorization_for(&subscription.endpoint) {
                Ok(authorization) => authorization,
                Err(e) => {
                    warn!(endpoint = %subscription.endpoint, error = %e, "Skipping unusable push endpoint");
                    continue;
                }
            };

            let response = self
                .http_client
                .post(&subscription.endpoint)
                .header("Authorization", authorization)
                .header("TTL", PUSH_TTL_SECONDS)
                .header("Urgency", urgency(message.priority))
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    accepted += 1;
                }
                Ok(response)
                    if response.status() == StatusCode::GONE
                        || response.status() == StatusCode::NOT_FOUND =>
                {
                    info!(
                        user_id = %recipient.user_id,
                        endpoint = %subscription.endpoint,
                        "Subscription expired, removing"
                    );
                    self.subscriptions
                        .unsubscribe(&recipient.user_id, &subscription.endpoint)
                        .await?;
                }
                Ok(response) => {
                    warn!(
                        endpoint = %subscription.endpoint,
                        status = %response.status(),
                        "Push service rejected notification"
                    );
                }
                Err(e) => {
                    warn!(endpoint = %subscription.endpoint, error = %e, "Push request failed");
                }
            }
        }

        Ok(accepted > 0)
    }
}

fn urgency(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Normal => "normal",
        Priority::High | Priority::Urgent => "high",
    }
}

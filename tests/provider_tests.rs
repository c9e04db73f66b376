use std::sync::Arc;

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair};
use serde_json::Value as JsonValue;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_service::clients::ChannelProvider;
use notification_service::clients::email::EmailProvider;
use notification_service::clients::push::PushProvider;
use notification_service::clients::sms::{SMS_MAX_CHARS, SmsProvider, normalize_number, truncate_message};
use notification_service::clients::webhook::WebhookProvider;
use notification_service::config::{SmsSettings, VapidSettings};
use notification_service::error::NotificationError;
use notification_service::models::preferences::{ContactInfo, Recipient};
use notification_service::models::push::{PushSubscription, SubscriptionKeys};
use notification_service::stores::{InMemoryPushSubscriptionStore, PushSubscriptionStore};

use crate::support::{outbound, retry, test_config};

fn recipient(user_id: &str, contact: ContactInfo) -> Recipient {
    Recipient {
        user_id: user_id.to_string(),
        contact,
    }
}

fn sms_settings(api_url: String) -> SmsSettings {
    SmsSettings {
        api_url,
        api_key: "carrier-key".to_string(),
        sender_id: "REALTY".to_string(),
        default_country_code: "+1".to_string(),
        timeout_seconds: 5,
    }
}

fn generated_vapid() -> VapidSettings {
    let document =
        EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &SystemRandom::new())
            .expect("generate signing key");

    VapidSettings {
        subject: "mailto:ops@realty.example".to_string(),
        public_key: "BPublicKeyForTests".to_string(),
        private_key: URL_SAFE_NO_PAD.encode(document.as_ref()),
        timeout_seconds: 5,
    }
}

fn push_subscription(user_id: &str, endpoint: String) -> PushSubscription {
    PushSubscription::new(
        user_id,
        endpoint,
        SubscriptionKeys {
            p256dh: "client-p256dh".to_string(),
            auth: "client-auth".to_string(),
        },
        Some("test-agent".to_string()),
    )
}

/// Test: Phone numbers normalize to E.164 before dispatch
#[test]
fn test_phone_number_normalization() {
    assert_eq!(
        normalize_number("(555) 123-4567", "+1"),
        Some("+15551234567".to_string())
    );
    assert_eq!(
        normalize_number("+44 7700 900123", "+1"),
        Some("+447700900123".to_string())
    );
    assert_eq!(
        normalize_number("0049 170 1234567", "+1"),
        Some("+491701234567".to_string())
    );
    assert_eq!(normalize_number("123", "+1"), None);
}

/// Test: Long messages are cut to the carrier budget with a visible marker
#[test]
fn test_sms_truncation() {
    let short = "Fits in one message.";
    assert_eq!(truncate_message(short), short);

    let long = "a".repeat(400);
    let truncated = truncate_message(&long);
    assert_eq!(truncated.chars().count(), SMS_MAX_CHARS);
    assert!(truncated.ends_with("..."));
}

/// Test: SMS dispatch posts normalized, truncated content to the carrier
#[tokio::test]
async fn test_sms_dispatch() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let provider = SmsProvider::new(
        Some(sms_settings(format!("{}/messages", server.uri()))),
        retry(1),
    );
    assert!(provider.is_ready());

    let contact = ContactInfo {
        phone: Some("(555) 123-4567".to_string()),
        ..Default::default()
    };
    let long_body = "x".repeat(300);

    let accepted = provider
        .send(&recipient("u1", contact), &outbound(&long_body))
        .await?;
    assert!(accepted);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: JsonValue = serde_json::from_slice(&requests[0].body)?;
    assert_eq!(body["to"], "+15551234567");
    assert_eq!(body["from"], "REALTY");

    let sent = body["body"].as_str().unwrap();
    assert_eq!(sent.chars().count(), SMS_MAX_CHARS);
    assert!(sent.ends_with("..."));

    Ok(())
}

/// Test: Carrier failures surface as a send error after retries
#[tokio::test]
async fn test_sms_carrier_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = SmsProvider::new(Some(sms_settings(server.uri())), retry(2));

    let contact = ContactInfo {
        phone: Some("+15551234567".to_string()),
        ..Default::default()
    };

    let result = provider
        .send(&recipient("u1", contact), &outbound("hello"))
        .await;

    assert!(matches!(
        result,
        Err(NotificationError::ProviderSendFailed { .. })
    ));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2, "should retry once before giving up");
}

/// Test: The SMS channel is a no-op when unconfigured
#[tokio::test]
async fn test_sms_unconfigured() -> Result<()> {
    let provider = SmsProvider::new(None, retry(1));
    assert!(!provider.is_ready());

    let contact = ContactInfo {
        phone: Some("+15551234567".to_string()),
        ..Default::default()
    };
    let accepted = provider
        .send(&recipient("u1", contact), &outbound("hello"))
        .await?;
    assert!(!accepted);

    Ok(())
}

/// Test: Webhook delivery posts the event to the user's URL
#[tokio::test]
async fn test_webhook_dispatch() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/u1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let provider = WebhookProvider::new(5);
    let contact = ContactInfo {
        webhook_url: Some(format!("{}/hooks/u1", server.uri())),
        ..Default::default()
    };

    let accepted = provider
        .send(&recipient("u1", contact), &outbound("payload"))
        .await?;
    assert!(accepted);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0]
            .headers
            .get("X-Notification-Event")
            .and_then(|v| v.to_str().ok()),
        Some("system_alert")
    );

    let body: JsonValue = serde_json::from_slice(&requests[0].body)?;
    assert_eq!(body["event"], "SYSTEM_ALERT");
    assert_eq!(body["userId"], "u1");
    assert_eq!(body["message"], "payload");

    Ok(())
}

/// Test: Users without a webhook URL are skipped silently
#[tokio::test]
async fn test_webhook_without_url_is_noop() -> Result<()> {
    let provider = WebhookProvider::new(5);

    let accepted = provider
        .send(&recipient("u1", ContactInfo::default()), &outbound("payload"))
        .await?;
    assert!(!accepted);

    Ok(())
}

/// Test: A rejecting webhook endpoint is a send failure
#[tokio::test]
async fn test_webhook_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = WebhookProvider::new(5);
    let contact = ContactInfo {
        webhook_url: Some(server.uri()),
        ..Default::default()
    };

    let result = provider
        .send(&recipient("u1", contact), &outbound("payload"))
        .await;

    assert!(matches!(
        result,
        Err(NotificationError::ProviderSendFailed { .. })
    ));
}

/// Test: Push dispatch sends a VAPID-authorized request per device
#[tokio::test]
async fn test_push_dispatch() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/device-1"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryPushSubscriptionStore::new());
    store
        .subscribe(push_subscription(
            "u1",
            format!("{}/push/device-1", server.uri()),
        ))
        .await?;

    let provider = PushProvider::new(Some(generated_vapid()), store.clone());
    assert!(provider.is_ready());
    assert_eq!(provider.public_key(), Some("BPublicKeyForTests"));

    let accepted = provider
        .send(&recipient("u1", ContactInfo::default()), &outbound("wake up"))
        .await?;
    assert!(accepted);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let authorization = requests[0]
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(authorization.starts_with("vapid t="));
    assert!(authorization.contains("k=BPublicKeyForTests"));
    assert!(requests[0].headers.get("TTL").is_some());

    Ok(())
}

/// Test: A gone endpoint is unsubscribed instead of retried
#[tokio::test]
async fn test_push_gone_endpoint_unsubscribes() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryPushSubscriptionStore::new());
    store
        .subscribe(push_subscription(
            "u1",
            format!("{}/push/stale", server.uri()),
        ))
        .await?;

    let provider = PushProvider::new(Some(generated_vapid()), store.clone());

    let accepted = provider
        .send(&recipient("u1", ContactInfo::default()), &outbound("gone"))
        .await?;
    assert!(!accepted);

    assert!(store.subscriptions("u1").await?.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "gone endpoints must not be retried");

    Ok(())
}

/// Test: No stored subscriptions means nothing to send
#[tokio::test]
async fn test_push_without_subscriptions() -> Result<()> {
    let store = Arc::new(InMemoryPushSubscriptionStore::new());
    let provider = PushProvider::new(Some(generated_vapid()), store);

    let accepted = provider
        .send(&recipient("u1", ContactInfo::default()), &outbound("quiet"))
        .await?;
    assert!(!accepted);

    Ok(())
}

/// Test: An unparseable VAPID key disables the push channel
#[tokio::test]
async fn test_push_invalid_key_not_ready() {
    let store = Arc::new(InMemoryPushSubscriptionStore::new());
    let mut settings = generated_vapid();
    settings.private_key = "not-a-key".to_string();

    let provider = PushProvider::new(Some(settings), store);
    assert!(!provider.is_ready());
    assert!(provider.public_key().is_none());
}

/// Test: The email channel stays a no-op when SMTP is unconfigured
#[tokio::test]
async fn test_email_unconfigured() -> Result<()> {
    let provider = EmailProvider::connect(&test_config()).await;
    assert!(!provider.is_ready());

    let contact = ContactInfo {
        email: Some("alex@example.com".to_string()),
        ..Default::default()
    };
    let accepted = provider
        .send(&recipient("u1", contact), &outbound("hello"))
        .await?;
    assert!(!accepted);

    Ok(())
}

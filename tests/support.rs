use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use notification_service::clients::ChannelProvider;
use notification_service::clients::cache::CacheClient;
use notification_service::config::BulkSettings;
use notification_service::error::NotificationError;
use notification_service::inbox::InboxService;
use notification_service::models::notification::{
    Channel, NotificationRequest, NotificationType, OutboundMessage,
};
use notification_service::models::preferences::Recipient;
use notification_service::orchestrator::Orchestrator;
use notification_service::scheduler::Scheduler;
use notification_service::stores::{
    InAppNotificationStore, InMemoryInAppStore, InMemoryPreferenceStore, UserPreferenceStore,
};
use notification_service::templates::TemplateRegistry;

/// Channel provider stub that records every message it receives and can be
/// flipped into a not-ready or always-failing mode.
pub struct RecordingProvider {
    channel: Channel,
    ready: bool,
    fail: bool,
    calls: Mutex<Vec<OutboundMessage>>,
}

impl RecordingProvider {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            ready: true,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn not_ready(channel: Channel) -> Self {
        Self {
            ready: false,
            ..Self::new(channel)
        }
    }

    pub fn failing(channel: Channel) -> Self {
        Self {
            fail: true,
            ..Self::new(channel)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<OutboundMessage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelProvider for RecordingProvider {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn send(
        &self,
        _recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Result<bool, NotificationError> {
        self.calls.lock().unwrap().push(message.clone());

        if self.fail {
            Err(NotificationError::send_failed(
                self.channel,
                "simulated provider outage",
            ))
        } else {
            Ok(true)
        }
    }
}

pub struct TestEngine {
    pub orchestrator: Arc<Orchestrator>,
    pub preferences: Arc<InMemoryPreferenceStore>,
    pub inbox: Arc<InboxService>,
    pub resubmit_rx: mpsc::Receiver<NotificationRequest>,
}

pub fn engine_with(providers: Vec<Arc<dyn ChannelProvider>>) -> TestEngine {
    engine_with_bulk(
        providers,
        BulkSettings {
            chunk_size: 100,
            chunk_delay_ms: 10,
        },
    )
}

/// Wires an orchestrator against in-memory stores, a disabled cache, and a
/// scheduler whose resubmissions land on the returned channel.
pub fn engine_with_bulk(providers: Vec<Arc<dyn ChannelProvider>>, bulk: BulkSettings) -> TestEngine {
    let cache = Arc::new(CacheClient::disabled("test"));
    let registry = Arc::new(TemplateRegistry::with_defaults());
    let preferences = Arc::new(InMemoryPreferenceStore::new());
    let in_app = Arc::new(InMemoryInAppStore::new());
    let inbox = Arc::new(InboxService::new(
        in_app as Arc<dyn InAppNotificationStore>,
        cache.clone(),
    ));

    let (resubmit_tx, resubmit_rx) = mpsc::channel(16);
    let scheduler = Arc::new(Scheduler::new(cache, resubmit_tx));

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        preferences.clone() as Arc<dyn UserPreferenceStore>,
        inbox.clone(),
        scheduler,
        providers,
        bulk,
    ));

    TestEngine {
        orchestrator,
        preferences,
        inbox,
        resubmit_rx,
    }
}

/// A config with every external system unconfigured, for provider tests.
pub fn test_config() -> notification_service::config::Config {
    notification_service::config::Config {
        server_port: 0,
        redis_url: None,
        cache_enabled: false,
        cache_prefix: "test".to_string(),
        cache_list_ttl_seconds: 300,
        cache_stats_ttl_seconds: 600,
        smtp_host: None,
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        smtp_from: None,
        sms_api_url: None,
        sms_api_key: None,
        sms_sender_id: None,
        sms_default_country_code: "+1".to_string(),
        vapid_subject: None,
        vapid_public_key: None,
        vapid_private_key: None,
        provider_timeout_seconds: 5,
        bulk_chunk_size: 100,
        bulk_chunk_delay_ms: 10,
        max_retry_attempts: 1,
        initial_retry_delay_ms: 10,
        max_retry_delay_ms: 100,
        retry_backoff_multiplier: 2,
        template_dir: None,
    }
}

pub fn retry(max_attempts: u32) -> notification_service::models::retry::RetryConfig {
    notification_service::models::retry::RetryConfig {
        max_attempts,
        initial_delay_ms: 10,
        max_delay_ms: 100,
        backoff_multiplier: 2,
    }
}

pub fn outbound(body: &str) -> OutboundMessage {
    OutboundMessage {
        notification_id: "n1".to_string(),
        kind: NotificationType::SystemAlert,
        title: "Maintenance tonight".to_string(),
        body: body.to_string(),
        subject: None,
        data: HashMap::new(),
        priority: notification_service::models::notification::Priority::Normal,
    }
}

/// A property-inquiry request with every template variable populated, so
/// templated channels render cleanly.
pub fn inquiry_request(user_id: &str, channels: Vec<Channel>) -> NotificationRequest {
    let mut data = HashMap::new();
    data.insert("recipientName".to_string(), json!("Alex"));
    data.insert("propertyTitle".to_string(), json!("Sunny Loft"));
    data.insert("senderName".to_string(), json!("Jamie"));
    data.insert("inquiryMessage".to_string(), json!("Is it still available?"));

    NotificationRequest::new(
        user_id,
        NotificationType::PropertyInquiry,
        "New Inquiry",
        "You have a new inquiry.",
        channels,
    )
    .with_data(data)
}

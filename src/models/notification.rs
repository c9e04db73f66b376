use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::response::Pagination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Email,
    Sms,
    Push,
    InApp,
    Webhook,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::InApp => "in_app",
            Channel::Webhook => "webhook",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    PropertyInquiry,
    InquiryReply,
    PropertyApproved,
    PropertyRejected,
    FavoriteAdded,
    PriceChanged,
    ViewingScheduled,
    SystemAlert,
    Welcome,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::PropertyInquiry => "property_inquiry",
            NotificationType::InquiryReply => "inquiry_reply",
            NotificationType::PropertyApproved => "property_approved",
            NotificationType::PropertyRejected => "property_rejected",
            NotificationType::FavoriteAdded => "favorite_added",
            NotificationType::PriceChanged => "price_changed",
            NotificationType::ViewingScheduled => "viewing_scheduled",
            NotificationType::SystemAlert => "system_alert",
            NotificationType::Welcome => "welcome",
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(default = "generate_id")]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: HashMap<String, JsonValue>,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}

impl NotificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        channels: Vec<Channel>,
    ) -> Self {
        Self {
            id: generate_id(),
            user_id: user_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            data: HashMap::new(),
            channels,
            priority: Priority::Normal,
            scheduled_at: None,
            expires_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_data(mut self, data: HashMap<String, JsonValue>) -> Self {
        self.data = data;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }
}

/// Rendered, channel-agnostic content handed to a provider.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub notification_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub subject: Option<String>,
    pub data: HashMap<String, JsonValue>,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub channel: Channel,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(channel: Channel) -> Self {
        Self {
            channel,
            success: true,
            error: None,
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// Fan-out ran; per-channel outcomes are populated.
    Dispatched,
    /// Handed to the scheduler; nothing was sent yet.
    Deferred,
    /// Every requested channel was opted out; nothing to do.
    Skipped,
    /// The request expired before dispatch.
    Expired,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub notification_id: String,
    pub status: DispatchStatus,
    pub outcomes: Vec<DeliveryOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferred_until: Option<DateTime<Utc>>,
}

impl DispatchReport {
    pub fn dispatched(notification_id: String, outcomes: Vec<DeliveryOutcome>) -> Self {
        Self {
            notification_id,
            status: DispatchStatus::Dispatched,
            outcomes,
            deferred_until: None,
        }
    }

    pub fn deferred(notification_id: String, fire_at: DateTime<Utc>) -> Self {
        Self {
            notification_id,
            status: DispatchStatus::Deferred,
            outcomes: Vec::new(),
            deferred_until: Some(fire_at),
        }
    }

    pub fn skipped(notification_id: String) -> Self {
        Self {
            notification_id,
            status: DispatchStatus::Skipped,
            outcomes: Vec::new(),
            deferred_until: None,
        }
    }

    pub fn expired(notification_id: String) -> Self {
        Self {
            notification_id,
            status: DispatchStatus::Expired,
            outcomes: Vec::new(),
            deferred_until: None,
        }
    }

    pub fn outcome(&self, channel: Channel) -> Option<&DeliveryOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }

    pub fn channel_results(&self) -> ChannelResults {
        let succeeded =
            |channel: Channel| self.outcome(channel).map(|o| o.success).unwrap_or(false);

        ChannelResults {
            email: succeeded(Channel::Email),
            sms: succeeded(Channel::Sms),
            push: succeeded(Channel::Push),
            webhook: succeeded(Channel::Webhook),
            database: succeeded(Channel::InApp),
        }
    }
}

/// Per-channel success booleans as surfaced to API callers. The in-app
/// record is reported under `database` for compatibility with the web client.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChannelResults {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
    pub webhook: bool,
    pub database: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppNotification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: HashMap<String, JsonValue>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// One cached/served page of a user's inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<InAppNotification>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total_count: u64,
    pub unread_count: u64,
    pub last_notification_at: Option<DateTime<Utc>>,
    pub notifications_by_type: HashMap<NotificationType, u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub total: usize,
    pub dispatched: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub failed: usize,
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::notification::{Channel, NotificationType};

fn default_enabled() -> bool {
    true
}

/// Per-user delivery window during which non-urgent notifications are
/// deferred instead of sent. Times are `HH:mm` in the given IANA timezone;
/// `start > end` means the window spans midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default = "default_enabled")]
    pub email: bool,
    #[serde(default = "default_enabled")]
    pub sms: bool,
    #[serde(default = "default_enabled")]
    pub push: bool,
    #[serde(default = "default_enabled")]
    pub in_app: bool,
    #[serde(default = "default_enabled")]
    pub webhook: bool,
    /// Per-notification-type channel overrides. A missing entry falls back
    /// to the global toggle above.
    #[serde(default)]
    pub types: HashMap<NotificationType, HashMap<Channel, bool>>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
}

impl UserPreferences {
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: true,
            sms: true,
            push: true,
            in_app: true,
            webhook: true,
            types: HashMap::new(),
            quiet_hours: None,
        }
    }

    pub fn global_toggle(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email,
            Channel::Sms => self.sms,
            Channel::Push => self.push,
            Channel::InApp => self.in_app,
            Channel::Webhook => self.webhook,
        }
    }
}

/// Recipient addressing owned by the user-profile collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: String,
    pub contact: ContactInfo,
}

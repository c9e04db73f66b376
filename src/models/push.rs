use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// One browser/device web-push subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub user_id: String,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PushSubscription {
    pub fn new(
        user_id: impl Into<String>,
        endpoint: impl Into<String>,
        keys: SubscriptionKeys,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            endpoint: endpoint.into(),
            keys,
            user_agent,
            created_at: Utc::now(),
        }
    }
}

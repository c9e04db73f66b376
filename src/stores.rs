use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::NotificationError;
use crate::models::notification::{InAppNotification, NotificationStats};
use crate::models::preferences::{ContactInfo, UserPreferences};
use crate::models::push::PushSubscription;

/// Preference and contact lookups owned by the user-profile collaborator.
/// The orchestrator only ever sees this trait; the concrete adapter is
/// bound at composition time.
#[async_trait]
pub trait UserPreferenceStore: Send + Sync {
    async fn preferences(&self, user_id: &str) -> Result<UserPreferences, NotificationError>;
    async fn contact(&self, user_id: &str) -> Result<ContactInfo, NotificationError>;
}

#[async_trait]
pub trait PushSubscriptionStore: Send + Sync {
    async fn subscriptions(&self, user_id: &str) -> Result<Vec<PushSubscription>, NotificationError>;
    async fn subscribe(&self, subscription: PushSubscription) -> Result<(), NotificationError>;
    async fn unsubscribe(&self, user_id: &str, endpoint: &str) -> Result<bool, NotificationError>;
}

#[async_trait]
pub trait InAppNotificationStore: Send + Sync {
    async fn append(&self, notification: InAppNotification) -> Result<(), NotificationError>;
    /// Newest-first page of the user's inbox plus the total count.
    async fn list(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<InAppNotification>, u64), NotificationError>;
    async fn mark_read(&self, user_id: &str, notification_id: &str)
    -> Result<bool, NotificationError>;
    async fn mark_all_read(&self, user_id: &str) -> Result<u64, NotificationError>;
    async fn stats(&self, user_id: &str) -> Result<NotificationStats, NotificationError>;
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    preferences: RwLock<HashMap<String, UserPreferences>>,
    contacts: RwLock<HashMap<String, ContactInfo>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_preferences(&self, prefs: UserPreferences) {
        self.preferences
            .write()
            .await
            .insert(prefs.user_id.clone(), prefs);
    }

    pub async fn set_contact(&self, user_id: impl Into<String>, contact: ContactInfo) {
        self.contacts.write().await.insert(user_id.into(), contact);
    }
}

#[async_trait]
impl UserPreferenceStore for InMemoryPreferenceStore {
    async fn preferences(&self, user_id: &str) -> Result<UserPreferences, NotificationError> {
        Ok(self
            .preferences
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserPreferences::default_for(user_id)))
    }

    async fn contact(&self, user_id: &str) -> Result<ContactInfo, NotificationError> {
        Ok(self
            .contacts
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryPushSubscriptionStore {
    subscriptions: RwLock<HashMap<String, Vec<PushSubscription>>>,
}

impl InMemoryPushSubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushSubscriptionStore for InMemoryPushSubscriptionStore {
    async fn subscriptions(&self, user_id: &str) -> Result<Vec<PushSubscription>, NotificationError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, subscription: PushSubscription) -> Result<(), NotificationError> {
        let mut subscriptions = self.subscriptions.write().await;
        let entries = subscriptions
            .entry(subscription.user_id.clone())
            .or_default();

        // Re-subscribing the same endpoint replaces the stored keys.
        entries.retain(|s| s.endpoint != subscription.endpoint);
        entries.push(subscription);
        Ok(())
    }

    async fn unsubscribe(&self, user_id: &str, endpoint: &str) -> Result<bool, NotificationError> {
        let mut subscriptions = self.subscriptions.write().await;
        let Some(entries) = subscriptions.get_mut(user_id) else {
            return Ok(false);
        };

        let before = entries.len();
        entries.retain(|s| s.endpoint != endpoint);
        let removed = entries.len() < before;
        if removed {
            debug!(user_id, endpoint, "Removed push subscription");
        }
        Ok(removed)
    }
}

#[derive(Default)]
pub struct InMemoryInAppStore {
    entries: RwLock<HashMap<String, Vec<InAppNotification>>>,
}

impl InMemoryInAppStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InAppNotificationStore for InMemoryInAppStore {
    async fn append(&self, notification: InAppNotification) -> Result<(), NotificationError> {
        self.entries
            .write()
            .await
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification);
        Ok(())
    }

    async fn list(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<InAppNotification>, u64), NotificationError> {
        let entries = self.entries.read().await;
        let Some(all) = entries.get(user_id) else {
            return Ok((Vec::new(), 0));
        };

        let total = all.len() as u64;
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(limit) as usize;

        let notifications = all
            .iter()
            .rev()
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((notifications, total))
    }

    async fn mark_read(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<bool, NotificationError> {
        let mut entries = self.entries.write().await;
        let Some(all) = entries.get_mut(user_id) else {
            return Ok(false);
        };

        match all.iter_mut().find(|n| n.id == notification_id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, NotificationError> {
        let mut entries = self.entries.write().await;
        let Some(all) = entries.get_mut(user_id) else {
            return Ok(0);
        };

        let mut updated = 0;
        for notification in all.iter_mut().filter(|n| !n.is_read) {
            notification.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn stats(&self, user_id: &str) -> Result<NotificationStats, NotificationError> {
        let entries = self.entries.read().await;
        let Some(all) = entries.get(user_id) else {
            return Ok(NotificationStats {
                total_count: 0,
                unread_count: 0,
                last_notification_at: None,
                notifications_by_type: HashMap::new(),
            });
        };

        let mut notifications_by_type = HashMap::new();
        for notification in all {
            *notifications_by_type.entry(notification.kind).or_insert(0) += 1;
        }

        Ok(NotificationStats {
            total_count: all.len() as u64,
            unread_count: all.iter().filter(|n| !n.is_read).count() as u64,
            last_notification_at: all.iter().map(|n| n.created_at).max(),
            notifications_by_type,
        })
    }
}

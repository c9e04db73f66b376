use std::sync::Arc;

use tracing::debug;

use crate::clients::cache::CacheClient;
use crate::error::NotificationError;
use crate::models::notification::{InAppNotification, NotificationPage, NotificationStats};
use crate::models::response::Pagination;
use crate::stores::InAppNotificationStore;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 20;

/// Cache-accelerated read model over the in-app notification store. Writes
/// invalidate the user's cached keys before they return, so a follow-up
/// read never observes pre-update data.
pub struct InboxService {
    store: Arc<dyn InAppNotificationStore>,
    cache: Arc<CacheClient>,
}

impl InboxService {
    pub fn new(store: Arc<dyn InAppNotificationStore>, cache: Arc<CacheClient>) -> Self {
        Self { store, cache }
    }

    pub async fn record(&self, notification: InAppNotification) -> Result<(), NotificationError> {
        let user_id = notification.user_id.clone();
        self.store.append(notification).await?;
        self.cache.invalidate_user_notifications(&user_id).await;
        Ok(())
    }

    pub async fn list(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<NotificationPage, NotificationError> {
        let page = page.max(1);
        let cacheable = page == DEFAULT_PAGE && limit == DEFAULT_LIMIT;

        if cacheable {
            if let Some(cached) = self.cache.cached_user_notifications(user_id).await {
                debug!(user_id, "Inbox list served from cache");
                return Ok(cached);
            }
        }

        let (notifications, total) = self.store.list(user_id, page, limit).await?;
        let result = NotificationPage {
            notifications,
            pagination: Pagination::new(page, limit, total),
        };

        if cacheable {
            self.cache.cache_user_notifications(user_id, &result).await;
        }

        Ok(result)
    }

    pub async fn stats(&self, user_id: &str) -> Result<NotificationStats, NotificationError> {
        if let Some(cached) = self.cache.cached_user_stats(user_id).await {
            debug!(user_id, "Inbox stats served from cache");
            return Ok(cached);
        }

        let stats = self.store.stats(user_id).await?;
        self.cache.cache_user_stats(user_id, &stats).await;
        Ok(stats)
    }

    pub async fn mark_read(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<bool, NotificationError> {
        let updated = self.store.mark_read(user_id, notification_id).await?;
        if updated {
            self.cache.invalidate_user_notifications(user_id).await;
        }
        Ok(updated)
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64, NotificationError> {
        let updated = self.store.mark_all_read(user_id).await?;
        if updated > 0 {
            self.cache.invalidate_user_notifications(user_id).await;
        }
        Ok(updated)
    }
}

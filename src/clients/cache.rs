use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::notification::{NotificationPage, NotificationStats};

/// Namespaced read-through cache over redis. Every operation degrades to a
/// miss/`false` when the backing store is disabled or unreachable, so the
/// engine keeps working without it.
pub struct CacheClient {
    connection: Option<MultiplexedConnection>,
    prefix: String,
    list_ttl_seconds: u64,
    stats_ttl_seconds: u64,
}

impl CacheClient {
    pub async fn connect(config: &Config) -> Self {
        let disabled = Self::disabled(&config.cache_prefix);

        if !config.cache_enabled {
            info!("Cache disabled by configuration");
            return disabled;
        }

        let Some(redis_url) = config.redis_url.as_deref() else {
            info!("No redis URL configured, running cache-less");
            return disabled;
        };

        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to create redis client, running cache-less");
                return disabled;
            }
        };

        match client.get_multiplexed_async_connection().await {
            Ok(connection) => {
                info!("Redis connection established");
                Self {
                    connection: Some(connection),
                    list_ttl_seconds: config.cache_list_ttl_seconds,
                    stats_ttl_seconds: config.cache_stats_ttl_seconds,
                    prefix: config.cache_prefix.clone(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to redis, running cache-less");
                disabled
            }
        }
    }

    /// A client with no backing store; every operation is a miss.
    pub fn disabled(prefix: &str) -> Self {
        Self {
            connection: None,
            prefix: prefix.to_string(),
            list_ttl_seconds: 300,
            stats_ttl_seconds: 600,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.connection.is_some()
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    pub async fn ping(&self) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };

        let mut conn = connection.clone();
        match conn.ping::<String>().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Cache ping failed");
                false
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let connection = self.connection.as_ref()?;
        let key = self.key(key);

        let mut conn = connection.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };
        let key = self.key(key);

        let mut conn = connection.clone();
        match conn.set_ex::<_, _, ()>(&key, value, ttl_seconds).await {
            Ok(()) => true,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache set failed");
                false
            }
        }
    }

    pub async fn del(&self, keys: &[String]) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };
        if keys.is_empty() {
            return true;
        }

        let namespaced: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = connection.clone();
        match conn.del::<_, ()>(namespaced).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Cache del failed");
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };
        let key = self.key(key);

        let mut conn = connection.clone();
        match conn.exists::<_, bool>(&key).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache exists failed");
                false
            }
        }
    }

    pub async fn expire(&self, key: &str, ttl_seconds: i64) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };
        let key = self.key(key);

        let mut conn = connection.clone();
        match conn.expire::<_, bool>(&key, ttl_seconds).await {
            Ok(updated) => updated,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache expire failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Composite helpers with fixed key templates. Only the first page of
    // the inbox is cached; it is the hot read for the notification bell.
    // ------------------------------------------------------------------

    fn user_list_key(user_id: &str) -> String {
        format!("notifications:user:{}", user_id)
    }

    fn user_stats_key(user_id: &str) -> String {
        format!("notifications:stats:{}", user_id)
    }

    fn user_unread_key(user_id: &str) -> String {
        format!("notifications:unread:{}", user_id)
    }

    fn scheduled_key(notification_id: &str) -> String {
        format!("scheduled:{}", notification_id)
    }

    pub async fn cached_user_notifications(&self, user_id: &str) -> Option<NotificationPage> {
        let raw = self.get(&Self::user_list_key(user_id)).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn cache_user_notifications(&self, user_id: &str, page: &NotificationPage) -> bool {
        let Ok(raw) = serde_json::to_string(page) else {
            return false;
        };
        self.set(&Self::user_list_key(user_id), &raw, self.list_ttl_seconds)
            .await
    }

    pub async fn cached_user_stats(&self, user_id: &str) -> Option<NotificationStats> {
        let raw = self.get(&Self::user_stats_key(user_id)).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn cache_user_stats(&self, user_id: &str, stats: &NotificationStats) -> bool {
        let Ok(raw) = serde_json::to_string(stats) else {
            return false;
        };
        self.set(&Self::user_stats_key(user_id), &raw, self.stats_ttl_seconds)
            .await
    }

    /// Drops every cached read for the user. Mutations call this before
    /// they return, so the next read repopulates from the store.
    pub async fn invalidate_user_notifications(&self, user_id: &str) -> bool {
        self.del(&[
            Self::user_list_key(user_id),
            Self::user_stats_key(user_id),
            Self::user_unread_key(user_id),
        ])
        .await
    }

    pub async fn store_scheduled(
        &self,
        notification_id: &str,
        payload: &str,
        ttl_seconds: u64,
    ) -> bool {
        self.set(&Self::scheduled_key(notification_id), payload, ttl_seconds)
            .await
    }

    pub async fn read_scheduled(&self, notification_id: &str) -> Option<String> {
        self.get(&Self::scheduled_key(notification_id)).await
    }

    pub async fn cancel_scheduled(&self, notification_id: &str) -> bool {
        self.del(&[Self::scheduled_key(notification_id)]).await
    }
}

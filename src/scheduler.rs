use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clients::cache::CacheClient;
use crate::error::NotificationError;
use crate::models::notification::NotificationRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEnvelope {
    pub request: NotificationRequest,
    pub fire_at: DateTime<Utc>,
}

/// Defers a notification until its fire time. The envelope lives in the
/// cache under `scheduled:<id>` with a TTL equal to the remaining wait, and
/// a one-shot timer resubmits it through the orchestrator's intake channel.
///
/// Durability is best-effort and same-process only: if the process restarts
/// between the cache write and the timer firing, the envelope expires with
/// its TTL and the notification is not recovered. Cancellation deletes the
/// cache key; a timer that finds no envelope does nothing. When the cache
/// is unavailable the timer fires from its in-memory copy instead, at the
/// cost of cancellation support.
pub struct Scheduler {
    cache: Arc<CacheClient>,
    resubmit_tx: mpsc::Sender<NotificationRequest>,
}

impl Scheduler {
    pub fn new(cache: Arc<CacheClient>, resubmit_tx: mpsc::Sender<NotificationRequest>) -> Self {
        Self { cache, resubmit_tx }
    }

    pub async fn schedule(
        &self,
        request: NotificationRequest,
        fire_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        let now = Utc::now();

        if fire_at <= now {
            debug!(notification_id = %request.id, "Fire time already passed, dispatching now");
            return self.resubmit(request).await;
        }

        let ttl_seconds = (fire_at - now).num_seconds().max(1) as u64;
        let envelope = ScheduledEnvelope {
            request: request.clone(),
            fire_at,
        };
        let payload = serde_json::to_string(&envelope)?;

        let persisted = self
            .cache
            .store_scheduled(&request.id, &payload, ttl_seconds)
            .await;
        if !persisted {
            debug!(
                notification_id = %request.id,
                "Cache unavailable, scheduling in-memory only (not cancellable)"
            );
        }

        info!(
            notification_id = %request.id,
            user_id = %request.user_id,
            fire_at = %fire_at,
            "Notification scheduled"
        );

        let cache = self.cache.clone();
        let tx = self.resubmit_tx.clone();
        let delay = (fire_at - now).to_std().unwrap_or_default();

        tokio::spawn(async move {
            sleep(delay).await;

            let request = if persisted {
                match cache.read_scheduled(&request.id).await {
                    Some(raw) => match serde_json::from_str::<ScheduledEnvelope>(&raw) {
                        Ok(envelope) => {
                            cache.cancel_scheduled(&envelope.request.id).await;
                            envelope.request
                        }
                        Err(e) => {
                            warn!(
                                notification_id = %request.id,
                                error = %e,
                                "Dropping unreadable scheduled envelope"
                            );
                            return;
                        }
                    },
                    None => {
                        // Cancelled or evicted; either way there is nothing to send.
                        debug!(notification_id = %request.id, "Scheduled envelope gone, skipping");
                        return;
                    }
                }
            } else {
                request
            };

            if let Err(e) = tx.send(request).await {
                warn!(error = %e, "Resubmission channel closed, dropping scheduled notification");
            }
        });

        Ok(())
    }

    /// Cancels a pending notification by removing its envelope before the
    /// timer fires. Only effective while the cache is reachable.
    pub async fn cancel(&self, notification_id: &str) -> bool {
        let removed = self.cache.cancel_scheduled(notification_id).await;
        if removed {
            info!(notification_id, "Scheduled notification cancelled");
        }
        removed
    }

    async fn resubmit(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        self.resubmit_tx
            .send(request)
            .await
            .map_err(|_| NotificationError::Store("scheduler intake channel closed".to_string()))
    }
}

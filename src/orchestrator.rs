use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures_util::future::join_all;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::clients::ChannelProvider;
use crate::config::BulkSettings;
use crate::error::NotificationError;
use crate::inbox::InboxService;
use crate::models::notification::{
    BulkReport, Channel, DeliveryOutcome, DispatchReport, DispatchStatus, InAppNotification,
    NotificationRequest, OutboundMessage, Priority,
};
use crate::models::preferences::Recipient;
use crate::preferences::{filter_channels, is_in_quiet_hours, quiet_hours_delay};
use crate::scheduler::Scheduler;
use crate::stores::UserPreferenceStore;
use crate::templates::TemplateRegistry;

/// Coordinates a notification from intake to per-channel outcomes:
/// validate, filter against preferences, defer into quiet hours or an
/// explicit schedule, render, fan out concurrently, record the in-app copy.
/// Individual channel failures are data in the report, never errors.
pub struct Orchestrator {
    registry: Arc<TemplateRegistry>,
    preferences: Arc<dyn UserPreferenceStore>,
    inbox: Arc<InboxService>,
    scheduler: Arc<Scheduler>,
    providers: HashMap<Channel, Arc<dyn ChannelProvider>>,
    bulk: BulkSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        preferences: Arc<dyn UserPreferenceStore>,
        inbox: Arc<InboxService>,
        scheduler: Arc<Scheduler>,
        providers: Vec<Arc<dyn ChannelProvider>>,
        bulk: BulkSettings,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.channel(), provider))
            .collect();

        Self {
            registry,
            preferences,
            inbox,
            scheduler,
            providers,
            bulk,
        }
    }

    pub async fn send(
        &self,
        request: NotificationRequest,
    ) -> Result<DispatchReport, NotificationError> {
        validate(&request)?;
        let now = Utc::now();

        if let Some(expires_at) = request.expires_at {
            if expires_at <= now {
                info!(
                    notification_id = %request.id,
                    user_id = %request.user_id,
                    "Dropping expired notification"
                );
                return Ok(DispatchReport::expired(request.id));
            }
        }

        let prefs = self.preferences.preferences(&request.user_id).await?;
        let channels = filter_channels(&request.channels, request.kind, &prefs);

        if channels.is_empty() {
            // The user opted out everywhere; honoring that is a success.
            debug!(
                notification_id = %request.id,
                user_id = %request.user_id,
                "All requested channels disabled by preferences"
            );
            return Ok(DispatchReport::skipped(request.id));
        }

        if let Some(scheduled_at) = request.scheduled_at {
            if scheduled_at > now {
                let id = request.id.clone();
                self.scheduler.schedule(request, scheduled_at).await?;
                return Ok(DispatchReport::deferred(id, scheduled_at));
            }
        } else if request.priority != Priority::Urgent && is_in_quiet_hours(&prefs, now) {
            let delay = quiet_hours_delay(&prefs, now).unwrap_or_default();
            let fire_at = now + TimeDelta::seconds(delay.as_secs() as i64);

            info!(
                notification_id = %request.id,
                user_id = %request.user_id,
                fire_at = %fire_at,
                "Deferring notification until quiet hours end"
            );

            let id = request.id.clone();
            self.scheduler.schedule(request, fire_at).await?;
            return Ok(DispatchReport::deferred(id, fire_at));
        }

        let contact = self
            .preferences
            .contact(&request.user_id)
            .await
            .unwrap_or_default();
        let recipient = Recipient {
            user_id: request.user_id.clone(),
            contact,
        };

        let mut dispatches = Vec::new();
        for channel in channels.iter().copied().filter(|c| *c != Channel::InApp) {
            let provider = self.providers.get(&channel).cloned();
            let rendered = self.render_for_channel(&request, channel);
            let recipient = recipient.clone();

            dispatches.push(async move {
                let Some(provider) = provider else {
                    warn!(%channel, "No provider registered for channel");
                    return DeliveryOutcome::failed(channel, "no provider registered");
                };

                if !provider.is_ready() {
                    debug!(%channel, "Provider not configured, skipping channel");
                    let reason = NotificationError::ProviderUnavailable(channel);
                    return DeliveryOutcome::failed(channel, reason.to_string());
                }

                let message = match rendered {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(%channel, error = %e, "Rendering failed");
                        return DeliveryOutcome::failed(channel, e.to_string());
                    }
                };

                match provider.send(&recipient, &message).await {
                    Ok(true) => DeliveryOutcome::delivered(channel),
                    Ok(false) => DeliveryOutcome {
                        channel,
                        success: false,
                        error: None,
                    },
                    Err(e) => {
                        warn!(%channel, error = %e, "Channel send failed");
                        DeliveryOutcome::failed(channel, e.to_string())
                    }
                }
            });
        }

        // Settle-all: one provider failing must not cancel its siblings.
        let mut outcomes = join_all(dispatches).await;

        if channels.contains(&Channel::InApp) {
            outcomes.push(self.record_in_app(&request).await);
        }

        let delivered = outcomes.iter().filter(|o| o.success).count();
        info!(
            notification_id = %request.id,
            user_id = %request.user_id,
            kind = %request.kind,
            delivered,
            attempted = outcomes.len(),
            "Notification dispatched"
        );

        Ok(DispatchReport::dispatched(request.id, outcomes))
    }

    /// Chunked bulk dispatch. Each chunk settles fully before the next one
    /// starts; per-item failures are folded into the report instead of
    /// aborting the batch.
    pub async fn send_bulk(&self, requests: Vec<NotificationRequest>) -> BulkReport {
        let mut report = BulkReport {
            total: requests.len(),
            ..Default::default()
        };

        let chunk_count = requests.len().div_ceil(self.bulk.chunk_size);

        for (index, chunk) in requests.chunks(self.bulk.chunk_size).enumerate() {
            let results = join_all(chunk.iter().map(|request| self.send(request.clone()))).await;

            for result in results {
                match result {
                    Ok(dispatch) => match dispatch.status {
                        DispatchStatus::Dispatched => report.dispatched += 1,
                        DispatchStatus::Deferred => report.deferred += 1,
                        DispatchStatus::Skipped | DispatchStatus::Expired => report.skipped += 1,
                    },
                    Err(e) => {
                        warn!(error = %e, "Bulk item failed");
                        report.failed += 1;
                    }
                }
            }

            if index + 1 < chunk_count {
                sleep(Duration::from_millis(self.bulk.chunk_delay_ms)).await;
            }
        }

        info!(
            total = report.total,
            dispatched = report.dispatched,
            deferred = report.deferred,
            skipped = report.skipped,
            failed = report.failed,
            "Bulk send complete"
        );

        report
    }

    async fn record_in_app(&self, request: &NotificationRequest) -> DeliveryOutcome {
        let message = match self.registry.find(request.kind, Channel::InApp) {
            Some(template_id) => self
                .registry
                .compile(&template_id, &request.data)
                .map(|rendered| rendered.content)
                .unwrap_or_else(|_| request.message.clone()),
            None => request.message.clone(),
        };

        let notification = InAppNotification {
            id: request.id.clone(),
            user_id: request.user_id.clone(),
            kind: request.kind,
            title: request.title.clone(),
            message,
            data: request.data.clone(),
            is_read: false,
            created_at: Utc::now(),
        };

        match self.inbox.record(notification).await {
            Ok(()) => DeliveryOutcome::delivered(Channel::InApp),
            Err(e) => {
                warn!(
                    notification_id = %request.id,
                    error = %e,
                    "Failed to record in-app notification"
                );
                DeliveryOutcome::failed(Channel::InApp, e.to_string())
            }
        }
    }

    fn render_for_channel(
        &self,
        request: &NotificationRequest,
        channel: Channel,
    ) -> Result<OutboundMessage, NotificationError> {
        let (subject, body) = match self.registry.find(request.kind, channel) {
            Some(template_id) => {
                let validation = self.registry.validate(&template_id, &request.data)?;
                if !validation.is_valid {
                    return Err(NotificationError::MissingVariables {
                        template_id,
                        variables: validation.missing_variables,
                    });
                }

                let rendered = self.registry.compile(&template_id, &request.data)?;
                (rendered.subject, rendered.content)
            }
            // No template for this pair; the raw title/message pass through.
            None => (None, request.message.clone()),
        };

        Ok(OutboundMessage {
            notification_id: request.id.clone(),
            kind: request.kind,
            title: request.title.clone(),
            body,
            subject,
            data: request.data.clone(),
            priority: request.priority,
        })
    }
}

fn validate(request: &NotificationRequest) -> Result<(), NotificationError> {
    if request.user_id.trim().is_empty() {
        return Err(NotificationError::Validation(
            "user_id is required".to_string(),
        ));
    }
    if request.title.trim().is_empty() {
        return Err(NotificationError::Validation(
            "title is required".to_string(),
        ));
    }
    if request.message.trim().is_empty() {
        return Err(NotificationError::Validation(
            "message is required".to_string(),
        ));
    }
    if request.channels.is_empty() {
        return Err(NotificationError::Validation(
            "at least one channel is required".to_string(),
        ));
    }
    Ok(())
}

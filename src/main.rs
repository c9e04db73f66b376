use std::path::Path;
use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notification_service::api::{AppState, run_api_server};
use notification_service::clients::ChannelProvider;
use notification_service::clients::cache::CacheClient;
use notification_service::clients::email::EmailProvider;
use notification_service::clients::health::HealthChecker;
use notification_service::clients::push::PushProvider;
use notification_service::clients::sms::SmsProvider;
use notification_service::clients::webhook::WebhookProvider;
use notification_service::config::Config;
use notification_service::inbox::InboxService;
use notification_service::orchestrator::Orchestrator;
use notification_service::scheduler::Scheduler;
use notification_service::stores::{
    InAppNotificationStore, InMemoryInAppStore, InMemoryPreferenceStore,
    InMemoryPushSubscriptionStore, PushSubscriptionStore, UserPreferenceStore,
};
use notification_service::templates::TemplateRegistry;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cache = Arc::new(CacheClient::connect(&config).await);

    let registry = Arc::new(TemplateRegistry::with_defaults());
    if let Some(dir) = &config.template_dir {
        if let Err(e) = registry.load_dir(Path::new(dir)) {
            warn!(dir = %dir, error = %e, "Failed to load template directory");
        }
    }

    let preference_store = Arc::new(InMemoryPreferenceStore::new());
    let push_subscription_store = Arc::new(InMemoryPushSubscriptionStore::new());
    let in_app_store = Arc::new(InMemoryInAppStore::new());

    let email = Arc::new(EmailProvider::connect(&config).await);
    let sms = Arc::new(SmsProvider::new(config.sms_settings(), config.retry_config()));
    let push = Arc::new(PushProvider::new(
        config.vapid_settings(),
        push_subscription_store.clone() as Arc<dyn PushSubscriptionStore>,
    ));
    let webhook = Arc::new(WebhookProvider::new(config.provider_timeout_seconds));

    let push_public_key = push.public_key().map(str::to_string);

    let providers: Vec<Arc<dyn ChannelProvider>> = vec![
        email as Arc<dyn ChannelProvider>,
        sms as Arc<dyn ChannelProvider>,
        push as Arc<dyn ChannelProvider>,
        webhook as Arc<dyn ChannelProvider>,
    ];

    let inbox = Arc::new(InboxService::new(
        in_app_store as Arc<dyn InAppNotificationStore>,
        cache.clone(),
    ));

    let (resubmit_tx, mut resubmit_rx) = mpsc::channel(1024);
    let scheduler = Arc::new(Scheduler::new(cache.clone(), resubmit_tx));

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        preference_store as Arc<dyn UserPreferenceStore>,
        inbox.clone(),
        scheduler.clone(),
        providers.clone(),
        config.bulk_settings(),
    ));

    // Scheduled notifications come back in through this intake loop.
    let resubmitter = orchestrator.clone();
    tokio::spawn(async move {
        while let Some(request) = resubmit_rx.recv().await {
            if let Err(e) = resubmitter.send(request).await {
                warn!(error = %e, "Failed to dispatch scheduled notification");
            }
        }
    });

    let health_checker = HealthChecker::new(cache.clone(), providers);

    info!(port = config.server_port, "Notification service starting");

    let state = Arc::new(AppState {
        orchestrator,
        inbox,
        scheduler,
        push_subscriptions: push_subscription_store,
        push_public_key,
        health_checker,
    });

    run_api_server(state, config.server_port)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))?;

    Ok(())
}

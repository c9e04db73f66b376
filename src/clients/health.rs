use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::clients::ChannelProvider;
use crate::clients::cache::CacheClient;
use crate::models::health::{HealthCheckResponse, HealthStatus, ServiceHealth};

pub struct HealthChecker {
    cache: Arc<CacheClient>,
    providers: Vec<Arc<dyn ChannelProvider>>,
}

impl HealthChecker {
    pub fn new(cache: Arc<CacheClient>, providers: Vec<Arc<dyn ChannelProvider>>) -> Self {
        Self { cache, providers }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("cache".to_string(), self.check_cache().await);

        for provider in &self.providers {
            checks.insert(
                format!("{}_provider", provider.channel()),
                provider_health(provider.as_ref()),
            );
        }

        let overall_status = self.determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_cache(&self) -> ServiceHealth {
        if !self.cache.is_enabled() {
            return ServiceHealth::degraded(
                "cache disabled, reads go straight to the store".to_string(),
            );
        }

        let start = Instant::now();
        if self.cache.ping().await {
            ServiceHealth::healthy(start.elapsed().as_millis() as u64)
        } else {
            // The engine keeps working cache-less, so this is not fatal.
            ServiceHealth::degraded("cache unreachable".to_string())
        }
    }

    fn determine_overall_status(&self, checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let no_channel_ready = !self.providers.is_empty()
            && self.providers.iter().all(|provider| !provider.is_ready());

        if no_channel_ready {
            return HealthStatus::Unhealthy;
        }

        let has_unhealthy = checks
            .values()
            .any(|health| health.status == HealthStatus::Unhealthy);

        let has_degraded = checks
            .values()
            .any(|health| health.status == HealthStatus::Degraded);

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

fn provider_health(provider: &dyn ChannelProvider) -> ServiceHealth {
    if provider.is_ready() {
        ServiceHealth::healthy(0)
    } else {
        ServiceHealth::degraded("not configured".to_string())
    }
}

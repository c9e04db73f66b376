use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

fn default_server_port() -> u16 {
    3001
}

fn default_cache_prefix() -> String {
    "realty".to_string()
}

fn default_true() -> bool {
    true
}

fn default_list_ttl() -> u64 {
    300
}

fn default_stats_ttl() -> u64 {
    600
}

fn default_smtp_port() -> u16 {
    587
}

fn default_country_code() -> String {
    "+1".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_bulk_chunk_size() -> usize {
    100
}

fn default_bulk_chunk_delay_ms() -> u64 {
    1000
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    5000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    pub redis_url: Option<String>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    #[serde(default = "default_list_ttl")]
    pub cache_list_ttl_seconds: u64,
    #[serde(default = "default_stats_ttl")]
    pub cache_stats_ttl_seconds: u64,

    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,

    pub sms_api_url: Option<String>,
    pub sms_api_key: Option<String>,
    pub sms_sender_id: Option<String>,
    #[serde(default = "default_country_code")]
    pub sms_default_country_code: String,

    pub vapid_subject: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_seconds: u64,

    #[serde(default = "default_bulk_chunk_size")]
    pub bulk_chunk_size: usize,
    #[serde(default = "default_bulk_chunk_delay_ms")]
    pub bulk_chunk_delay_ms: u64,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,

    pub template_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub api_url: String,
    pub api_key: String,
    pub sender_id: String,
    pub default_country_code: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct VapidSettings {
    pub subject: String,
    pub public_key: String,
    /// Base64url-encoded PKCS#8 document for the ES256 signing key.
    pub private_key: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct BulkSettings {
    pub chunk_size: usize,
    pub chunk_delay_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn bulk_settings(&self) -> BulkSettings {
        BulkSettings {
            chunk_size: self.bulk_chunk_size.max(1),
            chunk_delay_ms: self.bulk_chunk_delay_ms,
        }
    }

    /// `None` when the email channel is unconfigured; the provider then
    /// stays a not-ready no-op.
    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        Some(SmtpSettings {
            host: self.smtp_host.clone()?,
            port: self.smtp_port,
            username: self.smtp_username.clone()?,
            password: self.smtp_password.clone()?,
            from: self.smtp_from.clone()?,
        })
    }

    pub fn sms_settings(&self) -> Option<SmsSettings> {
        Some(SmsSettings {
            api_url: self.sms_api_url.clone()?,
            api_key: self.sms_api_key.clone()?,
            sender_id: self.sms_sender_id.clone()?,
            default_country_code: self.sms_default_country_code.clone(),
            timeout_seconds: self.provider_timeout_seconds,
        })
    }

    pub fn vapid_settings(&self) -> Option<VapidSettings> {
        Some(VapidSettings {
            subject: self.vapid_subject.clone()?,
            public_key: self.vapid_public_key.clone()?,
            private_key: self.vapid_private_key.clone()?,
            timeout_seconds: self.provider_timeout_seconds,
        })
    }
}

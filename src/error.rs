use thiserror::Error;

use crate::models::notification::Channel;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid notification request: {0}")]
    Validation(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template {template_id} is missing variables: {variables:?}")]
    MissingVariables {
        template_id: String,
        variables: Vec<String>,
    },

    #[error("{0} provider is not configured")]
    ProviderUnavailable(Channel),

    #[error("{channel} send failed: {reason}")]
    ProviderSendFailed { channel: Channel, reason: String },

    #[error("cache unavailable")]
    CacheUnavailable,

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NotificationError {
    pub fn send_failed(channel: Channel, reason: impl Into<String>) -> Self {
        Self::ProviderSendFailed {
            channel,
            reason: reason.into(),
        }
    }
}

pub mod cache;
pub mod email;
pub mod health;
pub mod push;
pub mod sms;
pub mod webhook;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::models::notification::{Channel, OutboundMessage};
use crate::models::preferences::Recipient;

/// Uniform contract every delivery channel implements. `send` returning
/// `Ok(true)` means the provider accepted the message, not that it was
/// delivered. Unconfigured providers report `is_ready() == false` and are
/// skipped by the orchestrator instead of erroring.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    fn channel(&self) -> Channel;

    fn is_ready(&self) -> bool;

    async fn send(
        &self,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Result<bool, NotificationError>;
}

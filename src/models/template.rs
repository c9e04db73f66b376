use serde::{Deserialize, Serialize};

use crate::models::notification::{Channel, NotificationType};

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub channel: Channel,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Template {
    /// Canonical id for the (type, channel) pair a template serves.
    pub fn id_for(kind: NotificationType, channel: Channel) -> String {
        format!("{}_{}", kind.as_str(), channel.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateValidation {
    pub is_valid: bool,
    pub missing_variables: Vec<String>,
}
